//! Sensor collaborator interfaces

use crate::error::SensorError;

/// Encoder reading taken once per estimation cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EncoderCapture {
    /// Counts since the previous capture
    pub delta: i32,
    /// Cumulative counts since start
    pub count: i64,
}

/// Quadrature encoder on one wheel
pub trait WheelEncoder {
    fn capture(&mut self) -> EncoderCapture;
}

/// Absolute heading source such as an IMU
pub trait HeadingSensor {
    /// Bring the sensor up. Fails if the device is absent.
    fn begin(&mut self) -> Result<(), SensorError>;

    /// Latest absolute heading in radians, clockwise positive
    fn latest_heading(&mut self) -> Result<f64, SensorError>;
}
