//! Actuator collaborator interfaces
//!
//! Drivers sit outside this crate. Commands are best effort: the core logs a
//! rejected command and carries on with the cycle.

use crate::error::ActuatorError;

/// One wheel motor driver
pub trait WheelMotor {
    /// Normalised duty in [-1, 1]
    fn set_speed(&mut self, speed: f64) -> Result<(), ActuatorError>;
}

/// One steering servo driver
pub trait SteeringServo {
    fn enable(&mut self) -> Result<(), ActuatorError>;

    /// De-energise the servo so it stops holding position
    fn disable(&mut self) -> Result<(), ActuatorError>;

    fn is_enabled(&self) -> bool;

    /// Steering angle in radians, positive steers clockwise
    fn set_angle(&mut self, angle: f64) -> Result<(), ActuatorError>;
}

/// The two steering servos of an Ackermann chassis
pub struct SteeringServos {
    pub left: Box<dyn SteeringServo>,
    pub right: Box<dyn SteeringServo>,
}
