//! Common types and utilities shared by estimation, navigation and control
pub mod angles;
pub mod types;

pub use self::angles::wrap_pi;
pub use self::types::{
    DriveTrainState, MotorPosition, Odometry, Side, SteeringAngles, VehicleState, Velocity,
    VelocityCommand, Waypoint, WheelMap, WheelSpeeds,
};
