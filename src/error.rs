//! Error types for the rover core

use thiserror::Error;

/// Failure reported by a sensor collaborator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorError {
    #[error("sensor not detected")]
    NotDetected,

    #[error("sensor read failed: {0}")]
    Read(String),
}

/// Failure reported by a motor or servo driver
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuatorError {
    #[error("actuator rejected command: {0}")]
    Rejected(String),

    #[error("actuator not responding")]
    NotResponding,
}

/// Rover core error type
#[derive(Error, Debug)]
pub enum RoverError {
    #[error("heading sensor unavailable: {0}")]
    HeadingSensorUnavailable(#[source] SensorError),

    #[error("observer list is full ({capacity} observers)")]
    ObserverCapacity { capacity: usize },

    #[error("waypoint buffer is full ({capacity} waypoints)")]
    WaypointBufferFull { capacity: usize },

    #[error("waypoint has a NaN field")]
    EmptyWaypoint,

    #[error("unknown route: {0}")]
    UnknownRoute(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for RoverError {
    fn from(e: toml::de::Error) -> Self {
        RoverError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RoverError>;
