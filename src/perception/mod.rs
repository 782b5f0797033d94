//! Perception module for the rover: sensors, dead reckoning and the state estimator
pub mod estimator;
pub mod localization;
pub mod sensors;

pub use self::estimator::{SharedObserver, StateEstimator, MAX_OBSERVERS};

use crate::common::VehicleState;
use tracing::debug;

/// Subscriber to the estimator's state updates.
///
/// Called synchronously on the estimator's update path, in registration order.
pub trait StateObserver {
    fn on_state_update(&mut self, state: &VehicleState);
}

/// Observer that traces every published state
#[derive(Debug, Default)]
pub struct TelemetryObserver {
    updates: u64,
}

impl TelemetryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }
}

impl StateObserver for TelemetryObserver {
    fn on_state_update(&mut self, state: &VehicleState) {
        self.updates += 1;
        debug!(
            update = self.updates,
            x = state.odometry.x,
            y = state.odometry.y,
            heading = state.odometry.heading,
            "state update"
        );
    }
}
