pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod navigation;
pub mod perception;
pub mod sim;

use crate::config::ControlConfig;
use crate::control::timer::ControlTimer;
use crate::navigation::{CycleReport, Navigator};
use std::sync::Arc;
use tracing::info;

pub use crate::error::{Result, RoverError};

/// Core control loop for the rover.
///
/// The timer callback only marks cycles due. The main loop calls
/// [`RoverCore::run_pending`], which runs at most one navigation cycle per
/// call and, every few cycles, the slower secondary poll.
pub struct RoverCore {
    navigator: Navigator,
    timer: Arc<ControlTimer>,
    secondary_poll_every: u32,
}

impl RoverCore {
    /// Create a new core around a wired navigator
    pub fn new(navigator: Navigator, config: &ControlConfig) -> Self {
        RoverCore {
            navigator,
            timer: Arc::new(ControlTimer::new()),
            secondary_poll_every: config.secondary_poll_every,
        }
    }

    /// Handle for the timer callback
    pub fn timer(&self) -> Arc<ControlTimer> {
        Arc::clone(&self.timer)
    }

    /// Run one cycle if the timer has marked one due
    pub fn run_pending(&mut self) -> Option<CycleReport> {
        if !self.timer.take_due() {
            return None;
        }
        let report = self.navigator.navigate();
        if self.timer.secondary_due(self.secondary_poll_every) {
            self.secondary_poll(&report);
        }
        Some(report)
    }

    fn secondary_poll(&self, report: &CycleReport) {
        let odometry = report.state.odometry;
        info!(
            cycle = self.timer.cycles_run(),
            x = odometry.x,
            y = odometry.y,
            heading = odometry.heading,
            source = ?report.source,
            "status"
        );
        self.navigator.estimator().show_values();
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.navigator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DrivetrainKind, HeadingSource, RoverConfig};
    use crate::sim::{build_navigator, SimPlant};

    #[test]
    fn cycles_only_run_when_due() {
        let mut config = RoverConfig::default();
        config.drivetrain.kind = DrivetrainKind::Tank;
        config.estimator.heading_source = HeadingSource::KinematicOnly;
        let plant = SimPlant::new(&config.drivetrain).shared();
        let mut core = RoverCore::new(build_navigator(&config, &plant).unwrap(), &config.control);

        assert!(core.run_pending().is_none());
        let timer = core.timer();
        timer.on_tick();
        timer.on_tick();
        assert!(core.run_pending().is_some());
        assert!(core.run_pending().is_none());
        assert_eq!(timer.tick_count(), 2);
        assert_eq!(timer.cycles_run(), 1);
    }

    #[test]
    fn secondary_poll_counts_cycles_run_not_ticks() {
        let mut config = RoverConfig::default();
        config.drivetrain.kind = DrivetrainKind::Tank;
        config.estimator.heading_source = HeadingSource::KinematicOnly;
        config.control.secondary_poll_every = 4;
        let plant = SimPlant::new(&config.drivetrain).shared();
        let mut core = RoverCore::new(build_navigator(&config, &plant).unwrap(), &config.control);
        let timer = core.timer();

        for _ in 0..4 {
            for _ in 0..3 {
                timer.on_tick();
            }
            assert!(core.run_pending().is_some());
        }
        assert_eq!(timer.tick_count(), 12);
        assert_eq!(timer.cycles_run(), 4);
        assert!(timer.secondary_due(config.control.secondary_poll_every));
    }
}
