//! Navigation module for the rover
pub mod receiver;
pub mod routes;
pub mod waypoint_navigation;
pub mod waypoints;

use self::receiver::{CommandBlender, CommandSource, Receiver};
use self::waypoint_navigation::WaypointNavigator;
use crate::common::{DriveTrainState, VehicleState, VelocityCommand};
use crate::config::RoverConfig;
use crate::control::StateManager;
use crate::error::Result;
use crate::perception::StateEstimator;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// What one control cycle did
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub state: VehicleState,
    pub command: VelocityCommand,
    pub source: CommandSource,
    pub drive_train_state: DriveTrainState,
}

/// Top-level navigator: one call to [`Navigator::navigate`] runs one full
/// estimate, resolve, actuate, feed back cycle.
pub struct Navigator {
    estimator: StateEstimator,
    state_manager: StateManager,
    waypoint_navigator: Rc<RefCell<WaypointNavigator>>,
    receiver: Option<Box<dyn Receiver>>,
    blender: CommandBlender,
}

impl Navigator {
    /// Wire the pipeline together. The waypoint navigator is seeded from the
    /// configured route and subscribed to the estimator.
    pub fn new(
        config: &RoverConfig,
        mut estimator: StateEstimator,
        state_manager: StateManager,
        receiver: Option<Box<dyn Receiver>>,
    ) -> Result<Self> {
        let waypoint_navigator = Rc::new(RefCell::new(WaypointNavigator::from_config(
            &config.navigation,
            &config.route,
        )?));
        estimator.add_observer(waypoint_navigator.clone())?;

        if receiver.is_none() {
            debug!("No receiver attached, running autonomous only");
        }

        Ok(Navigator {
            estimator,
            state_manager,
            waypoint_navigator,
            receiver,
            blender: CommandBlender::new(
                config.navigation.policy,
                config.navigation.manual_deadband,
            ),
        })
    }

    /// Run one control cycle
    pub fn navigate(&mut self) -> CycleReport {
        let state = self.estimator.estimate_state();

        let manual = self
            .receiver
            .as_mut()
            .and_then(|receiver| receiver.latest_command());
        let waypoint_navigator = &self.waypoint_navigator;
        let (command, source) = self.blender.resolve(manual, || {
            match waypoint_navigator.try_borrow_mut() {
                Ok(mut navigator) => navigator.navigate_latest(),
                Err(e) => {
                    warn!("Waypoint navigator busy, stopping: {}", e);
                    VelocityCommand::idle()
                }
            }
        });

        let drive_train_state = self.state_manager.request_state(command, &mut self.estimator);
        CycleReport {
            state,
            command,
            source,
            drive_train_state,
        }
    }

    pub fn estimator(&self) -> &StateEstimator {
        &self.estimator
    }

    pub fn estimator_mut(&mut self) -> &mut StateEstimator {
        &mut self.estimator
    }

    pub fn state_manager(&self) -> &StateManager {
        &self.state_manager
    }

    /// Shared handle to the waypoint navigator, for route edits
    pub fn waypoint_navigator(&self) -> Rc<RefCell<WaypointNavigator>> {
        Rc::clone(&self.waypoint_navigator)
    }

    /// True once the route has been completed
    pub fn is_finished(&self) -> bool {
        self.waypoint_navigator
            .try_borrow()
            .map(|navigator| navigator.is_finished())
            .unwrap_or(false)
    }
}
