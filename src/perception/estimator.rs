//! Vehicle state estimator

use super::localization::{
    calculate_bilateral_speeds, calculate_new_position, differential_heading_change,
    steering_curvature, HeadingFusion,
};
use super::sensors::{EncoderCapture, HeadingSensor, WheelEncoder};
use super::StateObserver;
use crate::common::{
    wrap_pi, DriveTrainState, SteeringAngles, VehicleState, Velocity, WheelMap,
};
use crate::config::{DrivetrainConfig, DrivetrainKind, EstimatorConfig, HeadingSource};
use crate::control::DriveTrainFeedback;
use crate::error::{Result, RoverError, SensorError};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Maximum number of registered observers
pub const MAX_OBSERVERS: usize = 10;

pub type SharedObserver = Rc<RefCell<dyn StateObserver>>;

/// Fuses encoder travel and heading into a [`VehicleState`] once per period.
///
/// The estimator owns the current and previous state (velocity is a finite
/// difference between them) and the last drivetrain state fed back by the
/// state manager.
pub struct StateEstimator {
    drivetrain: DrivetrainConfig,
    period: f64,
    encoders: WheelMap<Box<dyn WheelEncoder>>,
    heading_sensor: Option<Box<dyn HeadingSensor>>,
    fusion: HeadingFusion,
    estimated_state: VehicleState,
    previous_state: VehicleState,
    current_drive_train_state: DriveTrainState,
    current_steering_angles: SteeringAngles,
    observers: heapless::Vec<SharedObserver, MAX_OBSERVERS>,
}

impl StateEstimator {
    /// Create an estimator at the origin facing +Y.
    ///
    /// With [`HeadingSource::InertialFused`] the heading sensor is started and
    /// its offset taken here; a missing or failing sensor is an error.
    pub fn new(
        drivetrain: &DrivetrainConfig,
        config: &EstimatorConfig,
        encoders: WheelMap<Box<dyn WheelEncoder>>,
        mut heading_sensor: Option<Box<dyn HeadingSensor>>,
    ) -> Result<Self> {
        let mut fusion = HeadingFusion::new(config.heading_source, config.inertial_weight);
        let estimated_state = VehicleState::default();

        if config.heading_source == HeadingSource::InertialFused {
            let sensor = heading_sensor.as_deref_mut().ok_or(
                RoverError::HeadingSensorUnavailable(SensorError::NotDetected),
            )?;
            fusion.initialise_heading_offset(sensor, estimated_state.odometry.heading)?;
        }

        debug!(
            "State estimator created: {:?} drivetrain, {:?} heading, {} ms period",
            drivetrain.kind, config.heading_source, config.period_ms
        );

        Ok(StateEstimator {
            drivetrain: drivetrain.clone(),
            period: config.period_secs(),
            encoders,
            heading_sensor,
            fusion,
            estimated_state,
            previous_state: estimated_state,
            current_drive_train_state: DriveTrainState::idle(),
            current_steering_angles: SteeringAngles::default(),
            observers: heapless::Vec::new(),
        })
    }

    /// Latest published state
    pub fn current_state(&self) -> VehicleState {
        self.estimated_state
    }

    pub fn previous_state(&self) -> VehicleState {
        self.previous_state
    }

    pub fn current_drive_train_state(&self) -> DriveTrainState {
        self.current_drive_train_state
    }

    /// Run one estimation cycle, publish the result and return it
    pub fn estimate_state(&mut self) -> VehicleState {
        let captures = self.capture_encoders();
        let distance_per_count = self.drivetrain.distance_per_count();
        let wheel_travel = captures.map(|capture| f64::from(capture.delta) * distance_per_count);

        let steering_angles = self.estimate_steering_angles();
        let (left, right) = calculate_bilateral_speeds(
            &wheel_travel,
            steering_angles,
            self.drivetrain.steering_style,
        );
        let distance_travelled = (left + right) / 2.0;

        let heading_change = match self.drivetrain.kind {
            DrivetrainKind::Tank => {
                differential_heading_change(left, right, self.drivetrain.wheel_track)
            }
            DrivetrainKind::Ackermann => {
                distance_travelled
                    * steering_curvature(
                        steering_angles,
                        self.drivetrain.wheel_base,
                        self.drivetrain.half_track(),
                        self.drivetrain.steering_style,
                    )
            }
        };

        let previous = self.estimated_state;
        let kinematic_heading = previous.odometry.heading + heading_change;
        let inertial = self.latest_heading();
        let heading = self.fusion.fuse(kinematic_heading, inertial);

        let odometry = calculate_new_position(&previous.odometry, distance_travelled, heading);
        let velocity = self.calculate_velocities(heading, previous.odometry.heading, distance_travelled);

        self.previous_state = previous;
        self.estimated_state = VehicleState { odometry, velocity };
        self.publish_state();
        self.estimated_state
    }

    /// Notify every observer of the current state
    pub fn publish_state(&self) {
        self.notify_observers(&self.estimated_state);
    }

    /// Register an observer. Registration is fixed capacity.
    pub fn add_observer(&mut self, observer: SharedObserver) -> Result<()> {
        self.observers
            .push(observer)
            .map_err(|_| RoverError::ObserverCapacity {
                capacity: MAX_OBSERVERS,
            })
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Deliver `state` to observers synchronously, in registration order
    pub fn notify_observers(&self, state: &VehicleState) {
        for (i, observer) in self.observers.iter().enumerate() {
            match observer.try_borrow_mut() {
                Ok(mut observer) => observer.on_state_update(state),
                Err(e) => warn!("Observer {} busy, skipped: {}", i, e),
            }
        }
    }

    pub fn update_current_steering_angles(&mut self, steering_angles: SteeringAngles) {
        self.current_steering_angles = steering_angles;
    }

    /// Steering angles assumed for the next kinematic update
    pub fn estimate_steering_angles(&self) -> SteeringAngles {
        match self.drivetrain.kind {
            DrivetrainKind::Tank => SteeringAngles::default(),
            DrivetrainKind::Ackermann => self.current_steering_angles,
        }
    }

    pub fn show_values(&self) {
        let s = &self.estimated_state;
        debug!(
            "x={:.3} y={:.3} heading={:.3} v={:.3} w={:.3} offset={:?}",
            s.odometry.x,
            s.odometry.y,
            s.odometry.heading,
            s.velocity.linear,
            s.velocity.angular,
            self.fusion.heading_offset()
        );
    }

    fn capture_encoders(&mut self) -> WheelMap<EncoderCapture> {
        let mut captures = WheelMap::<EncoderCapture>::default();
        for (position, encoder) in self.encoders.iter_mut() {
            captures[position] = encoder.capture();
        }
        captures
    }

    /// Inertial reading for this cycle. A failed read degrades the cycle to
    /// kinematic heading.
    fn latest_heading(&mut self) -> Option<f64> {
        if self.fusion.source() != HeadingSource::InertialFused {
            return None;
        }
        let sensor = self.heading_sensor.as_mut()?;
        match sensor.latest_heading() {
            Ok(heading) => Some(heading),
            Err(e) => {
                warn!("Heading read failed, using kinematic heading: {}", e);
                None
            }
        }
    }

    fn calculate_velocities(&self, new_heading: f64, previous_heading: f64, distance: f64) -> Velocity {
        Velocity {
            linear: distance / self.period,
            angular: wrap_pi(new_heading - previous_heading) / self.period,
        }
    }
}

impl DriveTrainFeedback for StateEstimator {
    fn update_current_drive_train_state(&mut self, state: &DriveTrainState) {
        self.current_drive_train_state = *state;
        self.update_current_steering_angles(state.angles);
    }
}
