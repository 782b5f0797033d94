//! Drivetrain control: mixing, actuation and the control timer
pub mod actuators;
pub mod mixer;
pub mod timer;

use self::actuators::{SteeringServo, SteeringServos, WheelMotor};
use self::mixer::MixerStrategy;
use crate::common::{DriveTrainState, Side, VelocityCommand, WheelMap};
use tracing::{debug, warn};

/// Receiver of the drivetrain state actually sent to the actuators
pub trait DriveTrainFeedback {
    fn update_current_drive_train_state(&mut self, state: &DriveTrainState);
}

/// Runs one actuation step per control cycle.
///
/// The state manager is the only component that talks to motor and servo
/// drivers. It keeps the last applied [`DriveTrainState`] as the single
/// source of truth for what the actuators were told.
pub struct StateManager {
    mixer: MixerStrategy,
    motors: WheelMap<Box<dyn WheelMotor>>,
    steering: Option<SteeringServos>,
    steering_lockout_speed: f64,
    current_drive_train_state: DriveTrainState,
}

impl StateManager {
    /// Create a state manager driving the four wheel motors
    pub fn new(
        mixer: MixerStrategy,
        motors: WheelMap<Box<dyn WheelMotor>>,
        steering_lockout_speed: f64,
    ) -> Self {
        debug!("State manager created for {:?} drivetrain", mixer.kind());
        StateManager {
            mixer,
            motors,
            steering: None,
            steering_lockout_speed,
            current_drive_train_state: DriveTrainState::idle(),
        }
    }

    /// Attach the steering servos of an Ackermann chassis
    pub fn with_steering(mut self, servos: SteeringServos) -> Self {
        self.steering = Some(servos);
        self
    }

    pub fn mixer(&self) -> &MixerStrategy {
        &self.mixer
    }

    pub fn current_drive_train_state(&self) -> DriveTrainState {
        self.current_drive_train_state
    }

    /// Mix the requested motion, drive the actuators and feed the result back
    pub fn request_state(
        &mut self,
        requested: VelocityCommand,
        feedback: &mut dyn DriveTrainFeedback,
    ) -> DriveTrainState {
        let drive_train_state = self.mixer.mix(requested.linear, requested.angular);
        self.set_drive_train_state(drive_train_state);
        feedback.update_current_drive_train_state(&drive_train_state);
        drive_train_state
    }

    fn set_drive_train_state(&mut self, state: DriveTrainState) {
        for (position, motor) in self.motors.iter_mut() {
            if let Err(e) = motor.set_speed(state.speeds[position]) {
                warn!("Motor {:?} rejected speed: {}", position, e);
            }
        }
        for side in Side::BOTH {
            self.set_servo_steering_angle(&state, side);
        }
        self.current_drive_train_state = state;
    }

    /// Drive one steering servo, releasing it while its wheel is (nearly) stopped
    fn set_servo_steering_angle(&mut self, state: &DriveTrainState, side: Side) {
        let speed = state.speeds[self.mixer.steered_wheel(side)];
        let angle = state.angles.get(side);
        let lockout = self.steering_lockout_speed;
        let Some(servos) = self.steering.as_mut() else {
            return;
        };
        let servo: &mut dyn SteeringServo = match side {
            Side::Left => servos.left.as_mut(),
            Side::Right => servos.right.as_mut(),
        };

        if speed.abs() > lockout {
            if !servo.is_enabled() {
                if let Err(e) = servo.enable() {
                    warn!("{:?} steering servo failed to enable: {}", side, e);
                }
            }
            if let Err(e) = servo.set_angle(angle) {
                warn!("{:?} steering servo rejected angle: {}", side, e);
            }
        } else if let Err(e) = servo.disable() {
            warn!("{:?} steering servo failed to disable: {}", side, e);
        }
    }
}
