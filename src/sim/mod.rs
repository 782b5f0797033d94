//! Simulated rover plant
//!
//! One shared [`SimPlant`] stands in for the chassis. Thin handles implement
//! each collaborator trait against it, so the whole control loop can run off
//! target. [`SimPlant::step`] advances the true pose from the last motor and
//! servo commands.

use crate::common::{wrap_pi, MotorPosition, Odometry, Side, SteeringAngles, WheelMap};
use crate::config::{DrivetrainConfig, DrivetrainKind, RoverConfig, SteeringStyle};
use crate::control::actuators::{SteeringServo, SteeringServos, WheelMotor};
use crate::control::mixer::MixerStrategy;
use crate::control::StateManager;
use crate::error::{ActuatorError, Result, SensorError};
use crate::navigation::receiver::{ManualCommand, Receiver};
use crate::navigation::Navigator;
use crate::perception::localization::steering_curvature;
use crate::perception::sensors::{EncoderCapture, HeadingSensor, WheelEncoder};
use crate::perception::StateEstimator;
use std::cell::RefCell;
use std::rc::Rc;

pub type SharedPlant = Rc<RefCell<SimPlant>>;

/// Ground truth and actuator state of the simulated chassis
#[derive(Debug, Clone)]
pub struct SimPlant {
    drivetrain: DrivetrainConfig,
    pose: Odometry,
    duty: WheelMap<f64>,
    servo_enabled: [bool; 2],
    steering: SteeringAngles,
    counts: WheelMap<f64>,
    captured: WheelMap<i64>,
    imu_offset: f64,
    imu_present: bool,
    imu_failing: bool,
    manual: Option<ManualCommand>,
    elapsed: f64,
}

impl SimPlant {
    pub fn new(drivetrain: &DrivetrainConfig) -> Self {
        SimPlant {
            drivetrain: drivetrain.clone(),
            pose: Odometry::default(),
            duty: WheelMap::splat(0.0),
            servo_enabled: [false; 2],
            steering: SteeringAngles::default(),
            counts: WheelMap::splat(0.0),
            captured: WheelMap::splat(0),
            imu_offset: 0.0,
            imu_present: true,
            imu_failing: false,
            manual: None,
            elapsed: 0.0,
        }
    }

    pub fn shared(self) -> SharedPlant {
        Rc::new(RefCell::new(self))
    }

    /// IMU reads `true heading + offset`, as a sensor mounted at an angle would
    pub fn with_imu_offset(mut self, offset: f64) -> Self {
        self.imu_offset = offset;
        self
    }

    pub fn without_imu(mut self) -> Self {
        self.imu_present = false;
        self
    }

    pub fn set_imu_failing(&mut self, failing: bool) {
        self.imu_failing = failing;
    }

    pub fn set_manual(&mut self, command: Option<ManualCommand>) {
        self.manual = command;
    }

    pub fn pose(&self) -> Odometry {
        self.pose
    }

    pub fn duty(&self) -> WheelMap<f64> {
        self.duty
    }

    pub fn steering(&self) -> SteeringAngles {
        self.steering
    }

    pub fn servo_enabled(&self, side: Side) -> bool {
        self.servo_enabled[side_index(side)]
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Advance the chassis by `dt` seconds
    pub fn step(&mut self, dt: f64) {
        let max_velocity = self.drivetrain.max_velocity;
        let wheel_speed = self.duty.map(|duty| duty * max_velocity);

        let distance_per_count = self.drivetrain.distance_per_count();
        for (position, counts) in self.counts.iter_mut() {
            *counts += wheel_speed[position] * dt / distance_per_count;
        }

        let (linear, angular) = match self.drivetrain.kind {
            DrivetrainKind::Tank => {
                let left = (wheel_speed[MotorPosition::FrontLeft]
                    + wheel_speed[MotorPosition::RearLeft])
                    / 2.0;
                let right = (wheel_speed[MotorPosition::FrontRight]
                    + wheel_speed[MotorPosition::RearRight])
                    / 2.0;
                ((left + right) / 2.0, (left - right) / self.drivetrain.wheel_track)
            }
            DrivetrainKind::Ackermann => {
                // the fixed axle rolls without side slip, so it sets the pace
                let (left, right) = match self.drivetrain.steering_style {
                    SteeringStyle::Car => (MotorPosition::RearLeft, MotorPosition::RearRight),
                    SteeringStyle::Forklift => {
                        (MotorPosition::FrontLeft, MotorPosition::FrontRight)
                    }
                };
                let linear = (wheel_speed[left] + wheel_speed[right]) / 2.0;
                let curvature = steering_curvature(
                    self.steering,
                    self.drivetrain.wheel_base,
                    self.drivetrain.half_track(),
                    self.drivetrain.steering_style,
                );
                (linear, linear * curvature)
            }
        };

        let mid_heading = self.pose.heading + angular * dt / 2.0;
        self.pose.x += linear * dt * mid_heading.sin();
        self.pose.y += linear * dt * mid_heading.cos();
        self.pose.heading = wrap_pi(self.pose.heading + angular * dt);
        self.elapsed += dt;
    }

    fn capture(&mut self, position: MotorPosition) -> EncoderCapture {
        let count = self.counts[position].floor() as i64;
        let delta = count - self.captured[position];
        self.captured[position] = count;
        EncoderCapture {
            delta: delta.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            count,
        }
    }
}

fn side_index(side: Side) -> usize {
    match side {
        Side::Left => 0,
        Side::Right => 1,
    }
}

pub struct SimEncoder {
    plant: SharedPlant,
    position: MotorPosition,
}

impl WheelEncoder for SimEncoder {
    fn capture(&mut self) -> EncoderCapture {
        self.plant.borrow_mut().capture(self.position)
    }
}

pub struct SimImu {
    plant: SharedPlant,
}

impl HeadingSensor for SimImu {
    fn begin(&mut self) -> std::result::Result<(), SensorError> {
        if self.plant.borrow().imu_present {
            Ok(())
        } else {
            Err(SensorError::NotDetected)
        }
    }

    fn latest_heading(&mut self) -> std::result::Result<f64, SensorError> {
        let plant = self.plant.borrow();
        if !plant.imu_present {
            return Err(SensorError::NotDetected);
        }
        if plant.imu_failing {
            return Err(SensorError::Read("no report".to_string()));
        }
        Ok(wrap_pi(plant.pose.heading + plant.imu_offset))
    }
}

pub struct SimMotor {
    plant: SharedPlant,
    position: MotorPosition,
}

impl WheelMotor for SimMotor {
    fn set_speed(&mut self, speed: f64) -> std::result::Result<(), ActuatorError> {
        if !(-1.0..=1.0).contains(&speed) {
            return Err(ActuatorError::Rejected(format!("duty {speed} out of range")));
        }
        self.plant.borrow_mut().duty[self.position] = speed;
        Ok(())
    }
}

pub struct SimServo {
    plant: SharedPlant,
    side: Side,
}

impl SteeringServo for SimServo {
    fn enable(&mut self) -> std::result::Result<(), ActuatorError> {
        self.plant.borrow_mut().servo_enabled[side_index(self.side)] = true;
        Ok(())
    }

    fn disable(&mut self) -> std::result::Result<(), ActuatorError> {
        self.plant.borrow_mut().servo_enabled[side_index(self.side)] = false;
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.plant.borrow().servo_enabled(self.side)
    }

    fn set_angle(&mut self, angle: f64) -> std::result::Result<(), ActuatorError> {
        let mut plant = self.plant.borrow_mut();
        if !plant.servo_enabled(self.side) {
            return Err(ActuatorError::Rejected("servo disabled".to_string()));
        }
        match self.side {
            Side::Left => plant.steering.left = angle,
            Side::Right => plant.steering.right = angle,
        }
        Ok(())
    }
}

pub struct SimReceiver {
    plant: SharedPlant,
}

impl Receiver for SimReceiver {
    fn latest_command(&mut self) -> Option<ManualCommand> {
        self.plant.borrow().manual
    }
}

pub fn encoders(plant: &SharedPlant) -> WheelMap<Box<dyn WheelEncoder>> {
    WheelMap::from_fn(|position| {
        Box::new(SimEncoder {
            plant: Rc::clone(plant),
            position,
        }) as Box<dyn WheelEncoder>
    })
}

pub fn motors(plant: &SharedPlant) -> WheelMap<Box<dyn WheelMotor>> {
    WheelMap::from_fn(|position| {
        Box::new(SimMotor {
            plant: Rc::clone(plant),
            position,
        }) as Box<dyn WheelMotor>
    })
}

pub fn steering_servos(plant: &SharedPlant) -> SteeringServos {
    SteeringServos {
        left: Box::new(SimServo {
            plant: Rc::clone(plant),
            side: Side::Left,
        }),
        right: Box::new(SimServo {
            plant: Rc::clone(plant),
            side: Side::Right,
        }),
    }
}

pub fn heading_sensor(plant: &SharedPlant) -> Box<dyn HeadingSensor> {
    Box::new(SimImu {
        plant: Rc::clone(plant),
    })
}

pub fn receiver(plant: &SharedPlant) -> Box<dyn Receiver> {
    Box::new(SimReceiver {
        plant: Rc::clone(plant),
    })
}

/// Build the full control pipeline against `plant`
pub fn build_navigator(config: &RoverConfig, plant: &SharedPlant) -> Result<Navigator> {
    let estimator = StateEstimator::new(
        &config.drivetrain,
        &config.estimator,
        encoders(plant),
        Some(heading_sensor(plant)),
    )?;

    let mut state_manager = StateManager::new(
        MixerStrategy::from_config(&config.drivetrain),
        motors(plant),
        config.control.steering_lockout_speed,
    );
    if config.drivetrain.kind == DrivetrainKind::Ackermann {
        state_manager = state_manager.with_steering(steering_servos(plant));
    }

    Navigator::new(config, estimator, state_manager, Some(receiver(plant)))
}
