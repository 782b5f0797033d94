//! Drivetrain mixers
//!
//! A mixer turns a chassis command (linear m/s, angular rad/s clockwise) into
//! normalised wheel duties and steering angles. Mixers are pure: actuator I/O
//! belongs to the [`StateManager`](super::StateManager).

use crate::common::{DriveTrainState, MotorPosition, Side, SteeringAngles, WheelSpeeds};
use crate::config::{DrivetrainConfig, DrivetrainKind, SteeringStyle};

/// Commands smaller than this are treated as zero
const EPSILON: f64 = 1e-6;

/// Kinematics variant, fixed at build time
#[derive(Debug, Clone, PartialEq)]
pub enum MixerStrategy {
    Tank(TankMixer),
    Ackermann(AckermannMixer),
}

impl MixerStrategy {
    pub fn from_config(config: &DrivetrainConfig) -> Self {
        match config.kind {
            DrivetrainKind::Tank => MixerStrategy::Tank(TankMixer::from_config(config)),
            DrivetrainKind::Ackermann => {
                MixerStrategy::Ackermann(AckermannMixer::from_config(config))
            }
        }
    }

    pub fn mix(&self, linear: f64, angular: f64) -> DriveTrainState {
        if !linear.is_finite() || !angular.is_finite() {
            return DriveTrainState::idle();
        }
        match self {
            MixerStrategy::Tank(mixer) => mixer.mix(linear, angular),
            MixerStrategy::Ackermann(mixer) => mixer.mix(linear, angular),
        }
    }

    pub fn kind(&self) -> DrivetrainKind {
        match self {
            MixerStrategy::Tank(_) => DrivetrainKind::Tank,
            MixerStrategy::Ackermann(_) => DrivetrainKind::Ackermann,
        }
    }

    /// The wheel whose steering servo sits on `side`
    pub fn steered_wheel(&self, side: Side) -> MotorPosition {
        match self {
            MixerStrategy::Ackermann(AckermannMixer {
                style: SteeringStyle::Forklift,
                ..
            }) => side.rear_wheel(),
            _ => side.front_wheel(),
        }
    }
}

/// Differential (skid) steering. Both wheels on a side get the same duty.
#[derive(Debug, Clone, PartialEq)]
pub struct TankMixer {
    half_track: f64,
    max_velocity: f64,
    max_angular_velocity: f64,
    speed_extent: f64,
}

impl TankMixer {
    pub fn from_config(config: &DrivetrainConfig) -> Self {
        TankMixer {
            half_track: config.half_track(),
            max_velocity: config.max_velocity,
            max_angular_velocity: config.max_angular_velocity,
            speed_extent: config.speed_extent,
        }
    }

    pub fn mix(&self, linear: f64, angular: f64) -> DriveTrainState {
        let angular = angular.clamp(-self.max_angular_velocity, self.max_angular_velocity);
        // positive angular is clockwise, so the left side runs faster
        let left = (linear + angular * self.half_track) / self.max_velocity;
        let right = (linear - angular * self.half_track) / self.max_velocity;

        let mut speeds = WheelSpeeds::new(left, right, left, right);
        desaturate(&mut speeds, self.speed_extent);

        DriveTrainState {
            speeds,
            angles: SteeringAngles::default(),
        }
    }
}

/// Steered chassis where every wheel rolls on a circle about one turn centre.
///
/// The turn centre lies on the line of the fixed axle; the commanded linear
/// velocity is the velocity of that axle's midpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct AckermannMixer {
    wheel_base: f64,
    half_track: f64,
    max_steering_angle: f64,
    style: SteeringStyle,
    max_velocity: f64,
    max_angular_velocity: f64,
    speed_extent: f64,
}

impl AckermannMixer {
    pub fn from_config(config: &DrivetrainConfig) -> Self {
        AckermannMixer {
            wheel_base: config.wheel_base,
            half_track: config.half_track(),
            max_steering_angle: config.max_steering_angle,
            style: config.steering_style,
            max_velocity: config.max_velocity,
            max_angular_velocity: config.max_angular_velocity,
            speed_extent: config.speed_extent,
        }
    }

    /// Tightest turn radius reachable before the inner wheel hits its steering stop
    pub fn min_turn_radius(&self) -> f64 {
        self.wheel_base / self.max_steering_angle.tan() + self.half_track
    }

    pub fn mix(&self, linear: f64, angular: f64) -> DriveTrainState {
        // an Ackermann chassis cannot pivot on the spot
        if linear.abs() < EPSILON {
            return DriveTrainState::idle();
        }

        let angular = angular.clamp(-self.max_angular_velocity, self.max_angular_velocity);
        let duty = linear / self.max_velocity;
        if angular.abs() < EPSILON {
            let mut speeds = WheelSpeeds::splat(duty);
            desaturate(&mut speeds, self.speed_extent);
            return DriveTrainState {
                speeds,
                angles: SteeringAngles::default(),
            };
        }

        // signed radius, positive when the centre is to the right
        let mut radius = linear / angular;
        let min_radius = self.min_turn_radius();
        if radius.abs() < min_radius {
            radius = min_radius.copysign(radius);
        }

        let mut steered = [0.0; 2];
        let mut fixed = [0.0; 2];
        let mut angles = [0.0; 2];
        for (i, side) in Side::BOTH.into_iter().enumerate() {
            let lateral = radius - side.lateral_sign() * self.half_track;
            angles[i] = (self.wheel_base / lateral)
                .atan()
                .clamp(-self.max_steering_angle, self.max_steering_angle);
            steered[i] = duty * lateral.hypot(self.wheel_base) / radius.abs();
            fixed[i] = duty * lateral.abs() / radius.abs();
        }

        let (front, rear) = match self.style {
            SteeringStyle::Car => (steered, fixed),
            SteeringStyle::Forklift => (fixed, steered),
        };
        let sign = self.style.sign();

        let mut speeds = WheelSpeeds::new(front[0], front[1], rear[0], rear[1]);
        desaturate(&mut speeds, self.speed_extent);

        DriveTrainState {
            speeds,
            angles: SteeringAngles::new(sign * angles[0], sign * angles[1]),
        }
    }
}

/// Scale all wheels down together so the fastest sits at `extent`
fn desaturate(speeds: &mut WheelSpeeds, extent: f64) {
    let peak = speeds.iter().fold(0.0_f64, |acc, (_, s)| acc.max(s.abs()));
    if peak > extent {
        let scale = extent / peak;
        for (_, speed) in speeds.iter_mut() {
            *speed *= scale;
        }
    }
}
