//! Rover configuration
//!
//! Every field has a default, so a TOML file only needs to name what differs
//! from the compiled-in vehicle.

use crate::error::{Result, RoverError};
use serde::Deserialize;
use std::f64::consts::{FRAC_PI_2, PI};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for one rover build
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RoverConfig {
    #[serde(default)]
    pub drivetrain: DrivetrainConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub navigation: NavigationConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub route: RouteConfig,
}

/// Drivetrain kinematics variant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrivetrainKind {
    Tank,
    Ackermann,
}

/// Which axle steers on an Ackermann chassis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringStyle {
    /// Front wheels steer
    Car,
    /// Rear wheels steer
    Forklift,
}

impl SteeringStyle {
    pub const fn sign(self) -> f64 {
        match self {
            SteeringStyle::Car => 1.0,
            SteeringStyle::Forklift => -1.0,
        }
    }
}

/// Where the estimator takes its heading from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingSource {
    /// Integrate heading from wheel travel and steering geometry
    KinematicOnly,
    /// Correct the kinematic heading with an absolute inertial reading
    InertialFused,
}

/// How manual and autonomous commands are resolved each cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPolicy {
    /// A fresh stick input outside the deadband wins, otherwise autonomous
    ManualOverride,
    /// The receiver's autonomy switch selects the source; no signal means stop
    ModeSwitch,
}

/// Chassis geometry, gearing and actuator limits
#[derive(Clone, Debug, Deserialize)]
pub struct DrivetrainConfig {
    #[serde(default = "default_kind")]
    pub kind: DrivetrainKind,

    #[serde(default = "default_steering_style")]
    pub steering_style: SteeringStyle,

    /// Front to rear axle distance in meters (default: 0.18)
    #[serde(default = "default_wheel_base")]
    pub wheel_base: f64,

    /// Left to right wheel distance in meters (default: 0.15)
    #[serde(default = "default_wheel_track")]
    pub wheel_track: f64,

    /// Wheel diameter in meters (default: 0.052)
    #[serde(default = "default_wheel_diameter")]
    pub wheel_diameter: f64,

    /// Gearmotor reduction, motor turns per wheel turn (default: 19.22)
    #[serde(default = "default_gear_ratio")]
    pub gear_ratio: f64,

    /// Encoder counts per motor shaft revolution (default: 3)
    #[serde(default = "default_motor_counts_per_rev")]
    pub motor_counts_per_rev: f64,

    /// Steering servo travel either side of centre in radians (default: pi/4)
    #[serde(default = "default_max_steering_angle")]
    pub max_steering_angle: f64,

    /// Largest normalised wheel command the mixer emits (default: 1.0)
    #[serde(default = "default_speed_extent")]
    pub speed_extent: f64,

    /// Wheel surface speed at full duty in m/s (default: 1.28)
    #[serde(default = "default_max_velocity")]
    pub max_velocity: f64,

    /// Chassis turn rate limit in rad/s, applied by the mixers (default: 17.0)
    #[serde(default = "default_max_angular_velocity")]
    pub max_angular_velocity: f64,
}

impl DrivetrainConfig {
    pub fn half_track(&self) -> f64 {
        self.wheel_track / 2.0
    }

    pub fn counts_per_wheel_rev(&self) -> f64 {
        self.motor_counts_per_rev * self.gear_ratio
    }

    /// Wheel travel in meters for one encoder count
    pub fn distance_per_count(&self) -> f64 {
        PI * self.wheel_diameter / self.counts_per_wheel_rev()
    }
}

impl Default for DrivetrainConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            steering_style: default_steering_style(),
            wheel_base: default_wheel_base(),
            wheel_track: default_wheel_track(),
            wheel_diameter: default_wheel_diameter(),
            gear_ratio: default_gear_ratio(),
            motor_counts_per_rev: default_motor_counts_per_rev(),
            max_steering_angle: default_max_steering_angle(),
            speed_extent: default_speed_extent(),
            max_velocity: default_max_velocity(),
            max_angular_velocity: default_max_angular_velocity(),
        }
    }
}

/// State estimator settings
#[derive(Clone, Debug, Deserialize)]
pub struct EstimatorConfig {
    /// Estimation and control period in milliseconds (default: 50)
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,

    #[serde(default = "default_heading_source")]
    pub heading_source: HeadingSource,

    /// Share of the inertial correction applied each cycle, 1.0 substitutes (default: 1.0)
    #[serde(default = "default_inertial_weight")]
    pub inertial_weight: f64,
}

impl EstimatorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn period_secs(&self) -> f64 {
        self.period().as_secs_f64()
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            heading_source: default_heading_source(),
            inertial_weight: default_inertial_weight(),
        }
    }
}

/// Heading controller gains
#[derive(Clone, Debug, Deserialize)]
pub struct HeadingPidConfig {
    #[serde(default = "default_heading_kp")]
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    /// Limit applied to each term and to the summed output
    #[serde(default = "default_heading_limit")]
    pub limit: f64,
}

impl Default for HeadingPidConfig {
    fn default() -> Self {
        Self {
            kp: default_heading_kp(),
            ki: 0.0,
            kd: 0.0,
            limit: default_heading_limit(),
        }
    }
}

/// Waypoint navigation and command blending
#[derive(Clone, Debug, Deserialize)]
pub struct NavigationConfig {
    /// Radius inside which waypoints are passed over as steering targets (default: 0.3)
    #[serde(default = "default_look_ahead")]
    pub look_ahead: f64,

    /// Clamp on the commanded turn rate in rad/s (default: 2.0)
    #[serde(default = "default_max_turn_velocity")]
    pub max_turn_velocity: f64,

    #[serde(default)]
    pub heading_pid: HeadingPidConfig,

    /// Number of waypoint slots (default: 32)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Return the progression indices to the start when the buffer is cleared (default: true)
    #[serde(default = "default_reset_progress_on_clear")]
    pub reset_progress_on_clear: bool,

    #[serde(default = "default_policy")]
    pub policy: NavigationPolicy,

    /// Manual inputs at or below this magnitude count as centred sticks (default: 0.05)
    #[serde(default = "default_manual_deadband")]
    pub manual_deadband: f64,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            look_ahead: default_look_ahead(),
            max_turn_velocity: default_max_turn_velocity(),
            heading_pid: HeadingPidConfig::default(),
            buffer_capacity: default_buffer_capacity(),
            reset_progress_on_clear: default_reset_progress_on_clear(),
            policy: default_policy(),
            manual_deadband: default_manual_deadband(),
        }
    }
}

/// Actuation and scheduling
#[derive(Clone, Debug, Deserialize)]
pub struct ControlConfig {
    /// Below this wheel command magnitude the steering servo on that side is released (default: 0.05)
    #[serde(default = "default_steering_lockout_speed")]
    pub steering_lockout_speed: f64,

    /// Control cycles between slow housekeeping polls (default: 20)
    #[serde(default = "default_secondary_poll_every")]
    pub secondary_poll_every: u32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            steering_lockout_speed: default_steering_lockout_speed(),
            secondary_poll_every: default_secondary_poll_every(),
        }
    }
}

/// Route used to seed the waypoint buffer
#[derive(Clone, Debug, Deserialize)]
pub struct RouteConfig {
    /// Name of a compiled route table, ignored when `waypoints` is non-empty
    #[serde(default = "default_route_name")]
    pub name: Option<String>,

    /// Inline `[x, y, heading, speed]` rows
    #[serde(default)]
    pub waypoints: Vec<[f64; 4]>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            name: default_route_name(),
            waypoints: Vec::new(),
        }
    }
}

impl RoverConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: RoverConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.drivetrain;
        positive("drivetrain.wheel_base", d.wheel_base)?;
        positive("drivetrain.wheel_track", d.wheel_track)?;
        positive("drivetrain.wheel_diameter", d.wheel_diameter)?;
        positive("drivetrain.gear_ratio", d.gear_ratio)?;
        positive("drivetrain.motor_counts_per_rev", d.motor_counts_per_rev)?;
        if !(d.max_steering_angle > 0.0 && d.max_steering_angle < FRAC_PI_2) {
            return Err(RoverError::Config(
                "drivetrain.max_steering_angle must be in (0, pi/2)".to_string(),
            ));
        }
        positive("drivetrain.max_velocity", d.max_velocity)?;
        positive("drivetrain.max_angular_velocity", d.max_angular_velocity)?;
        if !(d.speed_extent > 0.0 && d.speed_extent <= 1.0) {
            return Err(RoverError::Config(
                "drivetrain.speed_extent must be in (0, 1]".to_string(),
            ));
        }

        if self.estimator.period_ms == 0 {
            return Err(RoverError::Config(
                "estimator.period_ms must be positive".to_string(),
            ));
        }
        let w = self.estimator.inertial_weight;
        if !(w > 0.0 && w <= 1.0) {
            return Err(RoverError::Config(
                "estimator.inertial_weight must be in (0, 1]".to_string(),
            ));
        }

        let n = &self.navigation;
        positive("navigation.look_ahead", n.look_ahead)?;
        positive("navigation.max_turn_velocity", n.max_turn_velocity)?;
        positive("navigation.heading_pid.limit", n.heading_pid.limit)?;
        if n.buffer_capacity == 0 {
            return Err(RoverError::Config(
                "navigation.buffer_capacity must be positive".to_string(),
            ));
        }
        if n.manual_deadband < 0.0 {
            return Err(RoverError::Config(
                "navigation.manual_deadband must not be negative".to_string(),
            ));
        }

        if self.control.steering_lockout_speed < 0.0 {
            return Err(RoverError::Config(
                "control.steering_lockout_speed must not be negative".to_string(),
            ));
        }
        if self.control.secondary_poll_every == 0 {
            return Err(RoverError::Config(
                "control.secondary_poll_every must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(RoverError::Config(format!("{name} must be positive")))
    }
}

// Default value functions
fn default_kind() -> DrivetrainKind {
    DrivetrainKind::Ackermann
}
fn default_steering_style() -> SteeringStyle {
    SteeringStyle::Car
}
fn default_wheel_base() -> f64 {
    0.18
}
fn default_wheel_track() -> f64 {
    0.15
}
fn default_wheel_diameter() -> f64 {
    0.052
}
fn default_gear_ratio() -> f64 {
    19.22
}
fn default_motor_counts_per_rev() -> f64 {
    3.0
}
fn default_max_steering_angle() -> f64 {
    PI / 4.0
}
fn default_speed_extent() -> f64 {
    1.0
}
fn default_max_velocity() -> f64 {
    1.28
}
fn default_max_angular_velocity() -> f64 {
    17.0
}
fn default_period_ms() -> u64 {
    50
}
fn default_heading_source() -> HeadingSource {
    HeadingSource::InertialFused
}
fn default_inertial_weight() -> f64 {
    1.0
}
fn default_heading_kp() -> f64 {
    4.0
}
fn default_heading_limit() -> f64 {
    10.0
}
fn default_look_ahead() -> f64 {
    0.3
}
fn default_max_turn_velocity() -> f64 {
    2.0
}
fn default_buffer_capacity() -> usize {
    32
}
fn default_reset_progress_on_clear() -> bool {
    true
}
fn default_policy() -> NavigationPolicy {
    NavigationPolicy::ManualOverride
}
fn default_manual_deadband() -> f64 {
    0.05
}
fn default_steering_lockout_speed() -> f64 {
    0.05
}
fn default_secondary_poll_every() -> u32 {
    20
}
fn default_route_name() -> Option<String> {
    Some("lava_palava".to_string())
}
