//! Value types passed between the estimator, the navigators and the drivetrain

use nalgebra::Point2;
use std::ops::{Index, IndexMut};

/// Wheel positions on the chassis. Index domain for every per-wheel array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorPosition {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
}

impl MotorPosition {
    pub const COUNT: usize = 4;

    pub const ALL: [MotorPosition; MotorPosition::COUNT] = [
        MotorPosition::FrontLeft,
        MotorPosition::FrontRight,
        MotorPosition::RearLeft,
        MotorPosition::RearRight,
    ];

    pub const fn index(self) -> usize {
        match self {
            MotorPosition::FrontLeft => 0,
            MotorPosition::FrontRight => 1,
            MotorPosition::RearLeft => 2,
            MotorPosition::RearRight => 3,
        }
    }

    pub const fn side(self) -> Side {
        match self {
            MotorPosition::FrontLeft | MotorPosition::RearLeft => Side::Left,
            MotorPosition::FrontRight | MotorPosition::RearRight => Side::Right,
        }
    }

    pub const fn is_front(self) -> bool {
        matches!(self, MotorPosition::FrontLeft | MotorPosition::FrontRight)
    }
}

/// Chassis side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    /// Lateral offset sign, positive to the right of the chassis centre line.
    pub const fn lateral_sign(self) -> f64 {
        match self {
            Side::Left => -1.0,
            Side::Right => 1.0,
        }
    }

    pub const fn front_wheel(self) -> MotorPosition {
        match self {
            Side::Left => MotorPosition::FrontLeft,
            Side::Right => MotorPosition::FrontRight,
        }
    }

    pub const fn rear_wheel(self) -> MotorPosition {
        match self {
            Side::Left => MotorPosition::RearLeft,
            Side::Right => MotorPosition::RearRight,
        }
    }
}

/// Fixed array of four values indexed by [`MotorPosition`]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelMap<T>([T; MotorPosition::COUNT]);

impl<T> WheelMap<T> {
    pub const fn new(front_left: T, front_right: T, rear_left: T, rear_right: T) -> Self {
        WheelMap([front_left, front_right, rear_left, rear_right])
    }

    pub fn from_fn(f: impl FnMut(MotorPosition) -> T) -> Self {
        WheelMap(MotorPosition::ALL.map(f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (MotorPosition, &T)> {
        MotorPosition::ALL.into_iter().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (MotorPosition, &mut T)> {
        MotorPosition::ALL.into_iter().zip(self.0.iter_mut())
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> WheelMap<U> {
        WheelMap::from_fn(|position| f(&self[position]))
    }
}

impl<T: Copy> WheelMap<T> {
    pub const fn splat(value: T) -> Self {
        WheelMap([value; MotorPosition::COUNT])
    }
}

impl<T> Index<MotorPosition> for WheelMap<T> {
    type Output = T;

    fn index(&self, position: MotorPosition) -> &T {
        &self.0[position.index()]
    }
}

impl<T> IndexMut<MotorPosition> for WheelMap<T> {
    fn index_mut(&mut self, position: MotorPosition) -> &mut T {
        &mut self.0[position.index()]
    }
}

/// Normalised wheel duty commands in [-1, 1]
pub type WheelSpeeds = WheelMap<f64>;

/// Steering servo commands in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SteeringAngles {
    pub left: f64,
    pub right: f64,
}

impl SteeringAngles {
    pub const fn new(left: f64, right: f64) -> Self {
        SteeringAngles { left, right }
    }

    pub const fn get(&self, side: Side) -> f64 {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }
}

/// Per-actuator commands produced by the mixer for one control cycle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveTrainState {
    pub speeds: WheelSpeeds,
    /// Only meaningful for Ackermann drivetrains.
    pub angles: SteeringAngles,
}

impl DriveTrainState {
    /// All wheels stopped, steering centred
    pub fn idle() -> Self {
        DriveTrainState::default()
    }
}

/// Dead-reckoned pose. Heading is clockwise from the +Y ("north") axis, in [-pi, pi].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Odometry {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Odometry {
    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Velocity {
    /// m/s
    pub linear: f64,
    /// rad/s, positive clockwise
    pub angular: f64,
}

/// Snapshot published once per estimation cycle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VehicleState {
    pub odometry: Odometry,
    pub velocity: Velocity,
}

impl VehicleState {
    pub fn at(x: f64, y: f64, heading: f64) -> Self {
        VehicleState {
            odometry: Odometry { x, y, heading },
            velocity: Velocity::default(),
        }
    }
}

/// Requested motion for one cycle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocityCommand {
    pub linear: f64,
    pub angular: f64,
}

impl VelocityCommand {
    pub const fn new(linear: f64, angular: f64) -> Self {
        VelocityCommand { linear, angular }
    }

    /// Zero velocity, zero turn rate
    pub const fn idle() -> Self {
        VelocityCommand {
            linear: 0.0,
            angular: 0.0,
        }
    }
}

/// A route point. Any NaN field marks an unpopulated buffer slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    /// Reserved, not used by the current navigation law.
    pub heading: f64,
    /// Velocity to command while this waypoint is the nearest one.
    pub speed: f64,
}

impl Waypoint {
    pub const EMPTY: Waypoint = Waypoint {
        x: f64::NAN,
        y: f64::NAN,
        heading: f64::NAN,
        speed: f64::NAN,
    };

    pub const fn new(x: f64, y: f64, heading: f64, speed: f64) -> Self {
        Waypoint {
            x,
            y,
            heading,
            speed,
        }
    }

    /// Build from a route table row `[x, y, heading, speed]`
    pub const fn from_row(row: [f64; 4]) -> Self {
        Waypoint::new(row[0], row[1], row[2], row[3])
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_nan() || self.y.is_nan() || self.heading.is_nan() || self.speed.is_nan()
    }

    pub fn position(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

impl Default for Waypoint {
    fn default() -> Self {
        Waypoint::EMPTY
    }
}
