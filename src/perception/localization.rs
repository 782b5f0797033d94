//! Dead reckoning and heading fusion
//!
//! Headings are clockwise from the +Y axis, so a positive heading moves the
//! rover towards +X.

use super::sensors::HeadingSensor;
use crate::common::{wrap_pi, Odometry, Side, SteeringAngles, WheelMap};
use crate::config::{HeadingSource, SteeringStyle};
use crate::error::{Result, RoverError};
use tracing::info;

/// Combine per-wheel travel into left and right chassis travel.
///
/// Steered wheels roll along their steering angle, so only the `cos` component
/// of their travel moves the chassis forward.
pub fn calculate_bilateral_speeds(
    wheel_travel: &WheelMap<f64>,
    steering_angles: SteeringAngles,
    style: SteeringStyle,
) -> (f64, f64) {
    let side_travel = |side: Side| {
        let angle = steering_angles.get(side);
        let (steered, fixed) = match style {
            SteeringStyle::Car => (side.front_wheel(), side.rear_wheel()),
            SteeringStyle::Forklift => (side.rear_wheel(), side.front_wheel()),
        };
        (wheel_travel[steered] * angle.cos() + wheel_travel[fixed]) / 2.0
    };
    (side_travel(Side::Left), side_travel(Side::Right))
}

/// Heading change of a skid-steered chassis
pub fn differential_heading_change(left: f64, right: f64, track: f64) -> f64 {
    (left - right) / track
}

/// Path curvature (1/radius, positive turning clockwise) implied by the steering angles
pub fn steering_curvature(
    steering_angles: SteeringAngles,
    wheel_base: f64,
    half_track: f64,
    style: SteeringStyle,
) -> f64 {
    let side_curvature = |side: Side| {
        let tan = (style.sign() * steering_angles.get(side)).tan();
        let lateral = side.lateral_sign() * half_track;
        tan / (wheel_base + lateral * tan)
    };
    (side_curvature(Side::Left) + side_curvature(Side::Right)) / 2.0
}

/// Advance a pose by `distance` along `heading`
pub fn calculate_new_position(odometry: &Odometry, distance: f64, heading: f64) -> Odometry {
    Odometry {
        x: odometry.x + distance * heading.sin(),
        y: odometry.y + distance * heading.cos(),
        heading: wrap_pi(heading),
    }
}

/// Resolves the estimator's heading from the kinematic prediction and,
/// when configured, an absolute inertial reading.
#[derive(Debug, Clone)]
pub struct HeadingFusion {
    source: HeadingSource,
    inertial_weight: f64,
    heading_offset: Option<f64>,
}

impl HeadingFusion {
    pub fn new(source: HeadingSource, inertial_weight: f64) -> Self {
        HeadingFusion {
            source,
            inertial_weight,
            heading_offset: None,
        }
    }

    pub fn source(&self) -> HeadingSource {
        self.source
    }

    pub fn heading_offset(&self) -> Option<f64> {
        self.heading_offset
    }

    /// Start the sensor and record its reading as the offset that makes the
    /// fused heading match `kinematic_heading` at startup.
    pub fn initialise_heading_offset(
        &mut self,
        sensor: &mut dyn HeadingSensor,
        kinematic_heading: f64,
    ) -> Result<()> {
        sensor
            .begin()
            .map_err(RoverError::HeadingSensorUnavailable)?;
        let raw = sensor
            .latest_heading()
            .map_err(RoverError::HeadingSensorUnavailable)?;
        let offset = wrap_pi(raw - kinematic_heading);
        info!("Heading offset initialised to {:.4} rad", offset);
        self.heading_offset = Some(offset);
        Ok(())
    }

    /// Absolute heading in the estimator frame, if an offset has been taken
    pub fn corrected_inertial(&self, raw: f64) -> Option<f64> {
        self.heading_offset.map(|offset| wrap_pi(raw - offset))
    }

    /// Fused heading for this cycle. Without a usable inertial reading the
    /// kinematic heading is used as is.
    pub fn fuse(&self, kinematic_heading: f64, raw_inertial: Option<f64>) -> f64 {
        let inertial = match self.source {
            HeadingSource::KinematicOnly => None,
            HeadingSource::InertialFused => raw_inertial.and_then(|raw| self.corrected_inertial(raw)),
        };
        match inertial {
            Some(absolute) => {
                let correction = wrap_pi(absolute - kinematic_heading);
                wrap_pi(kinematic_heading + self.inertial_weight * correction)
            }
            None => wrap_pi(kinematic_heading),
        }
    }
}
