//! Angle helpers

use std::f64::consts::{PI, TAU};

/// Constrain a heading to [-pi, pi] without changing the direction it describes.
///
/// Values already inside the range are returned untouched, so `pi` stays `pi`.
pub fn wrap_pi(heading: f64) -> f64 {
    if (-PI..=PI).contains(&heading) {
        return heading;
    }
    (heading + PI).rem_euclid(TAU) - PI
}
