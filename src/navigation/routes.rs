//! Compiled route tables
//!
//! Rows are `[x, y, heading, speed]` in metres, radians and m/s. A row with a
//! NaN field terminates the route.

use crate::config::RouteConfig;
use crate::error::{Result, RoverError};

const NAN: f64 = f64::NAN;

/// Out and back along the causeway
pub const LAVA_PALAVA: &[[f64; 4]] = &[
    [0.0, 0.0, 0.0, 0.3],
    [0.0, 0.5, 0.0, 0.6],
    [0.0, 1.0, 0.0, 0.8],
    [0.0, 2.0, 0.0, 0.8],
    [0.0, 3.0, 0.0, 0.8],
    [0.0, 4.0, 0.0, 0.8],
    [0.0, 5.0, 0.0, 0.8],
    [0.0, 6.0, 0.0, 0.5],
    [0.0, 6.5, 0.0, 0.2],
    [NAN, NAN, NAN, NAN],
];

/// Visit the grid squares of a 1.6 m arena
pub const MINESWEEPER: &[[f64; 4]] = &[
    [0.0, 0.0, 0.0, 0.3],
    [0.0, 0.4, 0.0, 0.4],
    [0.4, 0.8, 0.0, 0.4],
    [0.8, 0.8, 0.0, 0.4],
    [1.2, 0.4, 0.0, 0.4],
    [1.2, 0.0, 0.0, 0.4],
    [0.8, -0.4, 0.0, 0.4],
    [0.4, -0.4, 0.0, 0.3],
    [0.0, 0.0, 0.0, 0.2],
    [NAN, NAN, NAN, NAN],
];

/// Loop of the 2.2 m arena, reversing with forklift steering
pub const ECO_DISASTER: &[[f64; 4]] = &[
    [0.0, 0.0, 0.0, 0.3],
    [0.0, 0.6, 0.0, 0.5],
    [0.5, 1.1, 0.0, 0.5],
    [1.1, 1.1, 0.0, 0.5],
    [1.6, 0.6, 0.0, 0.5],
    [1.6, 0.0, 0.0, 0.5],
    [1.1, -0.5, 0.0, 0.4],
    [0.5, -0.5, 0.0, 0.3],
    [NAN, NAN, NAN, NAN],
];

/// Look up a compiled route by name
pub fn compiled_route(name: &str) -> Option<&'static [[f64; 4]]> {
    match name {
        "lava_palava" => Some(LAVA_PALAVA),
        "minesweeper" => Some(MINESWEEPER),
        "eco_disaster" => Some(ECO_DISASTER),
        _ => None,
    }
}

/// Rows the waypoint buffer is seeded with. Inline waypoints win over a
/// named table; no route at all seeds an empty buffer.
pub fn resolve_route(config: &RouteConfig) -> Result<Vec<[f64; 4]>> {
    if !config.waypoints.is_empty() {
        return Ok(config.waypoints.clone());
    }
    match config.name.as_deref() {
        Some(name) => compiled_route(name)
            .map(<[_]>::to_vec)
            .ok_or_else(|| RoverError::UnknownRoute(name.to_string())),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_routes_are_nan_terminated() {
        for route in [LAVA_PALAVA, MINESWEEPER, ECO_DISASTER] {
            let last = route[route.len() - 1];
            assert!(last.iter().all(|v| v.is_nan()));
            assert!(route[..route.len() - 1]
                .iter()
                .all(|row| row.iter().all(|v| v.is_finite())));
        }
    }

    #[test]
    fn inline_waypoints_take_precedence() {
        let config = RouteConfig {
            name: Some("minesweeper".to_string()),
            waypoints: vec![[0.0, 1.0, 0.0, 0.5]],
        };
        assert_eq!(resolve_route(&config).unwrap(), vec![[0.0, 1.0, 0.0, 0.5]]);
    }

    #[test]
    fn named_route_is_resolved() {
        let config = RouteConfig {
            name: Some("eco_disaster".to_string()),
            waypoints: Vec::new(),
        };
        assert_eq!(resolve_route(&config).unwrap().len(), ECO_DISASTER.len());
    }

    #[test]
    fn unknown_route_is_an_error() {
        let config = RouteConfig {
            name: Some("temple_of_doom".to_string()),
            waypoints: Vec::new(),
        };
        assert!(matches!(resolve_route(&config), Err(RoverError::UnknownRoute(name)) if name == "temple_of_doom"));
        let none = RouteConfig {
            name: None,
            waypoints: Vec::new(),
        };
        assert!(resolve_route(&none).unwrap().is_empty());
    }
}
