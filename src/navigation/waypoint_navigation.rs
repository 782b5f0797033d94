//! Waypoint navigation
//!
//! Speed comes from the waypoint nearest the rover, turn rate from a heading
//! PID aimed at a look-ahead target further along the route. Both indices only
//! ever move forward.

use super::routes::resolve_route;
use super::waypoints::WaypointBuffer;
use crate::common::{wrap_pi, VehicleState, VelocityCommand, Waypoint};
use crate::config::{HeadingPidConfig, NavigationConfig, RouteConfig};
use crate::error::Result;
use crate::perception::StateObserver;
use pid::Pid;
use std::f64::consts::FRAC_PI_2;
use tracing::{debug, info, warn};

/// Build the heading controller. It regulates the wrapped heading error to a
/// fixed zero setpoint, so the measurement stays continuous as the bearing
/// crosses +-pi.
fn heading_pid(config: &HeadingPidConfig) -> Pid<f64> {
    *Pid::new(0.0, config.limit)
        .p(config.kp, config.limit)
        .i(config.ki, config.limit)
        .d(config.kd, config.limit)
}

pub struct WaypointNavigator {
    buffer: WaypointBuffer,
    look_ahead: f64,
    max_turn_velocity: f64,
    reset_progress_on_clear: bool,
    heading_pid: Pid<f64>,
    nearest_waypoint_index: usize,
    target_waypoint_index: usize,
    bearing_to_target: f64,
    desired: VelocityCommand,
    latest_state: Option<VehicleState>,
}

impl WaypointNavigator {
    pub fn new(config: &NavigationConfig, buffer: WaypointBuffer) -> Self {
        WaypointNavigator {
            buffer,
            look_ahead: config.look_ahead,
            max_turn_velocity: config.max_turn_velocity,
            reset_progress_on_clear: config.reset_progress_on_clear,
            heading_pid: heading_pid(&config.heading_pid),
            nearest_waypoint_index: 0,
            target_waypoint_index: 0,
            bearing_to_target: 0.0,
            desired: VelocityCommand::idle(),
            latest_state: None,
        }
    }

    /// Navigator seeded with the configured route
    pub fn from_config(config: &NavigationConfig, route: &RouteConfig) -> Result<Self> {
        let rows = resolve_route(route)?;
        let buffer = WaypointBuffer::from_route(config.buffer_capacity, &rows);
        info!(
            "Waypoint navigator loaded {} of {} waypoint slots",
            buffer.len(),
            buffer.capacity()
        );
        Ok(Self::new(config, buffer))
    }

    /// Compute the desired motion for `state`, advancing the progression indices
    pub fn navigate(&mut self, state: &VehicleState) -> VelocityCommand {
        self.nearest_waypoint_index = self.nearest_waypoint(state);
        let desired_v = self
            .buffer
            .get(self.nearest_waypoint_index)
            .map_or(0.0, |waypoint| waypoint.speed);

        self.target_waypoint_index = self.next_waypoint(self.target_waypoint_index, state);
        let Some(target) = self.buffer.get(self.target_waypoint_index).copied() else {
            if self.desired != VelocityCommand::idle() {
                info!(
                    "Route complete at waypoint {}, idling",
                    self.target_waypoint_index
                );
            }
            self.desired = VelocityCommand::idle();
            return self.desired;
        };

        let bearing = bearing_to_waypoint(&target, state);
        let heading_error = bearing - unwrap_heading(bearing, state.odometry.heading);
        let correction = self.heading_pid.next_control_output(-heading_error).output;
        let desired_w = (correction * desired_v).clamp(-self.max_turn_velocity, self.max_turn_velocity);

        self.bearing_to_target = bearing;
        self.desired = VelocityCommand::new(desired_v, desired_w);
        debug!(
            nearest = self.nearest_waypoint_index,
            target = self.target_waypoint_index,
            bearing,
            v = desired_v,
            w = desired_w,
            "navigate"
        );
        self.desired
    }

    /// Navigate from the last state delivered by the estimator
    pub fn navigate_latest(&mut self) -> VelocityCommand {
        match self.latest_state {
            Some(state) => self.navigate(&state),
            None => VelocityCommand::idle(),
        }
    }

    /// Index of the closest populated waypoint between the current nearest and
    /// target indices. Passed waypoints are never reconsidered.
    pub fn nearest_waypoint(&self, state: &VehicleState) -> usize {
        let last = self.buffer.capacity().saturating_sub(1);
        let start = self.nearest_waypoint_index;
        let end = self.target_waypoint_index.min(last);

        let mut nearest = start;
        let mut nearest_distance = f64::MAX;
        for index in start..=end {
            if let Some(waypoint) = self.buffer.get(index) {
                let distance = distance_to_waypoint(waypoint, state);
                if distance < nearest_distance {
                    nearest_distance = distance;
                    nearest = index;
                }
            }
        }
        nearest
    }

    /// First waypoint at or after `current_index` lying outside the look-ahead
    /// radius. Scanning stops on the first empty slot, which then becomes the
    /// (terminal) target.
    pub fn next_waypoint(&self, current_index: usize, state: &VehicleState) -> usize {
        let mut index = current_index;
        while let Some(waypoint) = self.buffer.get(index) {
            if distance_to_waypoint(waypoint, state) >= self.look_ahead {
                break;
            }
            index += 1;
        }
        index
    }

    /// Append a waypoint to the first empty slot. A full buffer is left unchanged.
    pub fn add_waypoint(&mut self, waypoint: Waypoint) -> Result<usize> {
        self.buffer.push(waypoint).map_err(|e| {
            warn!("Unable to add waypoint: {}", e);
            e
        })
    }

    pub fn clear_waypoint_buffer(&mut self) {
        self.buffer.clear();
        if self.reset_progress_on_clear {
            self.nearest_waypoint_index = 0;
            self.target_waypoint_index = 0;
            self.heading_pid.reset_integral_term();
        }
        debug!(
            "Waypoint buffer cleared, progress at {}/{}",
            self.nearest_waypoint_index, self.target_waypoint_index
        );
    }

    pub fn buffer(&self) -> &WaypointBuffer {
        &self.buffer
    }

    pub fn nearest_waypoint_index(&self) -> usize {
        self.nearest_waypoint_index
    }

    pub fn target_waypoint_index(&self) -> usize {
        self.target_waypoint_index
    }

    pub fn bearing_to_target(&self) -> f64 {
        self.bearing_to_target
    }

    pub fn desired(&self) -> VelocityCommand {
        self.desired
    }

    /// True once the target has run off the end of the route
    pub fn is_finished(&self) -> bool {
        self.buffer.get(self.target_waypoint_index).is_none()
    }
}

impl StateObserver for WaypointNavigator {
    fn on_state_update(&mut self, state: &VehicleState) {
        self.latest_state = Some(*state);
    }
}

/// Compass bearing from the rover to `target`, clockwise from +Y
pub fn bearing_to_waypoint(target: &Waypoint, state: &VehicleState) -> f64 {
    let dx = target.x - state.odometry.x;
    let dy = target.y - state.odometry.y;
    if dy != 0.0 {
        dx.atan2(dy)
    } else if dx > 0.0 {
        FRAC_PI_2
    } else {
        -FRAC_PI_2
    }
}

/// Heading error to `target` relative to the current heading
pub fn heading_to_waypoint(target: &Waypoint, state: &VehicleState) -> f64 {
    wrap_pi(bearing_to_waypoint(target, state) - state.odometry.heading)
}

pub fn distance_to_waypoint(target: &Waypoint, state: &VehicleState) -> f64 {
    nalgebra::distance(&target.position(), &state.odometry.position())
}

/// Re-express `current_heading` as the equivalent angle closest to `target_heading`
pub fn unwrap_heading(target_heading: f64, current_heading: f64) -> f64 {
    target_heading - wrap_pi(target_heading - current_heading)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_4, PI};

    fn config() -> NavigationConfig {
        NavigationConfig {
            look_ahead: 0.3,
            max_turn_velocity: 2.0,
            heading_pid: HeadingPidConfig {
                kp: 4.0,
                ki: 0.0,
                kd: 0.0,
                limit: 10.0,
            },
            buffer_capacity: 8,
            ..NavigationConfig::default()
        }
    }

    fn navigator(rows: &[[f64; 4]]) -> WaypointNavigator {
        let config = config();
        WaypointNavigator::new(&config, WaypointBuffer::from_route(config.buffer_capacity, rows))
    }

    fn straight_route() -> Vec<[f64; 4]> {
        (0..6_i32).map(|i| [0.0, f64::from(i), 0.0, 0.5]).collect()
    }

    /// Drive north from the origin in 0.1 m steps up to `y`
    fn drive_north(nav: &mut WaypointNavigator, y: f64) {
        let mut step = 0_i32;
        while f64::from(step) * 0.1 <= y + 1e-9 {
            nav.navigate(&VehicleState::at(0.0, f64::from(step) * 0.1, 0.0));
            step += 1;
        }
    }

    #[test]
    fn facing_single_waypoint_drives_straight() {
        let mut nav = navigator(&[[0.0, 1.0, 0.0, 0.5]]);
        let cmd = nav.navigate(&VehicleState::at(0.0, 0.0, 0.0));
        assert_relative_eq!(cmd.linear, 0.5);
        assert_relative_eq!(nav.bearing_to_target(), 0.0);
        assert_relative_eq!(cmd.angular, 0.0);
        assert_eq!(nav.target_waypoint_index(), 0);
    }

    #[test]
    fn bearing_flip_behind_the_rover_gives_no_derivative_kick() {
        let config = NavigationConfig {
            heading_pid: HeadingPidConfig {
                kp: 0.0,
                ki: 0.0,
                kd: 1.0,
                limit: 10.0,
            },
            ..config()
        };
        let route = [[0.0, -10.0, PI, 0.5]];
        let mut nav =
            WaypointNavigator::new(&config, WaypointBuffer::from_route(config.buffer_capacity, &route));

        // facing south, the target sits just either side of the +-pi seam
        nav.navigate(&VehicleState::at(0.001, 0.0, PI));
        assert!(nav.bearing_to_target() < -3.0);
        let cmd = nav.navigate(&VehicleState::at(-0.001, 0.0, PI));
        assert!(nav.bearing_to_target() > 3.0);
        assert!(cmd.angular.abs() < 1e-3, "derivative kick {}", cmd.angular);
    }

    #[test]
    fn exhausted_buffer_idles() {
        let mut nav = navigator(&[[0.0, 0.0, 0.0, 0.05]]);
        let cmd = nav.navigate(&VehicleState::at(0.0, 0.0, 0.0));
        assert_eq!(cmd, VelocityCommand::idle());
        assert_eq!(nav.target_waypoint_index(), 1);
        assert!(nav.is_finished());

        let again = nav.navigate(&VehicleState::at(0.5, -0.2, 2.0));
        assert_eq!(again, VelocityCommand::idle());
    }

    #[test]
    fn empty_buffer_idles() {
        let mut nav = navigator(&[]);
        assert_eq!(nav.navigate(&VehicleState::default()), VelocityCommand::idle());
    }

    #[test]
    fn turns_clockwise_towards_target_on_the_right() {
        let mut nav = navigator(&[[1.0, 1.0, 0.0, 0.5]]);
        let cmd = nav.navigate(&VehicleState::at(0.0, 0.0, 0.0));
        assert_relative_eq!(nav.bearing_to_target(), FRAC_PI_4);
        assert_relative_eq!(cmd.angular, 4.0 * FRAC_PI_4 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn turn_rate_is_clamped() {
        let mut nav = navigator(&[[-1.0, 0.0, 0.0, 0.9]]);
        let cmd = nav.navigate(&VehicleState::at(0.0, 0.0, 0.0));
        assert_relative_eq!(nav.bearing_to_target(), -FRAC_PI_2);
        assert_relative_eq!(cmd.angular, -2.0);
    }

    #[test]
    fn heading_error_does_not_jump_across_the_wrap() {
        // target just west of south, rover facing just east of south
        let mut nav = navigator(&[[-0.01, -1.0, 0.0, 0.5]]);
        let cmd = nav.navigate(&VehicleState::at(0.0, 0.0, PI - 0.01));
        assert!(cmd.angular > 0.0);
        assert!(cmd.angular < 0.1);
    }

    #[test]
    fn bearing_degenerate_cases() {
        let state = VehicleState::at(1.0, 1.0, 0.0);
        let east = Waypoint::new(2.0, 1.0, 0.0, 0.1);
        let west = Waypoint::new(0.0, 1.0, 0.0, 0.1);
        let south = Waypoint::new(1.0, 0.0, 0.0, 0.1);
        assert_eq!(bearing_to_waypoint(&east, &state), FRAC_PI_2);
        assert_eq!(bearing_to_waypoint(&west, &state), -FRAC_PI_2);
        assert_relative_eq!(bearing_to_waypoint(&south, &state).abs(), PI);
        assert_relative_eq!(heading_to_waypoint(&east, &VehicleState::at(1.0, 1.0, PI)), -FRAC_PI_2);
    }

    #[test]
    fn unwrap_heading_picks_nearest_representation() {
        let unwrapped = unwrap_heading(179f64.to_radians(), (-179f64).to_radians());
        assert_relative_eq!(unwrapped, 181f64.to_radians(), epsilon = 1e-12);

        for &(target, current) in &[(0.1, -0.2), (3.0, -3.0), (-3.0, 3.0), (PI, -PI + 0.5), (-2.0, 2.5)] {
            let r: f64 = unwrap_heading(target, current);
            assert_relative_eq!(wrap_pi(r - current), 0.0, epsilon = 1e-12);
            assert_relative_eq!(wrap_pi(target - r), wrap_pi(target - current), epsilon = 1e-12);
            assert!((r - target).abs() <= PI + 1e-12);
        }
    }

    #[test]
    fn single_waypoint_at_rover_is_nearest_with_zero_distance() {
        let nav = navigator(&[[0.2, 0.3, 0.0, 0.1]]);
        let state = VehicleState::at(0.2, 0.3, 0.0);
        let index = nav.nearest_waypoint(&state);
        assert_eq!(index, 0);
        assert_eq!(distance_to_waypoint(&nav.buffer().slot(index), &state), 0.0);
    }

    #[test]
    fn nearest_search_stays_within_progress_window() {
        let mut nav = navigator(&straight_route());
        nav.nearest_waypoint_index = 2;
        nav.target_waypoint_index = 4;
        // waypoint 0 is closest overall but already passed
        let index = nav.nearest_waypoint(&VehicleState::at(0.0, 0.0, 0.0));
        assert_eq!(index, 2);
        let index = nav.nearest_waypoint(&VehicleState::at(0.0, 9.0, 0.0));
        assert_eq!(index, 4);
    }

    #[test]
    fn target_index_never_decreases() {
        let mut nav = navigator(&straight_route());
        let mut last_target = 0;
        let mut last_nearest = 0;
        for step in 0..=60_i32 {
            let y = f64::from(step) * 0.1;
            nav.navigate(&VehicleState::at(0.0, y, 0.0));
            assert!(nav.target_waypoint_index() >= last_target);
            assert!(nav.nearest_waypoint_index() >= last_nearest);
            assert!(nav.nearest_waypoint_index() <= nav.target_waypoint_index());
            last_target = nav.target_waypoint_index();
            last_nearest = nav.nearest_waypoint_index();
        }
        assert!(nav.is_finished());
        assert_eq!(nav.desired(), VelocityCommand::idle());
    }

    #[test]
    fn walking_back_does_not_rewind_progress() {
        let mut nav = navigator(&straight_route());
        drive_north(&mut nav, 2.9);
        let target = nav.target_waypoint_index();
        assert_eq!(target, 4);
        nav.navigate(&VehicleState::at(0.0, 0.0, 0.0));
        assert_eq!(nav.target_waypoint_index(), target);
    }

    #[test]
    fn clear_resets_progress_by_default() {
        let mut nav = navigator(&straight_route());
        drive_north(&mut nav, 2.9);
        assert!(nav.target_waypoint_index() > 0);

        nav.clear_waypoint_buffer();
        assert!(nav.buffer().is_empty());
        assert_eq!(nav.nearest_waypoint_index(), 0);
        assert_eq!(nav.target_waypoint_index(), 0);

        nav.add_waypoint(Waypoint::new(0.0, 4.0, 0.0, 0.4)).unwrap();
        let cmd = nav.navigate(&VehicleState::at(0.0, 2.9, 0.0));
        assert_relative_eq!(cmd.linear, 0.4);
    }

    #[test]
    fn clear_without_reset_keeps_progress() {
        let config = NavigationConfig {
            reset_progress_on_clear: false,
            ..config()
        };
        let mut nav =
            WaypointNavigator::new(&config, WaypointBuffer::from_route(8, &straight_route()));
        drive_north(&mut nav, 2.9);
        let (nearest, target) = (nav.nearest_waypoint_index(), nav.target_waypoint_index());
        assert!(target > 0);

        nav.clear_waypoint_buffer();
        assert_eq!(nav.nearest_waypoint_index(), nearest);
        assert_eq!(nav.target_waypoint_index(), target);

        // the new waypoint lands in slot 0, behind the retained progress
        nav.add_waypoint(Waypoint::new(0.0, 4.0, 0.0, 0.4)).unwrap();
        assert_eq!(nav.navigate(&VehicleState::at(0.0, 2.9, 0.0)), VelocityCommand::idle());
    }

    #[test]
    fn add_to_full_buffer_is_rejected() {
        let rows: Vec<[f64; 4]> = (0..8_i32).map(|i| [0.0, f64::from(i), 0.0, 0.5]).collect();
        let mut nav = navigator(&rows);
        let result = nav.add_waypoint(Waypoint::new(5.0, 5.0, 0.0, 0.5));
        assert!(result.is_err());
        assert_eq!(nav.buffer().len(), 8);
        assert_eq!(nav.buffer().slot(7).y, 7.0);
    }

    #[test]
    fn observes_estimator_updates() {
        let mut nav = navigator(&[[0.0, 1.0, 0.0, 0.5]]);
        assert_eq!(nav.navigate_latest(), VelocityCommand::idle());
        nav.on_state_update(&VehicleState::at(0.0, 0.0, 0.0));
        assert_relative_eq!(nav.navigate_latest().linear, 0.5);
    }

    #[test]
    fn loads_named_route() {
        let route = RouteConfig {
            name: Some("minesweeper".to_string()),
            waypoints: Vec::new(),
        };
        let nav = WaypointNavigator::from_config(&config(), &route).unwrap();
        assert_eq!(nav.buffer().len(), 8);
    }
}
