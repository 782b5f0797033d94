//! Closed-loop runs of the full pipeline against the simulated plant

use approx::assert_relative_eq;
use rover_core::common::{MotorPosition, Side, VelocityCommand};
use rover_core::config::{DrivetrainKind, HeadingSource, NavigationPolicy, RoverConfig};
use rover_core::navigation::receiver::{CommandSource, ManualCommand};
use rover_core::navigation::Navigator;
use rover_core::perception::TelemetryObserver;
use rover_core::sim::{build_navigator, SharedPlant, SimPlant};
use rover_core::RoverError;
use std::cell::RefCell;
use std::rc::Rc;

fn config(kind: DrivetrainKind, heading_source: HeadingSource, route: &[[f64; 4]]) -> RoverConfig {
    let mut config = RoverConfig::default();
    config.drivetrain.kind = kind;
    config.estimator.heading_source = heading_source;
    config.route.waypoints = route.to_vec();
    config
}

/// Run cycles until the route completes. Returns the number of cycles used.
fn run_to_completion(navigator: &mut Navigator, plant: &SharedPlant, max_cycles: usize) -> Option<usize> {
    let dt = 0.05;
    for cycle in 1..=max_cycles {
        navigator.navigate();
        plant.borrow_mut().step(dt);
        if navigator.is_finished() {
            return Some(cycle);
        }
    }
    None
}

const STRAIGHT: &[[f64; 4]] = &[
    [0.0, 0.5, 0.0, 0.5],
    [0.0, 1.0, 0.0, 0.5],
    [0.0, 1.5, 0.0, 0.3],
];

#[test]
fn tank_drives_straight_route_and_idles() {
    let config = config(DrivetrainKind::Tank, HeadingSource::KinematicOnly, STRAIGHT);
    let plant = SimPlant::new(&config.drivetrain).shared();
    let mut navigator = build_navigator(&config, &plant).unwrap();

    let cycles = run_to_completion(&mut navigator, &plant, 400).expect("route not finished");
    assert!(cycles > 40);

    // settle, then check the rover is parked near the last waypoint
    for _ in 0..5 {
        let report = navigator.navigate();
        assert_eq!(report.command, VelocityCommand::idle());
        plant.borrow_mut().step(0.05);
    }
    let truth = plant.borrow().pose();
    assert!(truth.y > 1.1 && truth.y < 1.5, "stopped at y={}", truth.y);
    assert_relative_eq!(truth.x, 0.0, epsilon = 1e-9);
    assert_eq!(plant.borrow().duty()[MotorPosition::FrontLeft], 0.0);

    let estimate = navigator.estimator().current_state().odometry;
    assert!((estimate.y - truth.y).abs() < 0.01);
    assert_relative_eq!(estimate.heading, 0.0);
}

#[test]
fn ackermann_with_offset_imu_drives_straight() {
    let config = config(DrivetrainKind::Ackermann, HeadingSource::InertialFused, STRAIGHT);
    let plant = SimPlant::new(&config.drivetrain).with_imu_offset(0.7).shared();
    let mut navigator = build_navigator(&config, &plant).unwrap();

    let first = navigator.navigate();
    assert_relative_eq!(first.state.odometry.heading, 0.0, epsilon = 1e-12);
    assert_eq!(first.drive_train_state.angles.left, 0.0);
    assert_eq!(first.drive_train_state.angles.right, 0.0);
    plant.borrow_mut().step(0.05);
    assert!(plant.borrow().servo_enabled(Side::Left));

    run_to_completion(&mut navigator, &plant, 400).expect("route not finished");
    let truth = plant.borrow().pose();
    assert!(truth.y > 1.1 && truth.y < 1.5, "stopped at y={}", truth.y);
    assert!(truth.x.abs() < 1e-6);

    // stopped wheels release the steering servos
    navigator.navigate();
    assert!(!plant.borrow().servo_enabled(Side::Left));
    assert!(!plant.borrow().servo_enabled(Side::Right));
}

#[test]
fn tank_follows_a_dog_leg() {
    let route = [
        [0.0, 0.6, 0.0, 0.4],
        [0.6, 1.2, 0.0, 0.4],
        [1.2, 1.8, 0.0, 0.3],
    ];
    let config = config(DrivetrainKind::Tank, HeadingSource::InertialFused, &route);
    let plant = SimPlant::new(&config.drivetrain).with_imu_offset(-2.0).shared();
    let mut navigator = build_navigator(&config, &plant).unwrap();

    run_to_completion(&mut navigator, &plant, 600).expect("route not finished");
    let truth = plant.borrow().pose();
    let miss = ((truth.x - 1.2).powi(2) + (truth.y - 1.8).powi(2)).sqrt();
    assert!(miss < 0.45, "finished {miss:.3} m from the last waypoint");
    assert!(truth.heading > 0.2, "should have turned clockwise, heading {}", truth.heading);
}

#[test]
fn imu_dropout_falls_back_to_kinematic_heading() {
    let config = config(DrivetrainKind::Tank, HeadingSource::InertialFused, STRAIGHT);
    let plant = SimPlant::new(&config.drivetrain).shared();
    let mut navigator = build_navigator(&config, &plant).unwrap();

    plant.borrow_mut().set_imu_failing(true);
    run_to_completion(&mut navigator, &plant, 400).expect("route not finished");
    assert!(plant.borrow().pose().y > 1.1);
}

#[test]
fn missing_imu_fails_startup() {
    let config = config(DrivetrainKind::Ackermann, HeadingSource::InertialFused, STRAIGHT);
    let plant = SimPlant::new(&config.drivetrain).without_imu().shared();
    assert!(matches!(
        build_navigator(&config, &plant),
        Err(RoverError::HeadingSensorUnavailable(_))
    ));

    let kinematic = config_with(HeadingSource::KinematicOnly);
    assert!(build_navigator(&kinematic, &plant).is_ok());
}

fn config_with(heading_source: HeadingSource) -> RoverConfig {
    config(DrivetrainKind::Ackermann, heading_source, STRAIGHT)
}

#[test]
fn manual_stick_overrides_route() {
    let config = config(DrivetrainKind::Tank, HeadingSource::KinematicOnly, STRAIGHT);
    let plant = SimPlant::new(&config.drivetrain).shared();
    let mut navigator = build_navigator(&config, &plant).unwrap();

    plant.borrow_mut().set_manual(Some(ManualCommand {
        linear: 0.64,
        angular: 0.0,
        autonomous: false,
    }));
    let report = navigator.navigate();
    assert_eq!(report.source, CommandSource::Manual);
    assert_relative_eq!(plant.borrow().duty()[MotorPosition::RearLeft], 0.5);

    plant.borrow_mut().set_manual(Some(ManualCommand::default()));
    let report = navigator.navigate();
    assert_eq!(report.source, CommandSource::Autonomous);
    assert_relative_eq!(report.command.linear, 0.5);
}

#[test]
fn mode_switch_stops_without_signal() {
    let mut config = config(DrivetrainKind::Tank, HeadingSource::KinematicOnly, STRAIGHT);
    config.navigation.policy = NavigationPolicy::ModeSwitch;
    let plant = SimPlant::new(&config.drivetrain).shared();
    let mut navigator = build_navigator(&config, &plant).unwrap();

    let report = navigator.navigate();
    assert_eq!(report.source, CommandSource::Stopped);
    assert_eq!(report.command, VelocityCommand::idle());

    plant.borrow_mut().set_manual(Some(ManualCommand {
        linear: 0.0,
        angular: 0.0,
        autonomous: true,
    }));
    let report = navigator.navigate();
    assert_eq!(report.source, CommandSource::Autonomous);
    assert_relative_eq!(report.command.linear, 0.5);
}

#[test]
fn waypoints_added_mid_run_extend_the_route() {
    let config = config(DrivetrainKind::Tank, HeadingSource::KinematicOnly, &STRAIGHT[..1]);
    let plant = SimPlant::new(&config.drivetrain).shared();
    let mut navigator = build_navigator(&config, &plant).unwrap();

    run_to_completion(&mut navigator, &plant, 200).expect("route not finished");
    let finished_at = plant.borrow().pose().y;

    let waypoints = navigator.waypoint_navigator();
    waypoints
        .borrow_mut()
        .add_waypoint(rover_core::common::Waypoint::new(0.0, 1.2, 0.0, 0.4))
        .unwrap();
    assert!(!navigator.is_finished());

    run_to_completion(&mut navigator, &plant, 200).expect("extended route not finished");
    assert!(plant.borrow().pose().y > finished_at + 0.3);
}

#[test]
fn telemetry_observer_rides_along_with_navigation() {
    let config = config(DrivetrainKind::Tank, HeadingSource::KinematicOnly, STRAIGHT);
    let plant = SimPlant::new(&config.drivetrain).shared();
    let mut navigator = build_navigator(&config, &plant).unwrap();
    let telemetry = Rc::new(RefCell::new(TelemetryObserver::new()));
    navigator.estimator_mut().add_observer(telemetry.clone()).unwrap();

    let cycles = run_to_completion(&mut navigator, &plant, 400).expect("route not finished");
    assert_eq!(telemetry.borrow().updates(), cycles as u64);
    assert!(plant.borrow().pose().y > 1.1);
}
