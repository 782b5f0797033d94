//! Rover simulator
//!
//! Runs the full control core against the simulated plant, with a tokio
//! interval task standing in for the hardware control timer.

use anyhow::{Context, Result};
use clap::Parser;
use rover_core::config::RoverConfig;
use rover_core::perception::TelemetryObserver;
use rover_core::sim::{build_navigator, SimPlant};
use rover_core::RoverCore;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Closed-loop rover simulation
#[derive(Parser)]
#[command(name = "rover_sim")]
#[command(about = "Drive the rover core around a route against a simulated chassis")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of control cycles to run
    #[arg(short = 'n', long, default_value = "600")]
    cycles: u32,

    /// Run the timer this many times faster than real time
    #[arg(short, long, default_value = "1.0")]
    speedup: f64,

    /// IMU mounting offset in radians
    #[arg(long, default_value = "0.0")]
    imu_offset: f64,

    /// Simulate a missing IMU
    #[arg(long)]
    no_imu: bool,

    /// Stop after this many fault reports (0 reports forever)
    #[arg(long, default_value = "10")]
    max_fault_reports: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &cli.config {
        Some(path) => RoverConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RoverConfig::default(),
    };
    anyhow::ensure!(cli.speedup > 0.0, "speedup must be positive");

    let mut plant = SimPlant::new(&config.drivetrain).with_imu_offset(cli.imu_offset);
    if cli.no_imu {
        plant = plant.without_imu();
    }
    let plant = plant.shared();

    let period = config.estimator.period();
    let tick = period.div_f64(cli.speedup).max(Duration::from_micros(100));

    let mut navigator = match build_navigator(&config, &plant) {
        Ok(navigator) => navigator,
        Err(e) => return halt(&e, tick, cli.max_fault_reports).await,
    };
    let telemetry = Rc::new(RefCell::new(TelemetryObserver::new()));
    if cli.verbose {
        navigator.estimator_mut().add_observer(telemetry.clone())?;
    }
    let mut core = RoverCore::new(navigator, &config.control);

    let timer = core.timer();
    let ticker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        loop {
            interval.tick().await;
            timer.on_tick();
        }
    });

    info!(
        "Running {} cycles of {:?} ({:?} per tick)",
        cli.cycles, period, tick
    );
    let mut cycles = 0;
    while cycles < cli.cycles {
        match core.run_pending() {
            Some(_) => {
                plant.borrow_mut().step(config.estimator.period_secs());
                cycles += 1;
                if core.navigator().is_finished() {
                    info!("Route finished after {} cycles", cycles);
                    break;
                }
            }
            None => tokio::time::sleep(Duration::from_millis(1)).await,
        }
    }
    ticker.abort();
    if cli.verbose {
        info!("Telemetry saw {} state updates", telemetry.borrow().updates());
    }

    let truth = plant.borrow().pose();
    let estimate = core.navigator().estimator().current_state().odometry;
    info!(
        "True pose x={:.3} y={:.3} heading={:.3}",
        truth.x, truth.y, truth.heading
    );
    info!(
        "Estimated pose x={:.3} y={:.3} heading={:.3}",
        estimate.x, estimate.y, estimate.heading
    );
    Ok(())
}

/// Startup fault: stay stopped and keep reporting
async fn halt(e: &rover_core::RoverError, tick: Duration, max_reports: u32) -> Result<()> {
    let mut interval = tokio::time::interval(tick.max(Duration::from_millis(500)));
    let mut reports = 0;
    loop {
        interval.tick().await;
        error!("Rover halted: {}", e);
        reports += 1;
        if max_reports != 0 && reports >= max_reports {
            anyhow::bail!("startup failed: {}", e);
        }
    }
}
