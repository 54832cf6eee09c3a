// src/main.rs

//! # Pivot Arm Simulator
//!
//! Headless runner for the pivot arm stabilization loop.
//!
//! ```bash
//! # defaults: calibrate, then tick back to back until the arm settles
//! pivot-arm-sim
//!
//! # start off the setpoint, paced in real time at double speed
//! pivot-arm-sim --angle 60 --realtime --time-scale 0.5
//!
//! # load a TOML configuration and cap the run length
//! pivot-arm-sim --config arm.toml --max-ticks 500
//! ```
//!
//! Ctrl+C stops the run at the next tick. The recorded series is printed as a
//! table when the run stops. Set `RUST_LOG=pivot_arm_stabilization=debug` for
//! per-tick telemetry.

use anyhow::{Context, Result};
use clap::Parser;
use pivot_arm_stabilization::simulation::TimeSeries;
use pivot_arm_stabilization::{
    Immediate, RealTime, RunObserver, RunSummary, SimulationConfig, Simulator, StopReason,
};
use std::path::PathBuf;
use tracing::info;

/// Pivot arm PID stabilization simulator
#[derive(Parser, Debug)]
#[command(name = "pivot-arm-sim")]
#[command(about = "Simulates a PID-stabilized arm rotating about a pivot", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial angle in degrees
    #[arg(short, long)]
    angle: Option<f64>,

    /// Mass in kilograms
    #[arg(long)]
    mass: Option<f64>,

    /// Cross-section height in meters
    #[arg(long)]
    height: Option<f64>,

    /// Length in meters
    #[arg(long)]
    length: Option<f64>,

    /// Skip calibration and use the configured gains
    #[arg(long)]
    no_calibrate: bool,

    /// Pace ticks against the wall clock
    #[arg(long)]
    realtime: bool,

    /// Wall clock seconds per simulated second when pacing
    #[arg(long, default_value_t = 1.0)]
    time_scale: f64,

    /// Stop after this many ticks
    #[arg(long)]
    max_ticks: Option<u64>,
}

impl Cli {
    fn load_config(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => SimulationConfig::default(),
        };

        if let Some(angle) = self.angle {
            config.initial.angle = angle;
        }
        if let Some(mass) = self.mass {
            config.body.mass = mass;
        }
        if let Some(height) = self.height {
            config.body.height = height;
        }
        if let Some(length) = self.length {
            config.body.length = length;
        }
        if self.no_calibrate {
            config.calibration.enabled = false;
        }

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Prints the recorded signals when the run stops.
struct TablePrinter;

impl RunObserver for TablePrinter {
    fn on_stop(&mut self, series: &TimeSeries, reason: StopReason) {
        let plot = series.plot_series();
        println!("stopped: {:?} after {} samples", reason, series.len());
        println!(
            "{:>8} {:>12} {:>12} {:>12} {:>12}",
            "time", "angle", "P", "I", "D"
        );
        for i in 0..plot.time.len() {
            println!(
                "{:>8.2} {:>12.4} {:>12.4} {:>12.4} {:>12.4}",
                plot.time[i], plot.angle[i], plot.proportional[i], plot.integral[i], plot.derivative[i]
            );
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pivot_arm_stabilization=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;
    let mut simulator = Simulator::new(config).context("failed to create simulator")?;

    let stop = simulator.stop_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nReceived interrupt signal. Stopping...");
        stop.request_stop();
    })
    .context("failed to set signal handler")?;

    let gains = simulator.start().context("failed to start simulation")?;
    println!("gains: kp = {}, ki = {}, kd = {}", gains.kp, gains.ki, gains.kd);

    let mut printer = TablePrinter;
    let summary: RunSummary = if cli.realtime {
        let mut scheduler = RealTime::new(cli.time_scale);
        simulator.run(&mut scheduler, &mut printer, cli.max_ticks)?
    } else {
        simulator.run(&mut Immediate, &mut printer, cli.max_ticks)?
    };

    info!(
        reason = ?summary.reason,
        ticks = summary.ticks,
        time = summary.state.time,
        angle = summary.state.angle,
        "run finished"
    );
    Ok(())
}
