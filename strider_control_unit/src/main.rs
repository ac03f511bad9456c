//! # STRIDER Control Unit
//!
//! Real-time locomotion control loop for the STRIDER biped.
//!
//! Loads the TOML configuration, performs RT setup (no-ops without
//! the `rt` feature), builds the configured gait controller and
//! enters the deterministic cycle loop until SIGINT, which runs the
//! crash/disable path and writes one final zero-torque frame.
//!
//! Hardware I/O drivers live in collaborator processes; this binary
//! wires the cycle to bench collaborators (held sensors, logged
//! actuator frames, JSON snapshots on stdout) so the control core can
//! run stand-alone.

use std::path::PathBuf;
use std::process;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing::{Level, debug, error, info};
use tracing_subscriber::EnvFilter;

use strider_common::state::RobotState;
use strider_common::telemetry::Snapshot;
use strider_control_unit::config::load_config;
use strider_control_unit::cycle::{
    ActuatorSink, CycleError, CycleRunner, SensorSource, TelemetrySink, rt_setup,
};

/// STRIDER Control Unit — locomotion control loop
#[derive(Parser, Debug)]
#[command(name = "strider_control_unit")]
#[command(author = "STRIDER")]
#[command(version)]
#[command(about = "Deterministic locomotion control loop for the STRIDER biped")]
struct Args {
    /// Path to the configuration TOML. Defaults apply when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// CPU core to pin the RT thread to.
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority.
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

/// Bench sensor source: the blackboard keeps whatever the previous
/// tick left in it. Hardware collaborators replace this seam.
struct HeldSensors;

impl SensorSource for HeldSensors {
    fn read_into(&mut self, _s: &mut RobotState) -> Result<(), CycleError> {
        Ok(())
    }
}

/// Bench actuator sink: logs the torque frame instead of driving
/// amplifiers.
struct LoggedActuators;

impl ActuatorSink for LoggedActuators {
    fn write_from(&mut self, s: &RobotState) -> Result<(), CycleError> {
        debug!(
            hip_roll = s.hip_roll_tau,
            l_hip = s.tau[0].hip_pitch,
            l_knee = s.tau[0].knee,
            l_ankle = s.tau[0].ankle_pitch,
            r_hip = s.tau[1].hip_pitch,
            r_knee = s.tau[1].knee,
            r_ankle = s.tau[1].ankle_pitch,
            "torque frame"
        );
        Ok(())
    }
}

/// Snapshot publisher writing JSON lines to stdout.
struct StdoutTelemetry;

impl TelemetrySink for StdoutTelemetry {
    fn publish(&mut self, snapshot: &Snapshot) {
        match snapshot.encode() {
            Ok(line) => println!("{line}"),
            Err(e) => error!("telemetry encode failed: {e}"),
        }
    }
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!(
        "STRIDER Control Unit v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("STRIDER Control Unit shutdown complete");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let cfg = load_config(args.config.as_deref())?;
    info!(
        cycle_time_us = cfg.cycle_time_us,
        controller = ?cfg.controller,
        "configuration valid"
    );

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        cpu_core = args.cpu_core,
        priority = args.rt_priority,
        "RT setup complete"
    );

    let mut runner = CycleRunner::new(cfg, HeldSensors, LoggedActuators, StdoutTelemetry);

    let shutdown = runner.shutdown_handle();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::Relaxed);
    })?;

    runner.run()?;

    let stats = runner.stats();
    info!(
        ticks = stats.tick_count,
        avg_ns = stats.avg_ns(),
        max_ns = stats.max_ns,
        overruns = stats.overruns,
        "cycle statistics"
    );
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}
