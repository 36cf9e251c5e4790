//! # AERO Supervisor
//!
//! Loads `config/aero.toml` (or `--config`), runs the VRS, rotor and BIOS
//! tasks against the simulated flight until Ctrl-C or `--duration-s`, and
//! prints the final status report as JSON on stdout.

use aero::{RuntimeOptions, run};
use aero_common::config::AeroConfig;
use aero_common::consts::DEFAULT_CONFIG_PATH;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// AERO supervisor: VRS protection, adaptive rotor and self-healing BIOS
#[derive(Parser, Debug)]
#[command(name = "aero")]
#[command(version)]
#[command(about = "Runs the AERO control cluster against a simulated flight")]
struct Args {
    /// Path to the cluster configuration TOML.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Stop after this many seconds (0 runs until Ctrl-C).
    #[arg(long, default_value_t = 30.0)]
    duration_s: f64,

    /// Inject a BIOS fault every N checks (0 disables).
    #[arg(long, default_value_t = 5)]
    fault_every: u64,

    /// CPU core to pin the rotor task to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority of the rotor task (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = match AeroConfig::load_validated(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {}: {e}", args.config.display());
            process::exit(1);
        }
    };
    setup_tracing(&args, &config);

    info!("AERO v{} starting...", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run_supervisor(&args, &config) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("AERO shutdown complete");
}

fn run_supervisor(args: &Args, config: &AeroConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Config OK: service={}, vrs={}µs, rotor={}µs, bios={}µs",
        config.shared.service_name,
        config.vrs.cycle_time_us,
        config.rotor.cycle_time_us,
        config.bios.cycle_time_us,
    );

    let duration = if args.duration_s > 0.0 {
        Some(Duration::try_from_secs_f64(args.duration_s)?)
    } else {
        warn!("No run duration, stop with Ctrl-C");
        None
    };
    let options = RuntimeOptions {
        duration,
        cpu_core: args.cpu_core,
        rt_priority: args.rt_priority,
        fault_every: args.fault_every,
        ..RuntimeOptions::default()
    };

    // Setup signal handler for graceful shutdown.
    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.store(true, Ordering::SeqCst);
    })?;

    let report = run(config, &options, stop)?;
    info!(
        elapsed_s = report.elapsed_s,
        faults = report.faults_injected,
        health = report.bios_status.system_health,
        "run finished"
    );
    println!("{}", report.to_json()?);
    Ok(())
}

/// Setup tracing subscriber from the CLI flags and `[shared].log_level`.
fn setup_tracing(args: &Args, config: &AeroConfig) {
    let level = if args.verbose {
        Level::DEBUG.as_str()
    } else {
        config.shared.log_level.as_directive()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    }
}
