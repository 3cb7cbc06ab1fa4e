use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use frc_drive_runtime::config::{LOOP_HZ, MAX_LOOP_HZ};
use frc_drive_runtime::runtime::{self, RunOptions};

/// Drive subsystem runtime (simulated hardware, zenoh transport)
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON robot map with CAN ids and drive tuning
    #[arg(long)]
    robot_map: Option<PathBuf>,

    /// Control loop frequency
    #[arg(
        long,
        default_value_t = LOOP_HZ,
        value_parser = clap::value_parser!(u64).range(1..=MAX_LOOP_HZ)
    )]
    loop_hz: u64,

    /// Simulated encoder ticks per loop at full output
    #[arg(long, default_value_t = 0.0)]
    sim_ticks_per_update: f64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();
    let options = RunOptions {
        robot_map: args.robot_map,
        loop_hz: args.loop_hz,
        sim_ticks_per_update: args.sim_ticks_per_update,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
