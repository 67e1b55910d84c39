use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use diffdrive_runtime::config::DEFAULT_CALIBRATION_FILE;
use diffdrive_runtime::runtime::{self, RunOptions};
use diffdrive_runtime::telemetry::DEFAULT_PUBLISH_INTERVAL_MS;

/// Differential-drive runtime: ramped motor control over zenoh
#[derive(Parser)]
#[command(name = "diffdrive-runtime")]
struct Args {
    /// Serial port of the PWM bridge; omit to run with simulated motors
    #[arg(long)]
    port: Option<String>,

    /// Path of the calibration file
    #[arg(long, default_value = DEFAULT_CALIBRATION_FILE)]
    calibration_file: PathBuf,

    /// Minimum milliseconds between telemetry records
    #[arg(long, default_value_t = DEFAULT_PUBLISH_INTERVAL_MS)]
    status_interval_ms: u32,

    /// Disable smooth acceleration (all commands apply immediately)
    #[arg(long)]
    no_smooth: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();
    let opts = RunOptions {
        port: args.port,
        calibration_file: args.calibration_file,
        status_interval_ms: args.status_interval_ms,
        smooth: !args.no_smooth,
    };

    if let Err(e) = runtime::run(opts).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
