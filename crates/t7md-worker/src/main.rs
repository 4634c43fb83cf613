//! T7MD headless binary.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use t7md_worker::{init_tracing, run_headless, HeadlessArgs, ProtocolWriter, WorkerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let args = HeadlessArgs::parse();
    let config = WorkerConfig::from_env();

    info!(
        "Starting t7md-headless v{} for {}",
        env!("CARGO_PKG_VERSION"),
        args.input.display()
    );

    let mut protocol = ProtocolWriter::new(std::io::stdout());
    match run_headless(&args, &config, &mut protocol).await {
        Ok(summary) => {
            info!(
                frames = summary.frames_processed,
                dropped = summary.frames_dropped,
                output_dir = %summary.output_dir.display(),
                "Run complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Run did not complete: {}", e);
            ExitCode::FAILURE
        }
    }
}
