//! keel CLI
//!
//! Moves workloads between Helm and Argo CD in two phases.

use clap::Parser;
use tracing::error;

use keel_cli::Cli;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    if let Err(e) = keel_common::telemetry::init_tracing(cli.log_format) {
        eprintln!("{}", e);
        return std::process::ExitCode::FAILURE;
    }

    match cli.run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "keel failed");
            std::process::ExitCode::FAILURE
        }
    }
}
