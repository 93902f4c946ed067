use std::process::ExitCode;

use anyhow::Result;
use nuget_distributor::cli::{lossy_args, run, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment
    dotenvy::dotenv().ok();

    // Structured logs go to stderr; stdout carries the console narration.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::info!("CLI application startup: tracing initialised, environment loaded");

    let cli = match Cli::from_tokens(lossy_args(std::env::args_os())) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };
    let result = run(cli).await;
    match &result {
        Ok(code) => tracing::info!(?code, "CLI finished"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
