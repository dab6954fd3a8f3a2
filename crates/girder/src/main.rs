//! Girder CLI binary.

use anyhow::Result;
use girder::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the girder CLI.
///
/// Commands run their remote calls one level at a time, so the
/// current-thread runtime is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays pure JSON.
    // Example: RUST_LOG=girder=debug girder ready 12
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("girder=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting girder CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Girder CLI completed successfully");
    Ok(())
}
