//! asnlist - keep a RouterOS address-list in sync with the prefixes of ASNs

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use asnlist::cli::Cli;
use asnlist::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Per-ASN failures are warnings, so they only show up with --verbose
    let log_level = if cli.verbose { Level::DEBUG } else { Level::ERROR };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Config::from_cli(&cli)?;
    asnlist::commands::sync::run(&config).await?;
    Ok(())
}
