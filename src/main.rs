use anyhow::Result;
use clap::Parser;

use peerdoc::cli::{self, Cli};
use peerdoc::config::PeerdocConfig;
use peerdoc::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PeerdocConfig::load()?;
    init_telemetry(&config.observability.log_level)?;

    cli::commands::run(cli, config).await
}
