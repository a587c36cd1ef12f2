use anyhow::Result;
use clap::Parser;

use watch_folder_aggregator::cli::{Cli, Commands};
use watch_folder_aggregator::config::AppConfig;
use watch_folder_aggregator::{app, logging, output};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.overrides.config.as_deref())?;
    cli.overrides.apply(&mut config);
    logging::init(&config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => app::serve(config).await?,
        Commands::Replay { input, json } => {
            let summary = app::replay(&config, &input).await?;
            output::print_summary(&summary, json);
            if summary.failed > 0 {
                anyhow::bail!("{} notification(s) failed to apply", summary.failed);
            }
        }
    }

    Ok(())
}
