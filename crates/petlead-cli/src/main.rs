mod list;
mod logging;
mod run;
mod summary;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "petlead")]
#[command(about = "Collect pet-food retailer listings from vendor store locators")]
#[command(version)]
struct Cli {
    /// YAML configuration file.
    #[arg(
        long,
        short = 'c',
        env = "PETLEAD_CONFIG",
        default_value = "config.yaml",
        global = true
    )]
    config: PathBuf,

    /// Log at debug level regardless of configuration.
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List available scraping strategies and the configured sites.
    List,
    /// Scrape every enabled site, or a single named one.
    Run {
        /// Only scrape this site identifier.
        #[arg(long, short = 'w', visible_alias = "website")]
        site: Option<String>,
        /// Skip the pause between queries and retry backoff.
        #[arg(long)]
        no_delay: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = petlead_core::load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::List => {
            let registry = petlead_scraper::StrategyRegistry::with_builtin();
            for line in list::render(&config, &registry) {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { site, no_delay } => {
            run::run_scrape(&config, site.as_deref(), no_delay).await
        }
    }
}

#[cfg(test)]
mod tests;
