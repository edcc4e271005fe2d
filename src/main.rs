pub mod types;
pub mod config;
pub mod dms;
pub mod data;
pub mod processing;
pub mod render;
pub mod dashboard;
pub mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "config.toml";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration; built-in defaults are used when the default file is absent
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq)]
enum Commands {
    /// Load the sheet and write the two map documents
    Generate,
    /// Write the map documents and serve the dashboard
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let app_config = config::AppConfig::load_or_default(&config_path, cli.config.is_some())?;
    if config_path.exists() {
        info!("Using configuration from {:?}", config_path);
    } else {
        info!("No {:?} found, using built-in defaults", config_path);
    }

    // Everything below the HTTP layer runs once, before the listener binds.
    let data = processing::run_pipeline(&app_config)?;
    render::write_maps(&data, &app_config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Generate => {
            info!("Generation complete!");
        }
        Commands::Serve => {
            server::start_server(app_config, data).await?;
        }
    }

    Ok(())
}
