pub mod types;
pub mod config;
pub mod error;
pub mod pollutant;
pub mod legend;
pub mod aoi;
pub mod imagery;
pub mod composite;
pub mod sampler;
pub mod context;
pub mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the pollution map dashboard
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print the color legend for a pollutant
    Legend {
        #[arg(short, long, default_value = "no2")]
        pollutant: String,
    },
    /// Sample one location of a monthly composite
    Inspect {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
        #[arg(short, long)]
        pollutant: String,
        #[arg(short, long)]
        year: i32,
        #[arg(short, long)]
        month: u32,
        #[arg(long, allow_hyphen_values = true)]
        lat: String,
        #[arg(long, allow_hyphen_values = true)]
        lon: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { config } => {
            tracing::info!("Serving dashboard with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;
            let context = context::AppContext::from_config(&app_config)?;

            server::start_server(app_config, context).await?;
        }
        Commands::Legend { pollutant } => {
            let view = context::legend_view(pollutant)?;
            println!("Legend ({}, {})", view.label, view.unit);
            for entry in &view.entries {
                println!("{:<8} {}", entry.color, entry.label);
            }
        }
        Commands::Inspect { config, pollutant, year, month, lat, lon } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let context = context::AppContext::from_config(&app_config)?;

            match context.inspect(pollutant, *year, *month, lat, lon).await {
                context::InspectState::Value { text, .. }
                | context::InspectState::NoData { text }
                | context::InspectState::Unavailable { text } => println!("{}", text),
                context::InspectState::Invalid { text } | context::InspectState::Error { text } => {
                    anyhow::bail!(text)
                }
            }
        }
    }

    Ok(())
}
