mod api;
mod cli;
mod config;
mod db;
mod models;
mod services;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "edgefinder")]
#[command(about = "Football match prediction and value-bet analysis")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Fetch teams and fixtures for the configured competitions
    Fetch,
    /// Refresh bookmaker odds for upcoming matches
    Odds,
    /// Generate predictions for upcoming matches
    Predict,
    /// Scan for value bets against stored market odds
    ValueBets,
    /// Replay finished matches through the rating model and refresh stats
    Rebuild,
    /// Query team details, form and upcoming fixtures
    Team {
        #[arg(short, long)]
        name: String,
    },
    /// Initialize the database
    InitDb,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();
    let config = AppConfig::from_env();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            tracing::info!("Starting edgefinder API server on port {}", port);
            api::serve(port, config).await?;
        }
        Some(Commands::Fetch) => {
            cli::fetch_data(&config).await?;
        }
        Some(Commands::Odds) => {
            cli::refresh_odds(&config).await?;
        }
        Some(Commands::Predict) => {
            cli::generate_predictions(&config).await?;
        }
        Some(Commands::ValueBets) => {
            cli::show_value_bets(&config).await?;
        }
        Some(Commands::Rebuild) => {
            cli::rebuild(&config).await?;
        }
        Some(Commands::Team { name }) => {
            cli::query_team(&config, &name).await?;
        }
        Some(Commands::InitDb) => {
            tracing::info!("Initializing database...");
            let pool = db::create_pool(&config).await?;
            db::init_database(&pool).await?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting edgefinder API server on port 3000");
            api::serve(3000, config).await?;
        }
    }

    Ok(())
}
