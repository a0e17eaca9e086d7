//! Software Estimation CLI
//!
//! Command-line client for the estimation server: health checks,
//! predictions, analogous cost estimates, and model uploads.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Software Estimation CLI
#[derive(Parser)]
#[command(name = "estctl")]
#[command(author, version, about = "CLI for the Software Estimation Service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via ESTIMATION_API_URL env var)
    #[arg(long, env = "ESTIMATION_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show service health, component by component
    Health,

    /// Check whether the service is ready to serve
    Ready,

    /// Classify a project from name=value features
    Predict {
        /// Features as name=value pairs, e.g. team_size=4
        features: Vec<String>,
    },

    /// Estimate cost by analogy for a project of the given size
    Analogous {
        /// Target project size (e.g. transaction count)
        size: f64,
    },

    /// Upload a new model artifact (admin token required)
    UploadModel {
        /// Path to the artifact file (.json or .model)
        path: PathBuf,

        /// Admin bearer token
        #[arg(long, env = "ESTIMATION_ADMIN_TOKEN")]
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = client::ApiClient::new(&cli.api_url)?;

    let result = match &cli.command {
        Commands::Health => commands::status::health(&client, cli.format).await,
        Commands::Ready => commands::status::ready(&client).await,
        Commands::Predict { features } => {
            commands::estimate::predict(&client, features, cli.format).await
        }
        Commands::Analogous { size } => {
            commands::estimate::analogous(&client, *size, cli.format).await
        }
        Commands::UploadModel { path, token } => {
            commands::model::upload(&client, path, token).await
        }
    };

    if let Err(e) = &result {
        output::print_error(&format!("{:#}", e));
    }
    result
}
