//! # Marketplace API Main Entry Point
//!
//! `marketplace serve` (default) runs migrations and starts the HTTP server.
//! `marketplace migrate` and `marketplace seed` prepare the database and exit.

use anyhow::Context;
use clap::{Parser, Subcommand};

use marketplace::{
    config::ConfigLoader,
    db::{init_pool, run_migrations},
    seeds::seed_categories,
    server::run_server,
    telemetry::init_tracing,
};

#[derive(Debug, Parser)]
#[command(name = "marketplace", version, about = "Local services marketplace API")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run migrations and serve the HTTP API
    Serve,
    /// Apply pending database migrations
    Migrate,
    /// Apply migrations and insert the default categories
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new()
        .load()
        .context("failed to load configuration")?;
    init_tracing(&config).context("failed to initialise tracing")?;

    tracing::info!(profile = %config.profile, "Configuration loaded");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = init_pool(&config).await?;
    run_migrations(&db).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(config, db).await,
        Command::Migrate => {
            tracing::info!("Migrations applied");
            Ok(())
        }
        Command::Seed => {
            let created = seed_categories(&db).await?;
            tracing::info!(created, "Seeding complete");
            Ok(())
        }
    }
}
