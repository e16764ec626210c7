//! # AI Access Main Entry Point

use std::sync::Arc;

use ai_access::{
    config::ConfigLoader,
    db,
    destinations::{BuiltinDestinations, DestinationRegistry},
    models::Capability,
    seeds,
    server::{AppState, run_server},
    sync::{HttpModelDiscovery, SyncFilter},
    telemetry,
};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "ai-access", version, about = "AI provider access resolution service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Apply pending database migrations
    Migrate,
    /// Seed the default provider catalogue
    Seed,
    /// Run one capability sync and print the report
    Sync {
        /// Only sync this provider slug
        #[arg(long)]
        provider: Option<String>,
        /// Only sync this capability (chat, content, image, audio)
        #[arg(long)]
        capability: Option<Capability>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    telemetry::init_tracing(&config)?;
    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Effective configuration");
    }

    let db = db::init_pool(&config).await?;
    db::health_check(&db).await?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Migrate => {
            db::run_migrations(&db).await?;
            tracing::info!("Migrations applied");
        }
        Command::Seed => {
            db::run_migrations(&db).await?;
            let created = seeds::seed_providers(&db).await?;
            tracing::info!(created, "Seeding finished");
        }
        Command::Sync {
            provider,
            capability,
        } => {
            let state = compose(config, db)?;
            let report = state
                .sync
                .sync(&SyncFilter {
                    provider,
                    capability,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Serve => {
            db::run_migrations(&db).await?;
            let state = compose(config, db)?;
            run_server(state).await?;
        }
    }

    Ok(())
}

fn compose(
    config: ai_access::config::AppConfig,
    db: sea_orm::DatabaseConnection,
) -> Result<AppState, Box<dyn std::error::Error>> {
    let discovery = HttpModelDiscovery::new(
        config.credential_key()?,
        config.sync.discovery_timeout(),
    )?;
    let destinations = DestinationRegistry::compose(&[&BuiltinDestinations]);
    Ok(AppState::compose(
        Arc::new(config),
        Arc::new(db),
        Arc::new(discovery),
        destinations,
    )?)
}
