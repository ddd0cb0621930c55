use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use slotbook::{
    booking::intent::BookingIntentStore,
    db::{create_pool, repository::Repository, run_migrations},
    inventory::InventoryLedger,
    utils::config::AppConfig,
};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

/// Maintenance jobs for the booking inventory, meant to be run from cron.
#[derive(Parser)]
#[command(name = "slotbook-jobs", about = "Slotbook maintenance jobs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extend the availability horizon from operating hours
    GenerateSlots {
        /// Limit generation to one service
        #[arg(long)]
        service_id: Option<i64>,
    },
    /// Close open slots whose start time has passed
    ClosePastSlots,
    /// Expire active booking intents past their deadline
    ExpireIntents,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let pool = create_pool(&config.database_url, config.max_db_connections).await?;
    run_migrations(&pool).await?;

    let repo = Arc::new(Repository::new(Arc::new(pool)));

    match cli.command {
        Commands::GenerateSlots { service_id } => {
            let generated = InventoryLedger::new(repo).generate_slots(service_id).await?;
            info!(generated, "Slot generation finished");
        }
        Commands::ClosePastSlots => {
            let closed = InventoryLedger::new(repo).close_past_slots().await?;
            info!(closed, "Past slots closed");
        }
        Commands::ExpireIntents => {
            let store = BookingIntentStore::new(
                repo,
                config.session_browse_ttl_minutes,
                config.session_checkout_ttl_minutes,
            );
            let swept = store.expire_stale().await?;
            info!(swept, "Intent sweep finished");
        }
    }

    Ok(())
}
