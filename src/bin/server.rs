use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dotenvy::dotenv;
use slotbook::{
    backend::{AppState, router::build_router},
    booking::{finalizer::BookingFinalizer, intent::BookingIntentStore},
    db::{create_pool, repository::Repository, run_migrations},
    payment::MockGateway,
    utils::config::AppConfig,
};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_level(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,slotbook=debug".into()),
        )
        .init();

    info!("Starting Slotbook booking API");

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let pool = create_pool(&config.database_url, config.max_db_connections).await?;
    run_migrations(&pool).await?;

    let repo = Arc::new(Repository::new(Arc::new(pool)));
    let gateway = Arc::new(MockGateway);

    let state = Arc::new(AppState {
        repo: repo.clone(),
        intents: BookingIntentStore::new(
            repo.clone(),
            config.session_browse_ttl_minutes,
            config.session_checkout_ttl_minutes,
        ),
        finalizer: BookingFinalizer::new(repo.clone(), gateway),
    });

    let router = build_router(state, Duration::from_millis(config.request_timeout_ms));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await?;

    info!("Shutting down gracefully...");

    Ok(())
}
