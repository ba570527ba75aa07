//! Tudo Ledger - Main Application Entry Point
//!
//! Ledger service for a crowdfunding and savings platform. Users create funding goals
//! ("tudos"), contributors pay into them through Paystack or Flutterwave, and owners
//! withdraw to their bank accounts. Every gateway payment is reconciled from its webhook.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries)
//! - **Authentication**: bearer session tokens, SHA-256 hashed at rest
//! - **Webhooks**: HMAC-SHA512 (Paystack) and shared-secret hash (Flutterwave)
//! - **Background work**: notification worker and tudo expiry sweeper on tokio tasks
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create database connection pool and run migrations
//! 3. Start the notification worker and the expiry sweeper
//! 4. Build HTTP router with routes and middleware
//! 5. Start server on configured port

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_helpers;

use std::{sync::Arc, time::Duration};

use tracing_subscriber::EnvFilter;

use crate::services::{banking, notification_service, scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG, defaults to "info"
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env()?;
    tracing::info!(
        service_charge_bps = config.service_charge_bps,
        "Configuration loaded"
    );

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let (notifier, receiver) = notification_service::Notifier::channel(notification_service::QUEUE_CAPACITY);
    notification_service::spawn_worker(receiver, config.notify_relay_url.clone());

    scheduler::spawn_expiry_sweeper(
        pool.clone(),
        notifier.clone(),
        Duration::from_secs(config.expiry_sweep_interval_secs.max(1)),
    );

    let bank = banking::from_config(&config)?;

    let addr = format!("0.0.0.0:{}", config.server_port);

    let app = routes::build_router(state::AppState {
        pool,
        config: Arc::new(config),
        notifier,
        bank,
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
