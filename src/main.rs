//! Lucky Envelope - lucky money envelope backend
//!
//! Serves the HTTP API and runs the expiry reclaim job next to it.

use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lucky_envelope::api::{self, AppState};
use lucky_envelope::envelope::EnvelopeDistributor;
use lucky_envelope::jobs::{ExpiryReclaimer, JobScheduler};
use lucky_envelope::ledger::Ledger;
use lucky_envelope::lock::PgLeaseLock;
use lucky_envelope::transfer::TransferCoordinator;
use lucky_envelope::{db, Config};

/// Initialize tracing/logging
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lucky_envelope=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!(
        environment = %config.environment,
        instance_id = %config.instance_id,
        "Starting lucky_envelope server"
    );
    tracing::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    db::verify_connection(&pool).await?;
    if !db::check_schema(&pool, &config.system_account.account_no).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    let ledger = Ledger::new(pool.clone());
    let transfer = TransferCoordinator::new(ledger);
    let distributor = EnvelopeDistributor::new(transfer, config.system_account.clone())
        .with_links(config.envelope_links.clone());

    let lock = PgLeaseLock::new(pool.clone(), config.instance_id.clone())
        .with_retry_delay(config.reclaim.lock_retry_delay);
    let reclaimer = ExpiryReclaimer::new(
        pool.clone(),
        distributor.clone(),
        Arc::new(lock),
        config.reclaim.clone(),
    );
    let scheduler = JobScheduler::new(reclaimer).start();

    let app = api::build_app(AppState::new(pool.clone(), distributor));

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    scheduler.abort();
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
