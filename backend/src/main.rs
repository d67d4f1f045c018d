mod api;
mod config;
mod error;
mod models;
mod services;
mod storage;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use dotenv::dotenv;
use tokio::net::TcpListener;

use crate::services::{
    EscrowService, ExplorerVerifier, LogNotifier, OperatorNotifier, TelegramNotifier, WalletPool,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // load env vars
    dotenv().ok();

    // initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = config::AppConfig::from_env().context("Failed to load configuration")?;

    std::fs::create_dir_all(&config.data_dir).context("Failed to create data directory")?;

    // initialize db
    let db_manager = Arc::new(
        storage::DbManager::new(&config.db_path()).context("Failed to open escrow ledger")?,
    );
    let ledger = Arc::new(storage::LedgerStore::new(db_manager));

    let wallet_pool = Arc::new(
        WalletPool::new(config.wallet_pool.clone()).context("Invalid wallet pool")?,
    );

    let verifier = Arc::new(ExplorerVerifier::new(
        config.indexers.clone(),
        config.verify_timeout,
    )?);

    let notifier: Arc<dyn OperatorNotifier> = match (&config.bot_token, &config.admin_chat_id) {
        (Some(token), Some(chat_id)) => {
            tracing::info!("Operator notifications go to Telegram chat {}", chat_id);
            Arc::new(TelegramNotifier::new(token.clone(), chat_id.clone())?)
        }
        _ => {
            tracing::warn!("BOT_TOKEN or ADMIN_ID not set, operator notifications are logged only");
            Arc::new(LogNotifier)
        }
    };

    let escrow_service = Arc::new(EscrowService::new(
        wallet_pool.clone(),
        ledger,
        verifier,
        notifier,
        config.verify_cooldown,
    ));

    if config.admin_api_token.is_none() {
        tracing::warn!("ADMIN_API_TOKEN not set, operator routes are unauthenticated");
    }

    // create API state
    let api_state = api::ApiState {
        escrow_service,
        admin_api_token: config.admin_api_token.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = api::router(api_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(
        "Escrow server listening on {} (currencies: {:?})",
        addr,
        wallet_pool.currencies()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down gracefully...");
}
