//! Playmarket API Server
//!
//! HTTP API over the play-money exchange: markets, trading, resolution,
//! balances, holdings, profiles and passwordless sign-in.

mod error;
mod extract;
mod routes;

use axum::{
    http::{header, Method},
    Router,
};
use playmarket_core::PlaymarketResult;
use playmarket_services::{Exchange, LogNotifier, PlaymarketConfig, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::error::ApiError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub exchange: Arc<Exchange>,
}

impl AppState {
    pub fn new(exchange: Exchange) -> Self {
        Self {
            exchange: Arc::new(exchange),
        }
    }

    /// Run one exchange operation under the configured retry policy
    pub async fn call<T, F>(&self, name: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut(&Exchange) -> PlaymarketResult<T>,
    {
        let exchange = self.exchange.as_ref();
        exchange
            .retry
            .run(name, || op(exchange))
            .await
            .map_err(ApiError::from)
    }
}

/// Build the full router for `state`
pub fn app(state: AppState) -> Router {
    // Configure CORS for frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env.local file
    if let Err(e) = dotenvy::from_filename(".env.local") {
        // Not an error if the file doesn't exist
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env.local: {}", e);
        }
    }

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,playmarket_api=debug,playmarket_services=debug,tower_http=debug")
        }))
        .init();

    info!("Starting Playmarket API");

    let config = PlaymarketConfig::from_env()?;

    info!("Opening exchange database at: {}", config.database_path);
    let store = Store::open(&config.database_path)?;
    let exchange = Exchange::new(store, &config, Arc::new(LogNotifier));

    let admins = exchange.identity.sync_admin_roles(&config.admin_emails)?;
    if admins == 0 {
        info!("No ADMIN_EMAILS configured - market administration is disabled");
    } else {
        info!("Granted admin role to {} account(s)", admins);
    }

    let app = app(AppState::new(exchange));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
