//! API route definitions

mod account;
mod auth;
mod health;
mod markets;
mod rpc;

use axum::Router;
use crate::AppState;

/// Create all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(markets::routes())
        .merge(rpc::routes())
        .merge(account::routes())
        .merge(auth::routes())
        .merge(health::routes())
}
