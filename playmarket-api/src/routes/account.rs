//! Caller-scoped reads and profile edits

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Json, Router,
};
use playmarket_core::{Balance, Holding, Profile, TradeWithMarket};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::Authenticated;
use crate::AppState;

/// Response for the caller's trade history
#[derive(Debug, Serialize)]
pub struct TradesResponse {
    pub trades: Vec<TradeWithMarket>,
    pub count: usize,
}

/// Response for the caller's holdings
#[derive(Debug, Serialize)]
pub struct HoldingsResponse {
    pub holdings: Vec<Holding>,
    pub count: usize,
}

/// Body of a profile update
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub username: Option<String>,
}

/// Create account routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/balance", get(get_balance))
        .route("/trades", get(list_trades))
        .route("/holdings", get(list_holdings))
        .route("/profile", get(get_profile).patch(update_profile))
}

async fn get_balance(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<Balance>, ApiError> {
    let balance = state
        .call("get_balance", |exchange| exchange.ledger.get_balance(&identity))
        .await?;
    Ok(Json(balance))
}

async fn list_trades(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<TradesResponse>, ApiError> {
    let trades = state
        .call("trade_history", |exchange| exchange.trades.trade_history(&identity))
        .await?;
    Ok(Json(TradesResponse {
        count: trades.len(),
        trades,
    }))
}

async fn list_holdings(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<HoldingsResponse>, ApiError> {
    let holdings = state
        .call("holdings", |exchange| exchange.positions.holdings(&identity))
        .await?;
    Ok(Json(HoldingsResponse {
        count: holdings.len(),
        holdings,
    }))
}

async fn get_profile(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
) -> Result<Json<Profile>, ApiError> {
    let profile = state
        .call("get_profile", |exchange| exchange.profiles.get_profile(&identity))
        .await?;
    Ok(Json(profile))
}

/// Update the caller's own username; blank or null clears it
async fn update_profile(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    body: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
    let Json(request) = body?;
    let username = request.username.unwrap_or_default();
    let profile = state
        .call("update_username", |exchange| {
            exchange.profiles.update_username(&identity, &username)
        })
        .await?;
    Ok(Json(profile))
}
