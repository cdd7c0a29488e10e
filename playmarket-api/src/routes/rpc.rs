//! Remote procedures that move money: trading and resolution

use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use playmarket_core::{MarketOutcome, ResolutionReport, Side, TradeReceipt};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{AdminUser, Authenticated};
use crate::AppState;

/// Arguments of `place_trade`
#[derive(Debug, Deserialize)]
pub struct PlaceTradeRequest {
    pub p_market_id: String,
    pub p_side: Side,
    pub p_shares: i64,
}

/// Arguments of `resolve_market`
#[derive(Debug, Deserialize)]
pub struct ResolveMarketRequest {
    pub p_market_id: String,
    pub p_outcome: MarketOutcome,
}

/// Create RPC routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rpc/place_trade", post(place_trade))
        .route("/rpc/resolve_market", post(resolve_market))
}

async fn place_trade(
    State(state): State<AppState>,
    Authenticated(identity): Authenticated,
    body: Result<Json<PlaceTradeRequest>, JsonRejection>,
) -> Result<Json<TradeReceipt>, ApiError> {
    let Json(request) = body?;
    let receipt = state
        .call("place_trade", |exchange| {
            exchange.trades.place_trade(
                &identity,
                &request.p_market_id,
                request.p_side,
                request.p_shares,
            )
        })
        .await?;
    Ok(Json(receipt))
}

async fn resolve_market(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    body: Result<Json<ResolveMarketRequest>, JsonRejection>,
) -> Result<Json<ResolutionReport>, ApiError> {
    let Json(request) = body?;
    let report = state
        .call("resolve_market", |exchange| {
            exchange
                .resolution
                .resolve_market(&admin, &request.p_market_id, request.p_outcome)
        })
        .await?;
    Ok(Json(report))
}
