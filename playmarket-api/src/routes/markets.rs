//! Market endpoints: public reads plus admin creation and open/closed toggle

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use playmarket_core::{Market, MarketFilter, MarketStatus, NewMarket};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::extract::AdminUser;
use crate::AppState;

/// Response for listing markets
#[derive(Debug, Serialize)]
pub struct MarketsResponse {
    pub markets: Vec<Market>,
    pub count: usize,
}

/// Response for listing categories
#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

/// Body of a status change
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: MarketStatus,
}

/// Create market routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/markets", get(list_markets).post(create_market))
        .route("/markets/categories", get(list_categories))
        .route("/markets/{id}", get(get_market))
        .route("/markets/{id}/status", patch(set_status))
}

/// List markets, newest first, with optional status and category filters
async fn list_markets(
    State(state): State<AppState>,
    query: Result<Query<MarketFilter>, QueryRejection>,
) -> Result<Json<MarketsResponse>, ApiError> {
    let Query(filter) = query?;
    let markets = state
        .call("list_markets", |exchange| exchange.markets.list_markets(&filter))
        .await?;

    Ok(Json(MarketsResponse {
        count: markets.len(),
        markets,
    }))
}

async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<CategoriesResponse>, ApiError> {
    let categories = state
        .call("categories", |exchange| exchange.markets.categories())
        .await?;
    Ok(Json(CategoriesResponse { categories }))
}

/// Get a single market
async fn get_market(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Market>, ApiError> {
    let market = state
        .call("get_market", |exchange| exchange.markets.get_market(&id))
        .await?;
    Ok(Json(market))
}

async fn create_market(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    body: Result<Json<NewMarket>, JsonRejection>,
) -> Result<(StatusCode, Json<Market>), ApiError> {
    let Json(input) = body?;
    let market = state
        .call("create_market", |exchange| {
            exchange.markets.create_market(&admin, input.clone())
        })
        .await?;

    info!("Market {} created by {}", market.id, admin.email());
    Ok((StatusCode::CREATED, Json(market)))
}

async fn set_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<Market>, ApiError> {
    let Json(request) = body?;
    let market = state
        .call("set_status", |exchange| {
            exchange.markets.set_status(&admin, &id, request.status)
        })
        .await?;
    Ok(Json(market))
}
