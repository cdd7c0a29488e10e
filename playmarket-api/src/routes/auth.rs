//! Passwordless sign-in: request a link, exchange it for a session, sign out

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use playmarket_services::Session;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::bearer;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
}

/// Acknowledgement that a link was sent. The link itself is never returned.
#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

/// Create auth routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/verify", post(verify))
        .route("/auth/sign-out", post(sign_out))
}

async fn sign_in(
    State(state): State<AppState>,
    body: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignInResponse>), ApiError> {
    let Json(request) = body?;
    let link = state
        .call("request_sign_in", |exchange| {
            exchange.identity.request_sign_in(&request.email)
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SignInResponse {
            email: link.email,
            expires_at: link.expires_at,
        }),
    ))
}

async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<Session>, ApiError> {
    let Json(request) = body?;
    let session = state
        .call("complete_sign_in", |exchange| {
            exchange.identity.complete_sign_in(request.token.trim())
        })
        .await?;
    Ok(Json(session))
}

async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let credential = bearer(&headers);
    state
        .call("sign_out", |exchange| exchange.identity.sign_out(credential))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
