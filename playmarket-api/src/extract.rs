//! Request extractors for bearer sessions and the admin role

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use playmarket_core::Identity;
use playmarket_services::Admin;

use crate::error::ApiError;
use crate::AppState;

/// Raw `Authorization` header value, if present and valid UTF-8
pub fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// The signed-in caller. Rejects with 401 when the session is missing or expired.
pub struct Authenticated(pub Identity);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credential = bearer(&parts.headers);
        let identity = state
            .call("authenticate", |exchange| exchange.identity.authenticate(credential))
            .await?;
        Ok(Self(identity))
    }
}

/// A signed-in caller holding the admin role at request time
pub struct AdminUser(pub Admin);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Authenticated(identity) = Authenticated::from_request_parts(parts, state).await?;
        let admin = state
            .call("require_admin", |exchange| exchange.identity.require_admin(&identity))
            .await?;
        Ok(Self(admin))
    }
}
