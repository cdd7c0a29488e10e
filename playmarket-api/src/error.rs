//! Conversion of exchange errors into HTTP responses

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use playmarket_core::PlaymarketError;
use serde::Serialize;
use tracing::{debug, error};

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Handler error carrying the exchange error kind
#[derive(Debug)]
pub struct ApiError(pub PlaymarketError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PlaymarketError::Unauthenticated => StatusCode::UNAUTHORIZED,
            PlaymarketError::Unauthorized => StatusCode::FORBIDDEN,
            PlaymarketError::NotFound(_) => StatusCode::NOT_FOUND,
            PlaymarketError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            PlaymarketError::MarketClosed | PlaymarketError::AlreadyResolved => {
                StatusCode::CONFLICT
            }
            PlaymarketError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            PlaymarketError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PlaymarketError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<PlaymarketError> for ApiError {
    fn from(err: PlaymarketError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(PlaymarketError::invalid(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(PlaymarketError::invalid(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected ({}): {}", status, self.0);
        }

        let body = ErrorResponse {
            error: self.0.to_string(),
            code: self.0.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PlaymarketError::Unauthenticated, 401),
            (PlaymarketError::Unauthorized, 403),
            (PlaymarketError::not_found("Market x"), 404),
            (PlaymarketError::invalid("bad"), 400),
            (PlaymarketError::MarketClosed, 409),
            (PlaymarketError::AlreadyResolved, 409),
            (
                PlaymarketError::InsufficientFunds {
                    required: 1100,
                    available: 450,
                },
                422,
            ),
            (PlaymarketError::unavailable("locked"), 503),
            (PlaymarketError::internal("boom"), 500),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status().as_u16(), status);
        }
    }
}
