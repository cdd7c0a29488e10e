//! Error types for the exchange

use thiserror::Error;

use crate::format::format_cash;

/// Exchange-wide error type
///
/// Every variant renders to a message that is safe to show to the caller
/// verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaymarketError {
    #[error("Sign in required")]
    Unauthenticated,

    #[error("Admin access required")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Market is closed for trading")]
    MarketClosed,

    #[error("Market is already resolved")]
    AlreadyResolved,

    #[error("Insufficient funds: trade costs {}, balance is {}", cash(.required), cash(.available))]
    InsufficientFunds { required: i64, available: i64 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaymarketError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        PlaymarketError::NotFound(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        PlaymarketError::InvalidArgument(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        PlaymarketError::StoreUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        PlaymarketError::Internal(msg.into())
    }

    /// Whether retrying the same operation may succeed.
    ///
    /// Only contention on the store qualifies. Business-rule failures are final.
    pub fn is_transient(&self) -> bool {
        matches!(self, PlaymarketError::StoreUnavailable(_))
    }

    /// Stable snake_case identifier for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            PlaymarketError::Unauthenticated => "unauthenticated",
            PlaymarketError::Unauthorized => "unauthorized",
            PlaymarketError::NotFound(_) => "not_found",
            PlaymarketError::InvalidArgument(_) => "invalid_argument",
            PlaymarketError::MarketClosed => "market_closed",
            PlaymarketError::AlreadyResolved => "already_resolved",
            PlaymarketError::InsufficientFunds { .. } => "insufficient_funds",
            PlaymarketError::StoreUnavailable(_) => "store_unavailable",
            PlaymarketError::Internal(_) => "internal",
        }
    }
}

fn cash(cents: &i64) -> String {
    format_cash(*cents)
}

/// Result type alias for exchange operations
pub type PlaymarketResult<T> = Result<T, PlaymarketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_errors_are_transient() {
        assert!(PlaymarketError::unavailable("database is locked").is_transient());
        assert!(!PlaymarketError::MarketClosed.is_transient());
        assert!(!PlaymarketError::InsufficientFunds {
            required: 1100,
            available: 450
        }
        .is_transient());
        assert!(!PlaymarketError::internal("constraint failed").is_transient());
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = PlaymarketError::InsufficientFunds {
            required: 1100,
            available: 450,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient funds: trade costs $11.00, balance is $4.50"
        );
        assert_eq!(err.code(), "insufficient_funds");
    }
}
