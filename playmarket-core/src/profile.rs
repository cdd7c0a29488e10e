//! User profiles and identities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlaymarketError, PlaymarketResult};

/// Longest accepted username, in characters
pub const MAX_USERNAME_LEN: usize = 32;

/// Public profile of a user, 1:1 with the account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    /// Lowercase, fixed at sign-up
    pub email: String,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Caller resolved from a session credential, valid for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

/// Normalize an email address for storage and comparison
pub fn normalize_email(email: &str) -> PlaymarketResult<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    };

    if !valid || email.chars().any(char::is_whitespace) {
        return Err(PlaymarketError::invalid(format!(
            "Invalid email address: {}",
            email
        )));
    }
    Ok(email)
}

/// Normalize a username update. Blank input clears the username.
pub fn normalize_username(username: &str) -> PlaymarketResult<Option<String>> {
    let username = username.trim();
    if username.is_empty() {
        return Ok(None);
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(PlaymarketError::invalid(format!(
            "Username must be at most {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(PlaymarketError::invalid(
            "Username contains control characters",
        ));
    }
    Ok(Some(username.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email("  Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        assert!(normalize_email("alice").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("alice@localhost").is_err());
        assert!(normalize_email("a b@example.com").is_err());
    }

    #[test]
    fn test_normalize_username() {
        assert_eq!(normalize_username("  trader ").unwrap().as_deref(), Some("trader"));
        assert_eq!(normalize_username("   ").unwrap(), None);
        assert!(normalize_username(&"x".repeat(MAX_USERNAME_LEN + 1)).is_err());
        assert!(normalize_username("bad\u{0007}name").is_err());
    }
}
