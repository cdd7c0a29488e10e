//! Runtime configuration loaded from the environment

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Longest accepted session lifetime (ten years)
pub const MAX_SESSION_TTL_HOURS: i64 = 87_600;
/// Longest accepted sign-in link lifetime (ten years)
pub const MAX_SIGN_IN_LINK_TTL_MINUTES: i64 = 5_256_000;

/// Configuration for the exchange services and the HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaymarketConfig {
    /// Path to the SQLite database file
    pub database_path: String,
    /// Port the HTTP server listens on
    pub server_port: u16,
    /// Emails granted the admin role at startup (lowercased)
    pub admin_emails: Vec<String>,
    /// Play cash credited when an account is first created, in cents
    pub starting_balance_cents: i64,
    /// Credit per winning share on resolution, in cents
    pub payout_per_share_cents: i64,
    /// Lifetime of a signed-in session
    pub session_ttl_hours: i64,
    /// Lifetime of an emailed sign-in link
    pub sign_in_link_ttl_minutes: i64,
    /// Front-end URL the sign-in link points at
    pub app_base_url: String,
    /// Attempts per operation when the store reports contention
    pub retry_max_attempts: u32,
    /// First backoff delay, doubled on every further attempt
    pub retry_base_delay_ms: u64,
}

impl Default for PlaymarketConfig {
    fn default() -> Self {
        Self {
            database_path: "data/playmarket.db".to_string(),
            server_port: 3001,
            admin_emails: Vec::new(),
            starting_balance_cents: 100_000,
            payout_per_share_cents: 100,
            session_ttl_hours: 24 * 7,
            sign_in_link_ttl_minutes: 15,
            app_base_url: "http://localhost:3000".to_string(),
            retry_max_attempts: 3,
            retry_base_delay_ms: 25,
        }
    }
}

impl PlaymarketConfig {
    /// Load configuration from environment variables
    ///
    /// Every variable is optional and falls back to [`PlaymarketConfig::default`]:
    /// - DATABASE_PATH, SERVER_PORT, APP_BASE_URL
    /// - ADMIN_EMAILS: comma-separated list
    /// - STARTING_BALANCE_CENTS, PAYOUT_PER_SHARE_CENTS
    /// - SESSION_TTL_HOURS, SIGN_IN_LINK_TTL_MINUTES
    /// - RETRY_MAX_ATTEMPTS, RETRY_BASE_DELAY_MS
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            database_path: lookup("DATABASE_PATH").unwrap_or(defaults.database_path),
            server_port: parse_or(&lookup, "SERVER_PORT", defaults.server_port)?,
            admin_emails: lookup("ADMIN_EMAILS")
                .map(|list| parse_email_list(&list))
                .unwrap_or_default(),
            starting_balance_cents: parse_or(
                &lookup,
                "STARTING_BALANCE_CENTS",
                defaults.starting_balance_cents,
            )?,
            payout_per_share_cents: parse_or(
                &lookup,
                "PAYOUT_PER_SHARE_CENTS",
                defaults.payout_per_share_cents,
            )?,
            session_ttl_hours: parse_or(&lookup, "SESSION_TTL_HOURS", defaults.session_ttl_hours)?,
            sign_in_link_ttl_minutes: parse_or(
                &lookup,
                "SIGN_IN_LINK_TTL_MINUTES",
                defaults.sign_in_link_ttl_minutes,
            )?,
            app_base_url: lookup("APP_BASE_URL").unwrap_or(defaults.app_base_url),
            retry_max_attempts: parse_or(
                &lookup,
                "RETRY_MAX_ATTEMPTS",
                defaults.retry_max_attempts,
            )?,
            retry_base_delay_ms: parse_or(
                &lookup,
                "RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay_ms,
            )?,
        };

        config.check()?;
        Ok(config)
    }

    /// Session lifetime, clamped to `1..=MAX_SESSION_TTL_HOURS`
    pub fn session_ttl(&self) -> Duration {
        let hours = self.session_ttl_hours.clamp(1, MAX_SESSION_TTL_HOURS);
        Duration::try_hours(hours).unwrap_or_else(|| Duration::days(7))
    }

    /// Sign-in link lifetime, clamped to `1..=MAX_SIGN_IN_LINK_TTL_MINUTES`
    pub fn sign_in_link_ttl(&self) -> Duration {
        let minutes = self
            .sign_in_link_ttl_minutes
            .clamp(1, MAX_SIGN_IN_LINK_TTL_MINUTES);
        Duration::try_minutes(minutes).unwrap_or_else(|| Duration::minutes(15))
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.starting_balance_cents < 0 {
            return Err(ConfigError::OutOfRange {
                field: "STARTING_BALANCE_CENTS",
                reason: "must not be negative",
            });
        }
        if self.payout_per_share_cents <= 0 {
            return Err(ConfigError::OutOfRange {
                field: "PAYOUT_PER_SHARE_CENTS",
                reason: "must be positive",
            });
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            return Err(ConfigError::OutOfRange {
                field: "SESSION_TTL_HOURS",
                reason: "must be between 1 and 87600 (ten years)",
            });
        }
        if !(1..=MAX_SIGN_IN_LINK_TTL_MINUTES).contains(&self.sign_in_link_ttl_minutes) {
            return Err(ConfigError::OutOfRange {
                field: "SIGN_IN_LINK_TTL_MINUTES",
                reason: "must be between 1 and 5256000 (ten years)",
            });
        }
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                field: "RETRY_MAX_ATTEMPTS",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

/// Split a comma-separated allowlist into trimmed, lowercase emails
pub fn parse_email_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|email| email.trim().to_lowercase())
        .filter(|email| !email.is_empty())
        .collect()
}

fn parse_or<F, T>(lookup: &F, field: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(field) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            field,
            error: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {error}")]
    InvalidValue { field: &'static str, error: String },

    #[error("{field} {reason}")]
    OutOfRange {
        field: &'static str,
        reason: &'static str,
    },
}
