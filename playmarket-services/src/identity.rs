//! Session and identity gate
//!
//! Turns bearer credentials into an [`Identity`] for each request, and turns an
//! identity into an [`Admin`] capability after a role lookup. Nothing here is
//! cached between requests: every call reads the sessions and role tables.
//!
//! Sign-in is passwordless. A one-time link token is handed to a
//! [`SignInNotifier`]; completing the link creates the profile and opening
//! balance on first use and issues a session token. Only SHA-256 hashes of
//! tokens are stored.

use chrono::{DateTime, Duration, Utc};
use playmarket_core::{normalize_email, Identity, PlaymarketError, PlaymarketResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::ledger::Ledger;
use crate::profiles::ProfileStore;
use crate::store::{to_millis, SqlResultExt, Store};

/// Proof that the wrapped identity held the admin role when it was checked.
///
/// Only [`IdentityGate::require_admin`] constructs one, and admin-only store
/// methods take `&Admin`, so they cannot be called without the check.
#[derive(Debug, Clone)]
pub struct Admin(Identity);

impl Admin {
    pub fn identity(&self) -> &Identity {
        &self.0
    }

    pub fn email(&self) -> &str {
        &self.0.email
    }
}

/// A freshly issued session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub email: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// A sign-in link waiting to be delivered
#[derive(Debug, Clone)]
pub struct SignInLink {
    pub email: String,
    pub url: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Delivers sign-in links to their owner
pub trait SignInNotifier: Send + Sync {
    fn send(&self, link: &SignInLink) -> PlaymarketResult<()>;
}

/// Writes sign-in links to the log instead of sending mail
#[derive(Debug, Default)]
pub struct LogNotifier;

impl SignInNotifier for LogNotifier {
    fn send(&self, link: &SignInLink) -> PlaymarketResult<()> {
        info!(
            "Sign-in link for {} (expires {}): {}",
            link.email, link.expires_at, link.url
        );
        Ok(())
    }
}

/// Lifetimes and link settings for the gate
#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub app_base_url: String,
    pub session_ttl: Duration,
    pub link_ttl: Duration,
    pub starting_balance_cents: i64,
}

/// Resolves credentials to identities and checks admin roles
pub struct IdentityGate {
    store: Store,
    settings: IdentitySettings,
    notifier: Arc<dyn SignInNotifier>,
}

impl IdentityGate {
    pub fn new(store: Store, settings: IdentitySettings, notifier: Arc<dyn SignInNotifier>) -> Self {
        Self {
            store,
            settings,
            notifier,
        }
    }

    /// Issue a one-time sign-in link for `email` and hand it to the notifier
    #[instrument(skip(self))]
    pub fn request_sign_in(&self, email: &str) -> PlaymarketResult<SignInLink> {
        let email = normalize_email(email)?;
        let token = new_token();
        let now = Utc::now();
        let expires_at = expiry(now, self.settings.link_ttl)?;

        self.store.write(|tx| {
            tx.execute(
                "DELETE FROM sign_in_links WHERE expires_at <= ?1",
                params![to_millis(now)],
            )
            .sql()?;
            tx.execute(
                "INSERT INTO sign_in_links (token_hash, email, expires_at) VALUES (?1, ?2, ?3)",
                params![hash_token(&token), email, to_millis(expires_at)],
            )
            .sql()?;
            Ok(())
        })?;

        let link = SignInLink {
            url: format!(
                "{}/auth/callback?token={}",
                self.settings.app_base_url.trim_end_matches('/'),
                token
            ),
            email,
            expires_at,
        };
        self.notifier.send(&link)?;
        Ok(link)
    }

    /// Consume a sign-in link token and open a session.
    ///
    /// The first successful sign-in for an email creates its profile and
    /// opening balance in the same transaction.
    #[instrument(skip(self, token))]
    pub fn complete_sign_in(&self, token: &str) -> PlaymarketResult<Session> {
        let link_hash = hash_token(token.trim());
        let session_token = new_token();
        let now = Utc::now();
        let expires_at = expiry(now, self.settings.session_ttl)?;
        let starting_balance = self.settings.starting_balance_cents;

        let session = self.store.write(|tx| {
            let link: Option<(String, i64)> = tx
                .query_row(
                    "SELECT email, expires_at FROM sign_in_links WHERE token_hash = ?1",
                    params![link_hash],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .sql()?;

            let Some((email, link_expires)) = link else {
                return Err(PlaymarketError::Unauthenticated);
            };

            tx.execute(
                "DELETE FROM sign_in_links WHERE token_hash = ?1",
                params![link_hash],
            )
            .sql()?;

            if link_expires <= to_millis(now) {
                // Commit the deletion of the stale link before rejecting
                return Ok(None);
            }

            let profile = match ProfileStore::find_by_email(tx, &email)? {
                Some(profile) => profile,
                None => {
                    let profile = ProfileStore::insert(tx, &email, now)?;
                    Ledger::open_account(tx, &profile.id, starting_balance)?;
                    info!("Created account {} for {}", profile.id, email);
                    profile
                }
            };

            tx.execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![to_millis(now)],
            )
            .sql()?;
            tx.execute(
                "INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
                params![hash_token(&session_token), profile.id, to_millis(expires_at)],
            )
            .sql()?;

            Ok(Some(Session {
                access_token: session_token.clone(),
                user_id: profile.id,
                email: profile.email,
                expires_at,
            }))
        })?;

        match session {
            Some(session) => {
                info!("Session opened for {}", session.email);
                Ok(session)
            }
            None => {
                warn!("Rejected expired sign-in link");
                Err(PlaymarketError::Unauthenticated)
            }
        }
    }

    /// Resolve an `Authorization` header value (or bare token) to an identity
    pub fn authenticate(&self, credential: Option<&str>) -> PlaymarketResult<Identity> {
        let token = parse_bearer(credential).ok_or(PlaymarketError::Unauthenticated)?;

        let token_hash = hash_token(token);
        let now = to_millis(Utc::now());

        let identity = self.store.read(|conn| {
            conn.query_row(
                r#"
                SELECT p.id, p.email
                FROM sessions s
                JOIN profiles p ON p.id = s.user_id
                WHERE s.token_hash = ?1 AND s.expires_at > ?2
                "#,
                params![token_hash, now],
                |row| {
                    Ok(Identity {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()
            .sql()
        })?;

        identity.ok_or(PlaymarketError::Unauthenticated)
    }

    /// Revoke the session behind `credential`
    pub fn sign_out(&self, credential: Option<&str>) -> PlaymarketResult<()> {
        let identity = self.authenticate(credential)?;
        let token = parse_bearer(credential).ok_or(PlaymarketError::Unauthenticated)?;

        self.store.write(|tx| {
            tx.execute(
                "DELETE FROM sessions WHERE token_hash = ?1",
                params![hash_token(token)],
            )
            .sql()?;
            Ok(())
        })?;

        info!("Session closed for {}", identity.email);
        Ok(())
    }

    /// Check the admin role for this request
    pub fn require_admin(&self, identity: &Identity) -> PlaymarketResult<Admin> {
        let is_admin = self.store.read(|conn| has_admin_role(conn, &identity.email))?;
        if is_admin {
            debug!("Admin role confirmed for {}", identity.email);
            Ok(Admin(identity.clone()))
        } else {
            warn!("Admin action denied for {}", identity.email);
            Err(PlaymarketError::Unauthorized)
        }
    }

    /// Replace the admin role table with `emails`
    pub fn sync_admin_roles(&self, emails: &[String]) -> PlaymarketResult<usize> {
        let mut normalized: Vec<String> = emails
            .iter()
            .map(|email| email.trim().to_lowercase())
            .filter(|email| !email.is_empty())
            .collect();
        normalized.sort();
        normalized.dedup();

        let now = to_millis(Utc::now());
        self.store.write(|tx| {
            tx.execute("DELETE FROM admin_roles", []).sql()?;
            for email in &normalized {
                tx.execute(
                    "INSERT INTO admin_roles (email, granted_at) VALUES (?1, ?2)",
                    params![email, now],
                )
                .sql()?;
            }
            Ok(())
        })?;

        info!("Admin roles synced: {} email(s)", normalized.len());
        Ok(normalized.len())
    }
}

fn has_admin_role(conn: &Connection, email: &str) -> PlaymarketResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM admin_roles WHERE email = lower(?1))",
        params![email],
        |row| row.get(0),
    )
    .sql()
}

/// Token from an `Authorization` value. The `Bearer` scheme is optional and
/// matched case-insensitively.
fn parse_bearer(credential: Option<&str>) -> Option<&str> {
    let value = credential?.trim();
    let token = match value.get(..7) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> PlaymarketResult<DateTime<Utc>> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| PlaymarketError::internal(format!("Expiry out of range for ttl {}", ttl)))
}

fn new_token() -> String {
    hex::encode(rand::random::<[u8; 32]>())
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
