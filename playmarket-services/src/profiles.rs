//! User profiles

use chrono::{DateTime, Utc};
use playmarket_core::{normalize_username, Identity, PlaymarketError, PlaymarketResult, Profile};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use crate::store::{millis_column, to_millis, SqlResultExt, Store};

/// Profile reads and self-service updates
pub struct ProfileStore {
    store: Store,
}

impl ProfileStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Profile of the calling user
    pub fn get_profile(&self, identity: &Identity) -> PlaymarketResult<Profile> {
        self.store.read(|conn| find_by_id(conn, &identity.user_id))
    }

    /// Change the caller's username. Blank input clears it.
    pub fn update_username(&self, identity: &Identity, username: &str) -> PlaymarketResult<Profile> {
        let username = normalize_username(username)?;

        let profile = self.store.write(|tx| {
            let updated = tx
                .execute(
                    "UPDATE profiles SET username = ?2 WHERE id = ?1",
                    params![identity.user_id, username],
                )
                .sql()?;
            if updated == 0 {
                return Err(PlaymarketError::not_found(format!(
                    "Profile {}",
                    identity.user_id
                )));
            }
            find_by_id(tx, &identity.user_id)
        })?;

        info!("Username for {} set to {:?}", profile.id, profile.username);
        Ok(profile)
    }

    pub(crate) fn find_by_email(conn: &Connection, email: &str) -> PlaymarketResult<Option<Profile>> {
        conn.query_row(
            "SELECT id, email, username, created_at FROM profiles WHERE email = ?1",
            params![email],
            profile_from_row,
        )
        .optional()
        .sql()
    }

    pub(crate) fn insert(
        conn: &Connection,
        email: &str,
        created_at: DateTime<Utc>,
    ) -> PlaymarketResult<Profile> {
        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            username: None,
            created_at,
        };

        conn.execute(
            "INSERT INTO profiles (id, email, username, created_at) VALUES (?1, ?2, NULL, ?3)",
            params![profile.id, profile.email, to_millis(created_at)],
        )
        .sql()?;
        Ok(profile)
    }
}

fn find_by_id(conn: &Connection, user_id: &str) -> PlaymarketResult<Profile> {
    conn.query_row(
        "SELECT id, email, username, created_at FROM profiles WHERE id = ?1",
        params![user_id],
        profile_from_row,
    )
    .optional()
    .sql()?
    .ok_or_else(|| PlaymarketError::not_found(format!("Profile {}", user_id)))
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        created_at: millis_column(row, 3)?,
    })
}
