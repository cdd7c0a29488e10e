//! SQLite store shared by every service
//!
//! One connection behind a mutex. Reads borrow it directly; writes run inside
//! an `IMMEDIATE` transaction so every write operation is serialized against
//! all other writers, in this process and any other process sharing the file.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use playmarket_core::{PlaymarketError, PlaymarketResult};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How long SQLite waits on a locked database file before reporting busy
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the exchange database
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database file and its schema
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Io(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let conn = Connection::open(db_path.as_ref())?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        info!(
            "Opened database {} (journal_mode={})",
            db_path.as_ref().display(),
            mode
        );

        Self::from_connection(conn)
    }

    /// Create an in-memory store (useful for testing)
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a read-only closure against the connection
    pub fn read<T, F>(&self, f: F) -> PlaymarketResult<T>
    where
        F: FnOnce(&Connection) -> PlaymarketResult<T>,
    {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run a closure inside one write transaction.
    ///
    /// The transaction commits only if the closure returns `Ok`. Any error
    /// drops the transaction, which rolls back every statement it ran.
    pub fn write<T, F>(&self, f: F) -> PlaymarketResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> PlaymarketResult<T>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .sql()?;
        let value = f(&tx)?;
        tx.commit().sql()?;
        Ok(value)
    }

    /// Cheap query to verify the database answers
    pub fn ping(&self) -> PlaymarketResult<()> {
        self.read(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .sql()
                .map(|_| ())
        })
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            username TEXT,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS balances (
            user_id TEXT PRIMARY KEY REFERENCES profiles(id),
            play_cash_balance INTEGER NOT NULL CHECK (play_cash_balance >= 0)
        );

        CREATE TABLE IF NOT EXISTS markets (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            category TEXT,
            closes_at INTEGER,
            status TEXT NOT NULL CHECK (status IN ('open', 'closed', 'resolved')),
            outcome TEXT CHECK (outcome IN ('resolved_yes', 'resolved_no')),
            yes_price INTEGER NOT NULL CHECK (yes_price BETWEEN 1 AND 99),
            no_price INTEGER NOT NULL CHECK (no_price BETWEEN 1 AND 99),
            created_at INTEGER NOT NULL,
            CHECK ((status = 'resolved') = (outcome IS NOT NULL))
        );

        CREATE INDEX IF NOT EXISTS idx_markets_created
        ON markets(created_at DESC);

        CREATE TABLE IF NOT EXISTS trades (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES profiles(id),
            market_id TEXT NOT NULL REFERENCES markets(id),
            side TEXT NOT NULL CHECK (side IN ('yes', 'no')),
            shares INTEGER NOT NULL CHECK (shares > 0),
            price_per_share INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_trades_user
        ON trades(user_id, created_at);

        CREATE TABLE IF NOT EXISTS positions (
            user_id TEXT NOT NULL REFERENCES profiles(id),
            market_id TEXT NOT NULL REFERENCES markets(id),
            side TEXT NOT NULL CHECK (side IN ('yes', 'no')),
            shares INTEGER NOT NULL CHECK (shares >= 0),
            PRIMARY KEY (user_id, market_id, side)
        );

        CREATE INDEX IF NOT EXISTS idx_positions_market
        ON positions(market_id, side);

        CREATE TABLE IF NOT EXISTS payouts (
            market_id TEXT NOT NULL REFERENCES markets(id),
            user_id TEXT NOT NULL REFERENCES profiles(id),
            shares INTEGER NOT NULL,
            amount INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (market_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS sign_in_links (
            token_hash TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES profiles(id),
            expires_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS admin_roles (
            email TEXT PRIMARY KEY,
            granted_at INTEGER NOT NULL
        );
        "#,
    )?;

    Ok(())
}

/// Errors raised by the SQLite layer
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(String),
}

impl StoreError {
    /// Lock contention that a later attempt may not hit
    fn is_contention(&self) -> bool {
        match self {
            StoreError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
            }
            StoreError::Database(_) => false,
            StoreError::Io(_) => true,
        }
    }
}

impl From<StoreError> for PlaymarketError {
    fn from(err: StoreError) -> Self {
        if err.is_contention() {
            PlaymarketError::unavailable(err.to_string())
        } else {
            PlaymarketError::internal(err.to_string())
        }
    }
}

/// Lift `rusqlite` results into the exchange error taxonomy
pub(crate) trait SqlResultExt<T> {
    fn sql(self) -> PlaymarketResult<T>;
}

impl<T> SqlResultExt<T> for rusqlite::Result<T> {
    fn sql(self) -> PlaymarketResult<T> {
        self.map_err(|e| StoreError::Database(e).into())
    }
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Read an integer column of epoch milliseconds
pub(crate) fn millis_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ms: i64 = row.get(idx)?;
    from_millis(idx, ms)
}

/// Nullable variant of [`millis_column`]
pub(crate) fn opt_millis_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|ms| from_millis(idx, ms))
        .transpose()
}

fn from_millis(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| {
        let err = PlaymarketError::internal(format!("Timestamp out of range: {}", ms));
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(err))
    })
}

/// Read a text column through its `FromStr` impl
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = PlaymarketError>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_answers() {
        let store = Store::new_in_memory().unwrap();
        store.ping().unwrap();
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let store = Store::new_in_memory().unwrap();

        let result: PlaymarketResult<()> = store.write(|tx| {
            tx.execute(
                "INSERT INTO admin_roles (email, granted_at) VALUES ('a@example.com', 0)",
                [],
            )
            .sql()?;
            Err(PlaymarketError::MarketClosed)
        });
        assert_eq!(result, Err(PlaymarketError::MarketClosed));

        let count: i64 = store
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM admin_roles", [], |row| row.get(0))
                    .sql()
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_schema_rejects_negative_balance() {
        let store = Store::new_in_memory().unwrap();
        let result = store.write(|tx| {
            tx.execute(
                "INSERT INTO profiles (id, email, created_at) VALUES ('u1', 'u1@example.com', 0)",
                [],
            )
            .sql()?;
            tx.execute(
                "INSERT INTO balances (user_id, play_cash_balance) VALUES ('u1', -1)",
                [],
            )
            .sql()
        });
        assert!(matches!(result, Err(PlaymarketError::Internal(_))));
    }

    #[test]
    fn test_open_file_database() {
        let dir = std::env::temp_dir().join(format!("playmarket-test-{}", uuid::Uuid::new_v4()));
        let path = dir.join("nested").join("exchange.db");

        let store = Store::open(&path).unwrap();
        store.ping().unwrap();
        assert!(path.exists());

        drop(store);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_out_of_range_timestamp_is_an_error() {
        let store = Store::new_in_memory().unwrap();
        let read_at = |sql: &str| {
            store.read(|conn| conn.query_row(sql, [], |row| millis_column(row, 0)).sql())
        };

        assert_eq!(
            read_at("SELECT 1700000000000").unwrap().timestamp_millis(),
            1_700_000_000_000
        );
        assert!(matches!(
            read_at("SELECT 9223372036854775807"),
            Err(PlaymarketError::Internal(_))
        ));

        let nullable = |sql: &str| {
            store.read(|conn| conn.query_row(sql, [], |row| opt_millis_column(row, 0)).sql())
        };
        assert_eq!(nullable("SELECT NULL").unwrap(), None);
        assert!(matches!(
            nullable("SELECT -9223372036854775807"),
            Err(PlaymarketError::Internal(_))
        ));
    }
}
