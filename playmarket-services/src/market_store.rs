//! Market Store
//!
//! Public reads plus the admin-only writes: creation and the open/closed
//! toggle. Moving a market to `resolved` is not possible here; only the
//! resolution engine does that.

use chrono::Utc;
use playmarket_core::{
    format_price, Market, MarketFilter, MarketStatus, NewMarket, PlaymarketError, PlaymarketResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::identity::Admin;
use crate::store::{
    millis_column, opt_millis_column, parse_column, to_millis, SqlResultExt, Store,
};

/// Column list matching [`market_from_row`]
pub(crate) const MARKET_COLUMNS: &str =
    "m.id, m.title, m.description, m.category, m.closes_at, m.status, m.outcome, m.yes_price, m.no_price, m.created_at";

/// Number of columns in [`MARKET_COLUMNS`]
pub(crate) const MARKET_COLUMN_COUNT: usize = 10;

/// Durable market records
pub struct MarketStore {
    store: Store,
}

impl MarketStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// List markets, newest first
    pub fn list_markets(&self, filter: &MarketFilter) -> PlaymarketResult<Vec<Market>> {
        let category = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"));
        let status = filter.status.map(|s| s.as_str());

        let markets = self.store.read(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    r#"
                    SELECT {MARKET_COLUMNS}
                    FROM markets m
                    WHERE (?1 IS NULL OR m.status = ?1)
                      AND (?2 IS NULL OR m.category = ?2)
                    ORDER BY m.created_at DESC, m.rowid DESC
                    "#
                ))
                .sql()?;

            let rows = stmt
                .query_map(params![status, category], |row| market_from_row(row, 0))
                .sql()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().sql()
        })?;

        debug!("Listed {} markets with {:?}", markets.len(), filter);
        Ok(markets)
    }

    /// Distinct non-empty categories, alphabetical
    pub fn categories(&self) -> PlaymarketResult<Vec<String>> {
        self.store.read(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT DISTINCT category FROM markets WHERE category IS NOT NULL ORDER BY category",
                )
                .sql()?;
            let rows = stmt.query_map([], |row| row.get(0)).sql()?;
            rows.collect::<rusqlite::Result<Vec<String>>>().sql()
        })
    }

    /// Get a single market by ID
    pub fn get_market(&self, market_id: &str) -> PlaymarketResult<Market> {
        self.store.read(|conn| load_market(conn, market_id))
    }

    /// Create a new open market
    #[instrument(skip(self, admin, input), fields(admin = %admin.email()))]
    pub fn create_market(&self, admin: &Admin, input: NewMarket) -> PlaymarketResult<Market> {
        let input = input.validated()?;
        let market = Market {
            id: Uuid::new_v4().to_string(),
            title: input.title,
            description: input.description,
            category: input.category,
            closes_at: input.closes_at,
            status: MarketStatus::Open,
            outcome: None,
            yes_price: input.yes_price,
            no_price: input.no_price,
            created_at: Utc::now(),
        };

        self.store.write(|tx| {
            tx.execute(
                r#"
                INSERT INTO markets
                    (id, title, description, category, closes_at, status, outcome, yes_price, no_price, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9)
                "#,
                params![
                    market.id,
                    market.title,
                    market.description,
                    market.category,
                    market.closes_at.map(to_millis),
                    market.status.as_str(),
                    market.yes_price,
                    market.no_price,
                    to_millis(market.created_at),
                ],
            )
            .sql()?;
            Ok(())
        })?;

        info!(
            "Created market {} '{}' (YES {}, NO {})",
            market.id,
            market.title,
            format_price(market.yes_price),
            format_price(market.no_price)
        );
        Ok(market)
    }

    /// Toggle a market between open and closed
    #[instrument(skip(self, admin), fields(admin = %admin.email()))]
    pub fn set_status(
        &self,
        admin: &Admin,
        market_id: &str,
        status: MarketStatus,
    ) -> PlaymarketResult<Market> {
        if status == MarketStatus::Resolved {
            return Err(PlaymarketError::invalid(
                "Markets can only be resolved through resolve_market",
            ));
        }

        let market = self.store.write(|tx| {
            let mut market = load_market(tx, market_id)?;
            if market.status == MarketStatus::Resolved {
                return Err(PlaymarketError::AlreadyResolved);
            }

            tx.execute(
                "UPDATE markets SET status = ?2 WHERE id = ?1",
                params![market_id, status.as_str()],
            )
            .sql()?;
            market.status = status;
            Ok(market)
        });

        match &market {
            Ok(market) => info!("Market {} is now {}", market.id, market.status),
            Err(e) => warn!("Status change on {} rejected: {}", market_id, e),
        }
        market
    }
}

/// Load a market inside an existing connection or transaction
pub(crate) fn load_market(conn: &Connection, market_id: &str) -> PlaymarketResult<Market> {
    conn.query_row(
        &format!("SELECT {MARKET_COLUMNS} FROM markets m WHERE m.id = ?1"),
        params![market_id],
        |row| market_from_row(row, 0),
    )
    .optional()
    .sql()?
    .ok_or_else(|| PlaymarketError::not_found(format!("Market {}", market_id)))
}

/// Build a market from [`MARKET_COLUMNS`] starting at column `offset`
pub(crate) fn market_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Market> {
    let outcome: Option<String> = row.get(offset + 6)?;
    let outcome = match outcome {
        Some(_) => Some(parse_column(row, offset + 6)?),
        None => None,
    };

    Ok(Market {
        id: row.get(offset)?,
        title: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        category: row.get(offset + 3)?,
        closes_at: opt_millis_column(row, offset + 4)?,
        status: parse_column(row, offset + 5)?,
        outcome,
        yes_price: row.get(offset + 7)?,
        no_price: row.get(offset + 8)?,
        created_at: millis_column(row, offset + 9)?,
    })
}
