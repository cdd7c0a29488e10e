//! Position Store
//!
//! Materialized share counts per user, market and side. Rows are only written
//! by the trade engine, inside the same transaction that records the trade.

use playmarket_core::{Holding, Identity, PlaymarketResult, Position, Side};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use tracing::debug;

use crate::store::{parse_column, SqlResultExt, Store};

/// Per-user holdings
pub struct PositionStore {
    store: Store,
}

impl PositionStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Shares the caller holds of `side` in `market_id` (zero if none)
    pub fn shares_held(
        &self,
        identity: &Identity,
        market_id: &str,
        side: Side,
    ) -> PlaymarketResult<i64> {
        self.store.read(|conn| {
            conn.query_row(
                "SELECT shares FROM positions WHERE user_id = ?1 AND market_id = ?2 AND side = ?3",
                params![identity.user_id, market_id, side.as_str()],
                |row| row.get(0),
            )
            .optional()
            .sql()
            .map(|shares| shares.unwrap_or(0))
        })
    }

    /// The caller's holdings grouped by market, newest market first
    pub fn holdings(&self, identity: &Identity) -> PlaymarketResult<Vec<Holding>> {
        let rows: Vec<(String, String, Side, i64)> = self.store.read(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT p.market_id, m.title, p.side, p.shares
                    FROM positions p
                    JOIN markets m ON m.id = p.market_id
                    WHERE p.user_id = ?1 AND p.shares > 0
                    ORDER BY m.created_at DESC, m.rowid DESC, p.side
                    "#,
                )
                .sql()?;
            let rows = stmt
                .query_map(params![identity.user_id], |row| {
                    Ok((row.get(0)?, row.get(1)?, parse_column(row, 2)?, row.get(3)?))
                })
                .sql()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().sql()
        })?;

        let mut order: Vec<String> = Vec::new();
        let mut by_market: HashMap<String, Holding> = HashMap::new();
        for (market_id, title, side, shares) in rows {
            let holding = by_market.entry(market_id.clone()).or_insert_with(|| {
                order.push(market_id.clone());
                Holding::new(market_id, title)
            });
            holding.add(side, shares);
        }

        debug!("{} holdings for {}", order.len(), identity.user_id);
        Ok(order
            .into_iter()
            .filter_map(|market_id| by_market.remove(&market_id))
            .collect())
    }

    /// Increase a position, creating it on first purchase
    pub(crate) fn add_shares(
        conn: &Connection,
        user_id: &str,
        market_id: &str,
        side: Side,
        shares: i64,
    ) -> PlaymarketResult<()> {
        conn.execute(
            r#"
            INSERT INTO positions (user_id, market_id, side, shares)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (user_id, market_id, side)
            DO UPDATE SET shares = shares + excluded.shares
            "#,
            params![user_id, market_id, side.as_str(), shares],
        )
        .sql()?;
        Ok(())
    }

    /// Every non-empty position on one side of a market
    pub(crate) fn holders(
        conn: &Connection,
        market_id: &str,
        side: Side,
    ) -> PlaymarketResult<Vec<Position>> {
        let mut stmt = conn
            .prepare(
                r#"
                SELECT user_id, shares
                FROM positions
                WHERE market_id = ?1 AND side = ?2 AND shares > 0
                ORDER BY user_id
                "#,
            )
            .sql()?;
        let rows = stmt
            .query_map(params![market_id, side.as_str()], |row| {
                Ok(Position {
                    user_id: row.get(0)?,
                    market_id: market_id.to_string(),
                    side,
                    shares: row.get(1)?,
                })
            })
            .sql()?;
        rows.collect::<rusqlite::Result<Vec<_>>>().sql()
    }
}
