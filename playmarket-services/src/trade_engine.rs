//! Trade Engine
//!
//! `place_trade` buys shares at the market's current fixed price. The market
//! check, price capture, balance check, debit, trade insert and position update
//! all happen in one write transaction: either every effect commits or none
//! does, and concurrent trades are serialized against each other and against
//! resolution.

use chrono::Utc;
use playmarket_core::{
    format_cash, format_price, Identity, PlaymarketError, PlaymarketResult, Side, Trade,
    TradeReceipt, TradeWithMarket,
};
use rusqlite::params;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::ledger::Ledger;
use crate::market_store::{load_market, market_from_row, MARKET_COLUMNS, MARKET_COLUMN_COUNT};
use crate::position_store::PositionStore;
use crate::store::{millis_column, parse_column, to_millis, SqlResultExt, Store};

/// Executes trades and serves trade history
pub struct TradeEngine {
    store: Store,
}

impl TradeEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Buy `shares` of `side` in `market_id` for the caller
    #[instrument(skip(self, identity), fields(user = %identity.user_id))]
    pub fn place_trade(
        &self,
        identity: &Identity,
        market_id: &str,
        side: Side,
        shares: i64,
    ) -> PlaymarketResult<TradeReceipt> {
        if shares <= 0 {
            return Err(PlaymarketError::invalid(format!(
                "Shares must be a positive integer, got {}",
                shares
            )));
        }

        let result = self.store.write(|tx| {
            let now = Utc::now();
            let market = load_market(tx, market_id)?;
            if !market.is_tradeable(now) {
                return Err(PlaymarketError::MarketClosed);
            }

            let price_per_share = market.price_for(side);
            let total_cost = price_per_share.checked_mul(shares).ok_or_else(|| {
                PlaymarketError::invalid(format!("Order of {} shares is too large", shares))
            })?;

            let balance = Ledger::debit(tx, &identity.user_id, total_cost)?;

            let trade = Trade {
                id: Uuid::new_v4().to_string(),
                user_id: identity.user_id.clone(),
                market_id: market.id.clone(),
                side,
                shares,
                price_per_share,
                created_at: now,
            };
            tx.execute(
                r#"
                INSERT INTO trades (id, user_id, market_id, side, shares, price_per_share, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    trade.id,
                    trade.user_id,
                    trade.market_id,
                    trade.side.as_str(),
                    trade.shares,
                    trade.price_per_share,
                    to_millis(trade.created_at),
                ],
            )
            .sql()?;

            PositionStore::add_shares(tx, &trade.user_id, &trade.market_id, side, shares)?;

            Ok(TradeReceipt { trade, balance })
        });

        match &result {
            Ok(receipt) => info!(
                "Trade {}: {} {} x{} @ {} = {}, balance now {}",
                receipt.trade.id,
                receipt.trade.market_id,
                side,
                shares,
                format_price(receipt.trade.price_per_share),
                format_cash(receipt.trade.cost()),
                format_cash(receipt.balance)
            ),
            Err(e) => warn!("Trade on {} rejected: {}", market_id, e),
        }
        result
    }

    /// The caller's trades joined with their markets, newest first
    pub fn trade_history(&self, identity: &Identity) -> PlaymarketResult<Vec<TradeWithMarket>> {
        self.store.read(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    r#"
                    SELECT {MARKET_COLUMNS},
                           t.id, t.user_id, t.market_id, t.side, t.shares, t.price_per_share, t.created_at
                    FROM trades t
                    JOIN markets m ON m.id = t.market_id
                    WHERE t.user_id = ?1
                    ORDER BY t.created_at DESC, t.rowid DESC
                    "#
                ))
                .sql()?;

            let rows = stmt
                .query_map(params![identity.user_id], |row| {
                    let market = market_from_row(row, 0)?;
                    let t = MARKET_COLUMN_COUNT;
                    let trade = Trade {
                        id: row.get(t)?,
                        user_id: row.get(t + 1)?,
                        market_id: row.get(t + 2)?,
                        side: parse_column(row, t + 3)?,
                        shares: row.get(t + 4)?,
                        price_per_share: row.get(t + 5)?,
                        created_at: millis_column(row, t + 6)?,
                    };
                    Ok(TradeWithMarket { trade, market })
                })
                .sql()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().sql()
        })
    }
}
