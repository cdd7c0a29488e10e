//! Trades, balances and position tracking structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::market::{Market, Side};

/// An executed purchase of shares. Never edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub user_id: String,
    pub market_id: String,
    pub side: Side,
    pub shares: i64,
    /// Market price for `side` at the moment of execution, in cents
    pub price_per_share: i64,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    /// Total play cash debited for this trade
    pub fn cost(&self) -> i64 {
        self.shares * self.price_per_share
    }
}

/// A trade together with the market it was placed on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeWithMarket {
    #[serde(flatten)]
    pub trade: Trade,
    pub market: Market,
}

/// Result of a successful `place_trade`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub trade: Trade,
    /// Caller's balance after the debit
    pub balance: i64,
}

/// Play-cash account of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: String,
    /// Available balance in cents, never negative
    pub play_cash_balance: i64,
}

/// Shares held by one user on one side of one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub user_id: String,
    pub market_id: String,
    pub side: Side,
    pub shares: i64,
}

/// Both sides of a user's exposure to one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub market_id: String,
    pub title: String,
    pub yes_shares: i64,
    pub no_shares: i64,
}

impl Holding {
    pub fn new(market_id: String, title: String) -> Self {
        Self {
            market_id,
            title,
            yes_shares: 0,
            no_shares: 0,
        }
    }

    pub fn add(&mut self, side: Side, shares: i64) {
        match side {
            Side::Yes => self.yes_shares += shares,
            Side::No => self.no_shares += shares,
        }
    }
}

/// Credit paid to one winning position when a market resolves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub market_id: String,
    pub user_id: String,
    pub shares: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Summary of a completed resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionReport {
    pub market: Market,
    /// Number of users credited
    pub winners: usize,
    /// Sum of all credits in cents
    pub total_paid: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_cost() {
        let trade = Trade {
            id: "t1".to_string(),
            user_id: "u1".to_string(),
            market_id: "m1".to_string(),
            side: Side::Yes,
            shares: 10,
            price_per_share: 55,
            created_at: Utc::now(),
        };
        assert_eq!(trade.cost(), 550);
    }

    #[test]
    fn test_holding_accumulates_by_side() {
        let mut holding = Holding::new("m1".to_string(), "Rain?".to_string());
        holding.add(Side::Yes, 10);
        holding.add(Side::No, 3);
        holding.add(Side::Yes, 5);
        assert_eq!(holding.yes_shares, 15);
        assert_eq!(holding.no_shares, 3);
    }
}
