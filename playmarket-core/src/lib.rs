//! Core types for Playmarket
//!
//! This crate defines the shared data structures used across the exchange,
//! including markets, trades, balances, positions, profiles and the error
//! taxonomy every operation reports through.

pub mod error;
pub mod format;
pub mod market;
pub mod position;
pub mod profile;

pub use error::{PlaymarketError, PlaymarketResult};
pub use format::{format_cash, format_price, to_dollars};
pub use market::{
    Market, MarketFilter, MarketOutcome, MarketStatus, NewMarket, Side, MAX_PRICE_CENTS,
    MIN_PRICE_CENTS,
};
pub use position::{
    Balance, Holding, Payout, Position, ResolutionReport, Trade, TradeReceipt, TradeWithMarket,
};
pub use profile::{normalize_email, normalize_username, Identity, Profile, MAX_USERNAME_LEN};
