//! Exchange services for Playmarket
//!
//! This crate owns the SQLite store and every operation that reads or
//! changes exchange state: sessions and admin roles, markets, balances,
//! positions, trades and resolution.

pub mod config;
pub mod exchange;
pub mod identity;
pub mod ledger;
pub mod market_store;
pub mod position_store;
pub mod profiles;
pub mod resolution_engine;
pub mod retry;
pub mod store;
pub mod trade_engine;

#[cfg(test)]
mod testutil;

pub use config::{ConfigError, PlaymarketConfig};
pub use exchange::Exchange;
pub use identity::{
    Admin, IdentityGate, IdentitySettings, LogNotifier, Session, SignInLink, SignInNotifier,
};
pub use ledger::Ledger;
pub use market_store::MarketStore;
pub use position_store::PositionStore;
pub use profiles::ProfileStore;
pub use resolution_engine::ResolutionEngine;
pub use retry::RetryPolicy;
pub use store::{Store, StoreError};
pub use trade_engine::TradeEngine;
