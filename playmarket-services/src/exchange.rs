//! Wiring for every exchange service over one shared store

use std::sync::Arc;
use tracing::info;

use crate::config::PlaymarketConfig;
use crate::identity::{IdentityGate, IdentitySettings, SignInNotifier};
use crate::ledger::Ledger;
use crate::market_store::MarketStore;
use crate::position_store::PositionStore;
use crate::profiles::ProfileStore;
use crate::resolution_engine::ResolutionEngine;
use crate::retry::RetryPolicy;
use crate::store::Store;
use crate::trade_engine::TradeEngine;

/// All services of one exchange, sharing a [`Store`]
pub struct Exchange {
    pub store: Store,
    pub identity: IdentityGate,
    pub profiles: ProfileStore,
    pub markets: MarketStore,
    pub ledger: Ledger,
    pub positions: PositionStore,
    pub trades: TradeEngine,
    pub resolution: ResolutionEngine,
    pub retry: RetryPolicy,
}

impl Exchange {
    pub fn new(
        store: Store,
        config: &PlaymarketConfig,
        notifier: Arc<dyn SignInNotifier>,
    ) -> Self {
        let settings = IdentitySettings {
            app_base_url: config.app_base_url.clone(),
            session_ttl: config.session_ttl(),
            link_ttl: config.sign_in_link_ttl(),
            starting_balance_cents: config.starting_balance_cents,
        };

        info!(
            "Exchange ready (starting balance {}¢, payout {}¢/share)",
            config.starting_balance_cents, config.payout_per_share_cents
        );

        Self {
            identity: IdentityGate::new(store.clone(), settings, notifier),
            profiles: ProfileStore::new(store.clone()),
            markets: MarketStore::new(store.clone()),
            ledger: Ledger::new(store.clone()),
            positions: PositionStore::new(store.clone()),
            trades: TradeEngine::new(store.clone()),
            resolution: ResolutionEngine::new(store.clone(), config.payout_per_share_cents),
            retry: RetryPolicy::from_config(config),
            store,
        }
    }
}
