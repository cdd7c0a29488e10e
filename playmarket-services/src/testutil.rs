//! Shared fixture for service tests

use playmarket_core::Identity;
use std::sync::Arc;

use crate::config::PlaymarketConfig;
use crate::exchange::Exchange;
use crate::identity::tests::CapturingNotifier;
use crate::identity::Admin;
use crate::store::Store;

pub(crate) const ADMIN_EMAIL: &str = "admin@example.com";

/// In-memory exchange with a 1000¢ starting balance and one admin
pub(crate) struct Fixture {
    pub(crate) exchange: Arc<Exchange>,
    notifier: Arc<CapturingNotifier>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::with_payout(PlaymarketConfig::default().payout_per_share_cents)
    }

    /// Same exchange, crediting `payout_per_share_cents` per winning share
    pub(crate) fn with_payout(payout_per_share_cents: i64) -> Self {
        let config = PlaymarketConfig {
            starting_balance_cents: 1000,
            payout_per_share_cents,
            admin_emails: vec![ADMIN_EMAIL.to_string()],
            ..Default::default()
        };
        let notifier = Arc::new(CapturingNotifier::default());
        let store = Store::new_in_memory().unwrap();
        let exchange = Exchange::new(store, &config, notifier.clone());
        exchange.identity.sync_admin_roles(&config.admin_emails).unwrap();

        Self {
            exchange: Arc::new(exchange),
            notifier,
        }
    }

    /// Sign `email` in through a link and return its identity
    pub(crate) fn user(&self, email: &str) -> Identity {
        let identity = &self.exchange.identity;
        identity.request_sign_in(email).unwrap();
        let link = self.notifier.last.lock().take().unwrap();
        let token = link.url.split("token=").nth(1).unwrap();
        let session = identity.complete_sign_in(token).unwrap();
        identity
            .authenticate(Some(&format!("Bearer {}", session.access_token)))
            .unwrap()
    }

    pub(crate) fn admin(&self) -> Admin {
        let identity = self.user(ADMIN_EMAIL);
        self.exchange.identity.require_admin(&identity).unwrap()
    }

    pub(crate) fn balance_of(&self, identity: &Identity) -> i64 {
        self.exchange
            .ledger
            .get_balance(identity)
            .unwrap()
            .play_cash_balance
    }
}
