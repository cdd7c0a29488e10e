//! Resolution Engine
//!
//! Settles a market exactly once. Flipping the market to `resolved`, crediting
//! every holder of the winning side and recording their payouts commit
//! together. A market that is already resolved is rejected before anything is
//! written, so a repeated call never pays twice.

use chrono::Utc;
use playmarket_core::{
    format_cash, MarketOutcome, MarketStatus, Payout, PlaymarketError, PlaymarketResult,
    ResolutionReport,
};
use rusqlite::params;
use tracing::{debug, info, instrument, warn};

use crate::identity::Admin;
use crate::ledger::Ledger;
use crate::market_store::load_market;
use crate::position_store::PositionStore;
use crate::store::{millis_column, to_millis, SqlResultExt, Store};

/// Settles markets and pays out winning positions
pub struct ResolutionEngine {
    store: Store,
    payout_per_share: i64,
}

impl ResolutionEngine {
    /// `payout_per_share` is the credit per winning share, in cents
    pub fn new(store: Store, payout_per_share: i64) -> Self {
        Self {
            store,
            payout_per_share,
        }
    }

    /// Resolve `market_id` to `outcome` and credit the winning side
    #[instrument(skip(self, admin), fields(admin = %admin.email()))]
    pub fn resolve_market(
        &self,
        admin: &Admin,
        market_id: &str,
        outcome: MarketOutcome,
    ) -> PlaymarketResult<ResolutionReport> {
        let payout_per_share = self.payout_per_share;

        let result = self.store.write(|tx| {
            let mut market = load_market(tx, market_id)?;
            if market.status == MarketStatus::Resolved {
                return Err(PlaymarketError::AlreadyResolved);
            }

            tx.execute(
                "UPDATE markets SET status = ?2, outcome = ?3 WHERE id = ?1",
                params![market_id, MarketStatus::Resolved.as_str(), outcome.as_str()],
            )
            .sql()?;
            market.status = MarketStatus::Resolved;
            market.outcome = Some(outcome);

            let now = to_millis(Utc::now());
            let winners = PositionStore::holders(tx, market_id, outcome.winning_side())?;
            let mut total_paid: i64 = 0;

            for position in &winners {
                let amount = position.shares.checked_mul(payout_per_share).ok_or_else(|| {
                    PlaymarketError::internal(format!(
                        "Payout overflow for {} on {}",
                        position.user_id, market_id
                    ))
                })?;

                let balance = Ledger::credit(tx, &position.user_id, amount)?;
                tx.execute(
                    r#"
                    INSERT INTO payouts (market_id, user_id, shares, amount, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                    params![market_id, position.user_id, position.shares, amount, now],
                )
                .sql()?;

                total_paid = total_paid.saturating_add(amount);
                debug!(
                    "Paid {} to {} for {} shares (balance {})",
                    format_cash(amount),
                    position.user_id,
                    position.shares,
                    format_cash(balance)
                );
            }

            Ok(ResolutionReport {
                market,
                winners: winners.len(),
                total_paid,
            })
        });

        match &result {
            Ok(report) => info!(
                "Resolved {} as {}: {} winners paid {}",
                market_id,
                outcome,
                report.winners,
                format_cash(report.total_paid)
            ),
            Err(e) => warn!("Resolution of {} rejected: {}", market_id, e),
        }
        result
    }

    /// Payouts recorded when `market_id` was resolved
    pub fn payouts(&self, market_id: &str) -> PlaymarketResult<Vec<Payout>> {
        self.store.read(|conn| {
            let mut stmt = conn
                .prepare(
                    r#"
                    SELECT market_id, user_id, shares, amount, created_at
                    FROM payouts
                    WHERE market_id = ?1
                    ORDER BY amount DESC, user_id
                    "#,
                )
                .sql()?;
            let rows = stmt
                .query_map(params![market_id], |row| {
                    Ok(Payout {
                        market_id: row.get(0)?,
                        user_id: row.get(1)?,
                        shares: row.get(2)?,
                        amount: row.get(3)?,
                        created_at: millis_column(row, 4)?,
                    })
                })
                .sql()?;
            rows.collect::<rusqlite::Result<Vec<_>>>().sql()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use playmarket_core::{NewMarket, Side};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    fn market(fx: &Fixture) -> playmarket_core::Market {
        fx.exchange
            .markets
            .create_market(
                &fx.admin(),
                NewMarket {
                    title: "Will it snow on Friday?".to_string(),
                    yes_price: 55,
                    no_price: 45,
                    ..Default::default()
                },
            )
            .unwrap()
    }

    #[test]
    fn test_winners_paid_losers_not() {
        let fx = Fixture::new();
        let market = market(&fx);
        let yes_trader = fx.user("yes@example.com");
        let no_trader = fx.user("no@example.com");

        fx.exchange
            .trades
            .place_trade(&yes_trader, &market.id, Side::Yes, 10)
            .unwrap();
        fx.exchange
            .trades
            .place_trade(&no_trader, &market.id, Side::No, 10)
            .unwrap();
        assert_eq!(fx.balance_of(&yes_trader), 450);
        assert_eq!(fx.balance_of(&no_trader), 550);

        let report = fx
            .exchange
            .resolution
            .resolve_market(&fx.admin(), &market.id, MarketOutcome::ResolvedYes)
            .unwrap();
        assert_eq!(report.winners, 1);
        assert_eq!(report.total_paid, 1000);
        assert_eq!(report.market.status, MarketStatus::Resolved);
        assert_eq!(report.market.outcome, Some(MarketOutcome::ResolvedYes));

        assert_eq!(fx.balance_of(&yes_trader), 1450);
        assert_eq!(fx.balance_of(&no_trader), 550);

        let stored = fx.exchange.markets.get_market(&market.id).unwrap();
        assert_eq!(stored.status, MarketStatus::Resolved);
        assert_eq!(stored.outcome, Some(MarketOutcome::ResolvedYes));

        let payouts = fx.exchange.resolution.payouts(&market.id).unwrap();
        assert_eq!(payouts.len(), 1);
        assert_eq!(payouts[0].user_id, yes_trader.user_id);
        assert_eq!(payouts[0].shares, 10);
        assert_eq!(payouts[0].amount, 1000);
    }

    #[test]
    fn test_second_resolution_pays_nothing() {
        let fx = Fixture::new();
        let market = market(&fx);
        let trader = fx.user("yes@example.com");
        fx.exchange
            .trades
            .place_trade(&trader, &market.id, Side::Yes, 10)
            .unwrap();

        let resolution = &fx.exchange.resolution;
        resolution
            .resolve_market(&fx.admin(), &market.id, MarketOutcome::ResolvedYes)
            .unwrap();
        assert_eq!(fx.balance_of(&trader), 1450);

        for outcome in [MarketOutcome::ResolvedYes, MarketOutcome::ResolvedNo] {
            assert_eq!(
                resolution
                    .resolve_market(&fx.admin(), &market.id, outcome)
                    .unwrap_err(),
                PlaymarketError::AlreadyResolved
            );
        }
        assert_eq!(fx.balance_of(&trader), 1450);
        assert_eq!(resolution.payouts(&market.id).unwrap().len(), 1);
        assert_eq!(
            fx.exchange.markets.get_market(&market.id).unwrap().outcome,
            Some(MarketOutcome::ResolvedYes)
        );
    }

    #[test]
    fn test_resolved_market_rejects_trades_and_toggles() {
        let fx = Fixture::new();
        let admin = fx.admin();
        let market = market(&fx);
        let trader = fx.user("late@example.com");

        fx.exchange
            .resolution
            .resolve_market(&admin, &market.id, MarketOutcome::ResolvedNo)
            .unwrap();

        assert_eq!(
            fx.exchange
                .trades
                .place_trade(&trader, &market.id, Side::No, 1)
                .unwrap_err(),
            PlaymarketError::MarketClosed
        );
        assert_eq!(
            fx.exchange
                .markets
                .set_status(&admin, &market.id, MarketStatus::Open)
                .unwrap_err(),
            PlaymarketError::AlreadyResolved
        );
        assert_eq!(fx.balance_of(&trader), 1000);
    }

    #[test]
    fn test_resolve_closed_market_and_missing_market() {
        let fx = Fixture::new();
        let admin = fx.admin();
        let market = market(&fx);
        let trader = fx.user("no@example.com");
        fx.exchange
            .trades
            .place_trade(&trader, &market.id, Side::No, 2)
            .unwrap();
        fx.exchange
            .markets
            .set_status(&admin, &market.id, MarketStatus::Closed)
            .unwrap();

        let report = fx
            .exchange
            .resolution
            .resolve_market(&admin, &market.id, MarketOutcome::ResolvedNo)
            .unwrap();
        assert_eq!(report.total_paid, 200);
        assert_eq!(fx.balance_of(&trader), 1000 - 90 + 200);

        assert!(matches!(
            fx.exchange
                .resolution
                .resolve_market(&admin, "missing", MarketOutcome::ResolvedNo),
            Err(PlaymarketError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolution_with_no_positions() {
        let fx = Fixture::new();
        let market = market(&fx);

        let report = fx
            .exchange
            .resolution
            .resolve_market(&fx.admin(), &market.id, MarketOutcome::ResolvedNo)
            .unwrap();
        assert_eq!(report.winners, 0);
        assert_eq!(report.total_paid, 0);
        assert!(fx.exchange.resolution.payouts(&market.id).unwrap().is_empty());
    }

    #[test]
    fn test_every_winner_paid_at_configured_rate() {
        let fx = Fixture::with_payout(150);
        let market = market(&fx);
        let big = fx.user("big@example.com");
        let small = fx.user("small@example.com");
        let loser = fx.user("loser@example.com");
        let trades = &fx.exchange.trades;

        trades.place_trade(&big, &market.id, Side::Yes, 2).unwrap();
        trades.place_trade(&big, &market.id, Side::Yes, 3).unwrap();
        trades.place_trade(&small, &market.id, Side::Yes, 1).unwrap();
        trades.place_trade(&loser, &market.id, Side::No, 4).unwrap();

        let report = fx
            .exchange
            .resolution
            .resolve_market(&fx.admin(), &market.id, MarketOutcome::ResolvedYes)
            .unwrap();
        assert_eq!(report.winners, 2);
        assert_eq!(report.total_paid, (5 + 1) * 150);

        assert_eq!(fx.balance_of(&big), 1000 - 5 * 55 + 5 * 150);
        assert_eq!(fx.balance_of(&small), 1000 - 55 + 150);
        assert_eq!(fx.balance_of(&loser), 1000 - 4 * 45);

        let payouts = fx.exchange.resolution.payouts(&market.id).unwrap();
        let paid: Vec<_> = payouts
            .iter()
            .map(|p| (p.user_id.as_str(), p.shares, p.amount))
            .collect();
        assert_eq!(
            paid,
            vec![
                (big.user_id.as_str(), 5, 750),
                (small.user_id.as_str(), 1, 150),
            ]
        );
        assert_eq!(payouts.iter().map(|p| p.amount).sum::<i64>(), report.total_paid);
    }

    #[test]
    fn test_trades_racing_resolution_are_paid_or_rejected() {
        const TRADERS: usize = 8;
        const ATTEMPTS: usize = 20;

        let fx = Fixture::new();
        let admin = fx.admin();
        let market = market(&fx);
        let traders: Vec<_> = (0..TRADERS)
            .map(|i| fx.user(&format!("racer{}@example.com", i)))
            .collect();

        let start = Barrier::new(TRADERS + 1);
        let placed = AtomicUsize::new(0);
        let finished = AtomicUsize::new(0);

        let (report, results) = thread::scope(|scope| {
            let handles: Vec<_> = traders
                .iter()
                .map(|trader| {
                    let (fx, market, start, placed, finished) =
                        (&fx, &market, &start, &placed, &finished);
                    scope.spawn(move || {
                        start.wait();
                        let mut filled: i64 = 0;
                        let mut errors = Vec::new();
                        for _ in 0..ATTEMPTS {
                            match fx.exchange.trades.place_trade(trader, &market.id, Side::Yes, 1) {
                                Ok(_) => {
                                    filled += 1;
                                    placed.fetch_add(1, Ordering::SeqCst);
                                }
                                Err(e) => {
                                    let stop = matches!(
                                        e,
                                        PlaymarketError::MarketClosed
                                            | PlaymarketError::InsufficientFunds { .. }
                                    );
                                    errors.push(e);
                                    if stop {
                                        break;
                                    }
                                }
                            }
                        }
                        finished.fetch_add(1, Ordering::SeqCst);
                        (filled, errors)
                    })
                })
                .collect();

            start.wait();
            while placed.load(Ordering::SeqCst) < TRADERS && finished.load(Ordering::SeqCst) < TRADERS
            {
                thread::yield_now();
            }
            let report = fx
                .exchange
                .resolution
                .resolve_market(&admin, &market.id, MarketOutcome::ResolvedYes)
                .unwrap();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            (report, results)
        });

        let mut expected_total = 0;
        let mut expected_winners: usize = 0;
        for (trader, (filled, errors)) in traders.iter().zip(&results) {
            for e in errors {
                assert!(
                    matches!(
                        e,
                        PlaymarketError::MarketClosed | PlaymarketError::InsufficientFunds { .. }
                    ),
                    "unexpected trade error: {:?}",
                    e
                );
            }

            let shares = fx
                .exchange
                .positions
                .shares_held(trader, &market.id, Side::Yes)
                .unwrap();
            assert_eq!(shares, *filled);
            assert_eq!(fx.balance_of(trader), 1000 - shares * 55 + shares * 100);

            expected_total += shares * 100;
            if shares > 0 {
                expected_winners += 1;
            }
        }

        assert_eq!(report.total_paid, expected_total);
        assert_eq!(report.winners, expected_winners);
        assert_eq!(
            fx.exchange.resolution.payouts(&market.id).unwrap().len(),
            expected_winners
        );
    }
}
