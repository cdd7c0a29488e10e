//! Play-cash ledger
//!
//! Balances are read freely, but only change through `debit` and `credit`,
//! which take an open write transaction. The trade and resolution engines are
//! their only callers, so both paths share the same transaction discipline.

use playmarket_core::{Balance, Identity, PlaymarketError, PlaymarketResult};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::store::{SqlResultExt, Store};

/// Per-user play-cash balances
pub struct Ledger {
    store: Store,
}

impl Ledger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Balance of the calling user
    pub fn get_balance(&self, identity: &Identity) -> PlaymarketResult<Balance> {
        let amount = self
            .store
            .read(|conn| balance_of(conn, &identity.user_id))?;
        debug!("Balance for {}: {}", identity.user_id, amount);

        Ok(Balance {
            user_id: identity.user_id.clone(),
            play_cash_balance: amount,
        })
    }

    /// Create the account row with its opening balance
    pub(crate) fn open_account(
        conn: &Connection,
        user_id: &str,
        opening_balance: i64,
    ) -> PlaymarketResult<()> {
        conn.execute(
            "INSERT INTO balances (user_id, play_cash_balance) VALUES (?1, ?2)",
            params![user_id, opening_balance],
        )
        .sql()?;
        Ok(())
    }

    /// Remove `amount` from a balance, refusing to go below zero.
    ///
    /// Returns the balance after the debit.
    pub(crate) fn debit(conn: &Connection, user_id: &str, amount: i64) -> PlaymarketResult<i64> {
        let available = balance_of(conn, user_id)?;
        if available < amount {
            return Err(PlaymarketError::InsufficientFunds {
                required: amount,
                available,
            });
        }

        let remaining = available - amount;
        conn.execute(
            "UPDATE balances SET play_cash_balance = ?2 WHERE user_id = ?1",
            params![user_id, remaining],
        )
        .sql()?;
        Ok(remaining)
    }

    /// Add `amount` to a balance. Returns the balance after the credit.
    pub(crate) fn credit(conn: &Connection, user_id: &str, amount: i64) -> PlaymarketResult<i64> {
        let current = balance_of(conn, user_id)?;
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| PlaymarketError::internal(format!("Balance overflow for {}", user_id)))?;

        conn.execute(
            "UPDATE balances SET play_cash_balance = ?2 WHERE user_id = ?1",
            params![user_id, updated],
        )
        .sql()?;
        Ok(updated)
    }
}

fn balance_of(conn: &Connection, user_id: &str) -> PlaymarketResult<i64> {
    conn.query_row(
        "SELECT play_cash_balance FROM balances WHERE user_id = ?1",
        params![user_id],
        |row| row.get(0),
    )
    .optional()
    .sql()?
    .ok_or_else(|| PlaymarketError::not_found(format!("Balance for user {}", user_id)))
}
