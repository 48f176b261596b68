//! # Balance Management
//!
//! A [`BalanceSheet`] maps every known [`Address`] to its plaintext balance
//! and enforces that you can never spend more than you have. It is the
//! bookkeeping underneath [`super::InMemoryLedger`]; it knows nothing about
//! projects or locks.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Address;
use crate::transfer::Amount;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during balance operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    /// Attempted to debit more than the available balance.
    #[error("insufficient balance: available {available}, requested {requested} (account {account})")]
    InsufficientBalance {
        /// The account that was being debited.
        account: Address,
        /// The current balance.
        available: Amount,
        /// The amount that was requested.
        requested: Amount,
    },

    /// Arithmetic overflow during a credit operation.
    ///
    /// `u128` overflow means either a bug or an attack; either way the
    /// credit is refused.
    #[error("balance overflow: current {current}, credit {credit} (account {account})")]
    Overflow {
        /// The account that was being credited.
        account: Address,
        /// The current balance before the failed credit.
        current: Amount,
        /// The amount that caused the overflow.
        credit: Amount,
    },
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

/// A single account balance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Balance {
    /// Balance in smallest units.
    pub amount: Amount,

    /// Timestamp of the last balance-modifying operation.
    pub last_updated: DateTime<Utc>,
}

impl Balance {
    /// Creates a zero balance.
    pub fn new() -> Self {
        Self::with_amount(0)
    }

    /// Creates a balance with an explicit initial amount.
    pub fn with_amount(amount: Amount) -> Self {
        Self {
            amount,
            last_updated: Utc::now(),
        }
    }

    /// Returns `true` if this balance is zero.
    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// BalanceSheet
// ---------------------------------------------------------------------------

/// Balances for every account the ledger has seen.
///
/// Not `Sync` by itself; [`super::InMemoryLedger`] wraps it in a lock.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BalanceSheet {
    balances: HashMap<Address, Balance>,
}

impl BalanceSheet {
    /// Creates an empty balance sheet.
    pub fn new() -> Self {
        Self {
            balances: HashMap::new(),
        }
    }

    /// Rebuilds a sheet from plain `(address, amount)` pairs.
    pub fn from_amounts(amounts: impl IntoIterator<Item = (Address, Amount)>) -> Self {
        Self {
            balances: amounts
                .into_iter()
                .map(|(account, amount)| (account, Balance::with_amount(amount)))
                .collect(),
        }
    }

    /// Credits (adds) funds to an account, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`BalanceError::Overflow`] if the credit would exceed `u128::MAX`.
    pub fn credit(&mut self, account: Address, amount: Amount) -> Result<Amount, BalanceError> {
        let balance = self.balances.entry(account).or_default();

        let new_amount = balance
            .amount
            .checked_add(amount)
            .ok_or(BalanceError::Overflow {
                account,
                current: balance.amount,
                credit: amount,
            })?;

        balance.amount = new_amount;
        balance.last_updated = Utc::now();

        Ok(new_amount)
    }

    /// Debits (subtracts) funds from an account.
    ///
    /// # Errors
    ///
    /// Returns [`BalanceError::InsufficientBalance`] if the debit exceeds
    /// the current balance. Unknown accounts hold zero.
    pub fn debit(&mut self, account: Address, amount: Amount) -> Result<Amount, BalanceError> {
        let available = self.get_balance(&account);
        if available < amount {
            return Err(BalanceError::InsufficientBalance {
                account,
                available,
                requested: amount,
            });
        }

        let balance = self.balances.entry(account).or_default();
        balance.amount -= amount;
        balance.last_updated = Utc::now();

        Ok(balance.amount)
    }

    /// Checks that `amount` could be credited to `account` without
    /// overflowing, without changing anything.
    pub fn can_credit(&self, account: &Address, amount: Amount) -> bool {
        self.get_balance(account).checked_add(amount).is_some()
    }

    /// Returns the balance of an account; zero if never seen.
    pub fn get_balance(&self, account: &Address) -> Amount {
        self.balances.get(account).map(|b| b.amount).unwrap_or(0)
    }

    /// All non-zero balances, sorted by address.
    pub fn non_zero_balances(&self) -> BTreeMap<Address, Amount> {
        self.balances
            .iter()
            .filter(|(_, b)| !b.is_zero())
            .map(|(account, b)| (*account, b.amount))
            .collect()
    }

    /// Sum of every balance on the sheet. `None` on overflow.
    pub fn total_supply(&self) -> Option<Amount> {
        self.balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(b.amount))
    }

    /// Number of accounts on the sheet (including zero balances).
    pub fn account_count(&self) -> usize {
        self.balances.len()
    }

    /// Returns `true` if this balance sheet has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
