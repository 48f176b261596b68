//! # In-Memory Ledger
//!
//! The reference execution environment for FundHub. It owns every account
//! balance, executes transfers atomically under a single lock, and keeps an
//! append-only journal of receipts so that tests and operators can audit
//! exactly which transfers happened (e.g. "the beneficiary was paid once").
//!
//! Project escrow accounts are ordinary accounts here: a project's pooled
//! funds are simply the balance at the project's address.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use super::balance::{BalanceError, BalanceSheet};
use crate::identity::Address;
use crate::transfer::{Amount, Clock, TransferError, TransferReceipt, ValueTransfer};

/// Serializable state of an [`InMemoryLedger`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Non-zero balances keyed by account.
    pub balances: BTreeMap<Address, Amount>,
    /// Every executed transfer, oldest first.
    pub journal: Vec<TransferReceipt>,
}

/// Thread-safe balances plus a transfer journal.
pub struct InMemoryLedger {
    accounts: Mutex<BalanceSheet>,
    journal: RwLock<Vec<TransferReceipt>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    /// Creates an empty ledger that timestamps receipts with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: Mutex::new(BalanceSheet::new()),
            journal: RwLock::new(Vec::new()),
            clock,
        }
    }

    /// Rebuilds a ledger from a snapshot.
    pub fn restore(snapshot: LedgerSnapshot, clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: Mutex::new(BalanceSheet::from_amounts(snapshot.balances)),
            journal: RwLock::new(snapshot.journal),
            clock,
        }
    }

    /// Creates value out of thin air. Devnet faucet and test setup only;
    /// mints are not journaled because they are not transfers.
    ///
    /// # Errors
    ///
    /// [`TransferError::ZeroAmount`] or [`TransferError::Overflow`].
    pub fn mint(&self, account: &Address, amount: Amount) -> Result<Amount, TransferError> {
        if amount == 0 {
            return Err(TransferError::ZeroAmount);
        }
        let new_balance = self
            .accounts
            .lock()
            .credit(*account, amount)
            .map_err(TransferError::from)?;
        tracing::debug!(account = %account, amount = %amount, "minted");
        Ok(new_balance)
    }

    /// Copy of the full transfer journal, oldest first.
    pub fn journal(&self) -> Vec<TransferReceipt> {
        self.journal.read().clone()
    }

    /// Receipts where `account` was debited or credited.
    pub fn receipts_for(&self, account: &Address) -> Vec<TransferReceipt> {
        self.journal
            .read()
            .iter()
            .filter(|r| r.from == *account || r.to == *account)
            .cloned()
            .collect()
    }

    /// Sum of all balances. Transfers never change it; only mints do.
    pub fn total_supply(&self) -> Amount {
        self.accounts.lock().total_supply().unwrap_or(Amount::MAX)
    }

    /// Consistent snapshot of balances and journal.
    pub fn snapshot(&self) -> LedgerSnapshot {
        // Hold the balance lock while copying the journal so the two agree.
        let accounts = self.accounts.lock();
        LedgerSnapshot {
            balances: accounts.non_zero_balances(),
            journal: self.journal.read().clone(),
        }
    }
}

impl ValueTransfer for InMemoryLedger {
    fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<TransferReceipt, TransferError> {
        if amount == 0 {
            return Err(TransferError::ZeroAmount);
        }
        if from == to {
            return Err(TransferError::SelfTransfer(*from));
        }

        let mut accounts = self.accounts.lock();
        if !accounts.can_credit(to, amount) {
            return Err(TransferError::Overflow { account: *to });
        }
        accounts.debit(*from, amount)?;
        accounts.credit(*to, amount)?;

        let receipt = TransferReceipt::new(*from, *to, amount, self.clock.now());
        self.journal.write().push(receipt.clone());
        drop(accounts);

        tracing::trace!(from = %from, to = %to, amount = %amount, id = %receipt.id, "transfer executed");
        Ok(receipt)
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.accounts.lock().get_balance(account)
    }
}

impl From<BalanceError> for TransferError {
    fn from(err: BalanceError) -> Self {
        match err {
            BalanceError::InsufficientBalance {
                account,
                available,
                requested,
            } => TransferError::InsufficientFunds {
                account,
                available,
                requested,
            },
            BalanceError::Overflow { account, .. } => TransferError::Overflow { account },
        }
    }
}
