//! # Contribution Ledger
//!
//! Per-project table of "who put in how much". Contributors are assigned a
//! slot the first time they fund; the slot is never freed, so a refunded
//! contributor keeps their index with a zero balance:
//!
//! ```text
//! index: contributor -> slot
//! slots: [ (alice, 120), (bob, 0), (carol, 40) ]
//! ```
//!
//! Slot order is first-contribution order, which keeps snapshots and
//! iteration deterministic.

use std::collections::HashMap;

use fundhub_protocol::transfer::amount_string;
use fundhub_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};

/// One contributor's refundable balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionSlot {
    /// Who contributed.
    pub contributor: Address,
    /// Amount still owed to them if the campaign fails.
    #[serde(with = "amount_string")]
    pub amount: Amount,
}

/// Slot-allocated contributor balances.
#[derive(Debug, Clone, Default)]
pub struct ContributionLedger {
    index: HashMap<Address, usize>,
    slots: Vec<ContributionSlot>,
}

impl ContributionLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from slots in their original order. Duplicate
    /// contributors are merged into the first slot.
    pub fn from_slots(slots: impl IntoIterator<Item = ContributionSlot>) -> Self {
        let mut ledger = Self::new();
        for slot in slots {
            let index = ledger.slot_for(slot.contributor);
            ledger.slots[index].amount += slot.amount;
        }
        ledger
    }

    /// Adds `amount` to the contributor's balance and returns the new
    /// balance.
    ///
    /// Totals are bounded by the project goal, so the addition cannot
    /// overflow when called from `Project::fund`.
    pub fn credit(&mut self, contributor: Address, amount: Amount) -> Amount {
        let index = self.slot_for(contributor);
        let slot = &mut self.slots[index];
        slot.amount += amount;
        slot.amount
    }

    /// Zeroes the contributor's balance and returns what it was.
    /// Unknown contributors yield zero without allocating a slot.
    pub fn take(&mut self, contributor: &Address) -> Amount {
        match self.index.get(contributor) {
            Some(&index) => std::mem::take(&mut self.slots[index].amount),
            None => 0,
        }
    }

    /// Current balance of a contributor; zero if unknown.
    pub fn amount_of(&self, contributor: &Address) -> Amount {
        self.index
            .get(contributor)
            .map(|&index| self.slots[index].amount)
            .unwrap_or(0)
    }

    /// Number of distinct contributors ever seen, including refunded ones.
    pub fn contributor_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of contributors with a non-zero balance.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.amount > 0).count()
    }

    /// Sum of all balances.
    pub fn total(&self) -> Amount {
        self.slots.iter().map(|s| s.amount).sum()
    }

    /// Slots in first-contribution order.
    pub fn slots(&self) -> &[ContributionSlot] {
        &self.slots
    }

    fn slot_for(&mut self, contributor: Address) -> usize {
        if let Some(&index) = self.index.get(&contributor) {
            return index;
        }
        let index = self.slots.len();
        self.slots.push(ContributionSlot {
            contributor,
            amount: 0,
        });
        self.index.insert(contributor, index);
        index
    }
}
