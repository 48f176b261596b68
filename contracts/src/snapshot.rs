//! # Persisted Layout
//!
//! Plain serde records of hub and project state. A record is what a project
//! looks like at rest; [`crate::Project::restore`] and
//! [`crate::FundingHub::restore`] turn records back into live objects.

use chrono::{DateTime, Utc};
use fundhub_protocol::config::SNAPSHOT_VERSION;
use fundhub_protocol::transfer::amount_string;
use fundhub_protocol::{Address, Amount, TransferReceipt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contributions::ContributionSlot;

/// Why a snapshot could not be restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Written by an incompatible release.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },

    /// A record breaks one of the project invariants.
    #[error("corrupt record for project {project}: {reason}")]
    CorruptRecord {
        /// The offending project.
        project: Address,
        /// What is wrong with it.
        reason: String,
    },

    /// A project address does not match the address derived from its index.
    #[error("project #{index} has address {found}, expected {expected}")]
    AddressMismatch {
        /// Position in the registry.
        index: usize,
        /// Address in the record.
        found: Address,
        /// Address derived from the hub and the index.
        expected: Address,
    },
}

/// One project at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub address: Address,
    pub beneficiary: Address,
    #[serde(with = "amount_string")]
    pub goal_amount: Amount,
    #[serde(with = "amount_string")]
    pub raised_amount: Amount,
    pub created_at: DateTime<Utc>,
    pub expiry_at: DateTime<Utc>,
    pub is_open: bool,
    pub payout_done: bool,
    #[serde(with = "amount_string")]
    pub refunded_total: Amount,
    pub payout: Option<TransferReceipt>,
    pub contributions: Vec<ContributionSlot>,
}

impl ProjectRecord {
    /// Checks the invariants a live project relies on.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let corrupt = |reason: &str| SnapshotError::CorruptRecord {
            project: self.address,
            reason: reason.to_string(),
        };

        if self.goal_amount == 0 {
            return Err(corrupt("goal is zero"));
        }
        if self.expiry_at <= self.created_at {
            return Err(corrupt("expiry is not after creation"));
        }
        if self.raised_amount > self.goal_amount {
            return Err(corrupt("raised amount exceeds goal"));
        }
        let contributed = self
            .contributions
            .iter()
            .try_fold(0u128, |acc, slot| acc.checked_add(slot.amount))
            .ok_or_else(|| corrupt("contributions overflow"))?;
        if contributed != self.raised_amount {
            return Err(corrupt("contributions do not sum to the raised amount"));
        }
        if self.payout_done != (self.raised_amount == self.goal_amount) {
            return Err(corrupt("payout flag disagrees with raised amount"));
        }
        if self.payout_done != self.payout.is_some() || self.payout_done == self.is_open {
            return Err(corrupt("payout flag disagrees with open flag or receipt"));
        }
        Ok(())
    }
}

/// The whole registry at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubSnapshot {
    pub version: u32,
    pub hub: Address,
    pub projects: Vec<ProjectRecord>,
}

impl HubSnapshot {
    /// Wraps records under the current format version.
    pub fn new(hub: Address, projects: Vec<ProjectRecord>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            hub,
            projects,
        }
    }

    /// Checks the version, every record, and that each address matches its
    /// derivation from the hub.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        for (index, record) in self.projects.iter().enumerate() {
            let expected = Address::derive_project(&self.hub, index as u64);
            if record.address != expected {
                return Err(SnapshotError::AddressMismatch {
                    index,
                    found: record.address,
                    expected,
                });
            }
            record.validate()?;
        }
        Ok(())
    }
}
