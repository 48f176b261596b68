//! Read-only presentation of a project.

use chrono::{DateTime, Utc};
use fundhub_protocol::transfer::amount_string;
use fundhub_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a project as observed at a given instant.
///
/// `Expired` is derived lazily from the clock; nothing flips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectStatus {
    /// Accepting contributions, deadline not yet passed.
    Open,
    /// Deadline passed without reaching the goal. Refunds are available.
    Expired,
    /// Goal reached and paid to the beneficiary. Terminal.
    PaidOut,
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectStatus::Open => write!(f, "Open"),
            ProjectStatus::Expired => write!(f, "Expired"),
            ProjectStatus::PaidOut => write!(f, "PaidOut"),
        }
    }
}

/// The "complete details" view of a project.
///
/// Built from the last committed state, never from a mutation that is still
/// in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDetails {
    /// Who receives the payout.
    pub beneficiary: Address,
    /// Target amount.
    #[serde(with = "amount_string")]
    pub goal_amount: Amount,
    /// Seconds left before refunds open; zero once expired.
    pub seconds_until_expiry: u64,
    /// `false` once the payout has fired.
    pub is_open: bool,
    /// Amount currently held for the campaign.
    #[serde(with = "amount_string")]
    pub raised_amount: Amount,
}

impl ProjectDetails {
    /// Positional form: `(beneficiary, goal, secondsUntilExpiry, isOpen, raised)`.
    pub fn as_tuple(&self) -> (Address, Amount, u64, bool, Amount) {
        (
            self.beneficiary,
            self.goal_amount,
            self.seconds_until_expiry,
            self.is_open,
            self.raised_amount,
        )
    }
}

/// Whole seconds from `now` until `expiry_at`, clamped at zero.
pub fn seconds_until(expiry_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((expiry_at - now).num_seconds()).unwrap_or(0)
}
