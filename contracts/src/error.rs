//! # Contract Errors
//!
//! Every failure is a clean, local rejection of the single call that caused
//! it: the project and the hub are left exactly as they were, and no value
//! has moved. Callers decide whether to resubmit; nothing in here retries.

use chrono::{DateTime, Utc};
use fundhub_protocol::{Address, Amount, TransferError};
use thiserror::Error;

/// Why a `fund` call was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FundingRejection {
    /// The goal was already reached and paid out.
    #[error("project {project} already paid out")]
    AlreadyPaidOut {
        /// The project that was funded.
        project: Address,
    },

    /// Zero-value contributions are meaningless.
    #[error("contribution must be greater than zero")]
    ZeroAmount,

    /// The contribution would push the raised amount past the goal. The
    /// whole call is rejected; there is no partial acceptance.
    #[error("contribution of {attempted} exceeds the remaining {remaining} needed to reach the goal")]
    ExceedsGoal {
        /// Amount the caller tried to contribute.
        attempted: Amount,
        /// Amount still needed to reach the goal.
        remaining: Amount,
    },

    /// Another call on this project is executing on the current thread
    /// (re-entrant call from inside a transfer).
    #[error("another call on project {project} is in progress")]
    CallInProgress {
        /// The project being mutated.
        project: Address,
    },
}

/// Why a `withdraw` call was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WithdrawalRejection {
    /// Refunds only open once the deadline has passed.
    #[error("project has not expired yet (expires at {expiry_at})")]
    NotExpired {
        /// When refunds open.
        expiry_at: DateTime<Utc>,
    },

    /// The goal was reached; the funds belong to the beneficiary now.
    #[error("project {project} already paid out")]
    AlreadyPaidOut {
        /// The project being withdrawn from.
        project: Address,
    },

    /// Never contributed, or already refunded.
    #[error("{contributor} has no refundable contribution")]
    NoContribution {
        /// The caller.
        contributor: Address,
    },

    /// Another call on this project is executing on the current thread
    /// (re-entrant call from inside a transfer).
    #[error("another call on project {project} is in progress")]
    CallInProgress {
        /// The project being mutated.
        project: Address,
    },
}

/// Errors returned by hub and project operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    /// Malformed creation parameters.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A `fund` call was rejected.
    #[error("funding rejected: {0}")]
    FundingRejected(#[from] FundingRejection),

    /// A `withdraw` call was rejected.
    #[error("withdrawal rejected: {0}")]
    WithdrawalRejected(#[from] WithdrawalRejection),

    /// The execution environment refused to move value. Project state was
    /// rolled back before this error was returned.
    #[error("value transfer failed: {0}")]
    Transfer(#[from] TransferError),
}

impl ContractError {
    /// Short, stable name of the error kind, used for metrics labels and
    /// RPC error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            ContractError::InvalidArgument(_) => "InvalidArgument",
            ContractError::FundingRejected(_) => "FundingRejected",
            ContractError::WithdrawalRejected(_) => "WithdrawalRejected",
            ContractError::Transfer(_) => "TransferFailed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_convert_into_contract_errors() {
        let err: ContractError = FundingRejection::ZeroAmount.into();
        assert_eq!(err.kind(), "FundingRejected");

        let err: ContractError = WithdrawalRejection::NoContribution {
            contributor: Address::from_label("nobody"),
        }
        .into();
        assert_eq!(err.kind(), "WithdrawalRejected");

        let err: ContractError = TransferError::ZeroAmount.into();
        assert_eq!(err.kind(), "TransferFailed");
    }

    #[test]
    fn exceeds_goal_message_names_both_amounts() {
        let err = ContractError::from(FundingRejection::ExceedsGoal {
            attempted: 300,
            remaining: 120,
        });
        let text = err.to_string();
        assert!(text.contains("300"));
        assert!(text.contains("120"));
    }
}
