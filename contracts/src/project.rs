//! # Project
//!
//! One fundraising campaign: a fixed goal, a deadline, a beneficiary, and a
//! ledger of who contributed what. The lifecycle is:
//!
//! 1. **Open**: contributors call [`Project::fund`]. Each call is checked
//!    against the goal before any value moves.
//! 2. **Paid out**: the call that brings the raised amount exactly to the
//!    goal also pays the whole pot to the beneficiary. Terminal.
//! 3. **Expired**: the deadline passed without reaching the goal. Each
//!    contributor may [`Project::withdraw`] their own contribution once.
//!
//! Expiry is never stored; it is evaluated against the clock on demand.
//!
//! ## Serialization
//!
//! Every mutating call runs under the project's lock, including the value
//! transfers it makes. The lock is re-entrant so that a transfer adapter
//! calling back into the same project on the same thread does not deadlock;
//! such a call finds the in-flight marker set and is rejected with
//! `CallInProgress`. Readers of [`Project::complete_details`] see the
//! summary stored at the last successful commit.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fundhub_protocol::transfer::amount_string;
use fundhub_protocol::{
    Address, Amount, Clock, TransferError, TransferReceipt, ValueTransfer,
};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};

use crate::contributions::ContributionLedger;
use crate::details::{seconds_until, ProjectDetails, ProjectStatus};
use crate::error::{ContractError, FundingRejection, WithdrawalRejection};
use crate::snapshot::{ProjectRecord, SnapshotError};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of an accepted contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingOutcome {
    /// Raised amount after this contribution.
    #[serde(with = "amount_string")]
    pub raised_amount: Amount,
    /// The caller's accumulated contribution.
    #[serde(with = "amount_string")]
    pub contribution: Amount,
    /// Caller to escrow.
    pub deposit: TransferReceipt,
    /// Escrow to beneficiary, present only on the call that reached the goal.
    pub payout: Option<TransferReceipt>,
}

impl FundingOutcome {
    /// `true` if this contribution triggered the payout.
    pub fn paid_out(&self) -> bool {
        self.payout.is_some()
    }
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

struct ProjectState {
    raised_amount: Amount,
    is_open: bool,
    payout_done: bool,
    refunded_total: Amount,
    payout: Option<TransferReceipt>,
    contributions: ContributionLedger,
}

impl ProjectState {
    fn summary(&self) -> Summary {
        Summary {
            raised_amount: self.raised_amount,
            is_open: self.is_open,
            payout_done: self.payout_done,
        }
    }
}

/// The part of the state visible to readers.
#[derive(Debug, Clone, Copy)]
struct Summary {
    raised_amount: Amount,
    is_open: bool,
    payout_done: bool,
}

/// Everything behind the project lock.
///
/// `RefCell` borrows are never held across a call into the transfer
/// adapter.
struct ProjectCell {
    in_flight: Cell<bool>,
    state: RefCell<ProjectState>,
    committed: Cell<Summary>,
}

impl ProjectCell {
    fn new(state: ProjectState) -> Self {
        Self {
            in_flight: Cell::new(false),
            committed: Cell::new(state.summary()),
            state: RefCell::new(state),
        }
    }

    /// Marks a mutation as running. `None` if one already is.
    fn begin(&self) -> Option<InFlight<'_>> {
        if self.in_flight.replace(true) {
            None
        } else {
            Some(InFlight(&self.in_flight))
        }
    }

    fn commit(&self) {
        self.committed.set(self.state.borrow().summary());
    }
}

/// Clears the in-flight marker on every exit path, including panics in the
/// transfer adapter.
struct InFlight<'a>(&'a Cell<bool>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// A refund already debited from the books but not yet sent.
///
/// Dropping it without [`PendingRefund::settle`] credits the contribution
/// back, whether the transfer returned an error or panicked.
struct PendingRefund<'a> {
    cell: &'a ProjectCell,
    contributor: Address,
    amount: Amount,
    settled: bool,
}

impl PendingRefund<'_> {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for PendingRefund<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        match self.cell.state.try_borrow_mut() {
            Ok(mut state) => {
                state.contributions.credit(self.contributor, self.amount);
                state.raised_amount += self.amount;
                state.refunded_total -= self.amount;
            }
            Err(_) => tracing::error!(
                contributor = %self.contributor,
                amount = %self.amount,
                "could not restore unsent refund"
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A single crowdfunding campaign.
///
/// Shared as `Arc<Project>`; every method takes `&self`.
pub struct Project {
    address: Address,
    beneficiary: Address,
    goal_amount: Amount,
    created_at: DateTime<Utc>,
    expiry_at: DateTime<Utc>,
    transfer: Arc<dyn ValueTransfer>,
    clock: Arc<dyn Clock>,
    cell: ReentrantMutex<ProjectCell>,
}

impl Project {
    /// Opens a fresh campaign. Argument validation is the hub's job.
    pub(crate) fn new(
        address: Address,
        beneficiary: Address,
        goal_amount: Amount,
        created_at: DateTime<Utc>,
        expiry_at: DateTime<Utc>,
        transfer: Arc<dyn ValueTransfer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = ProjectState {
            raised_amount: 0,
            is_open: true,
            payout_done: false,
            refunded_total: 0,
            payout: None,
            contributions: ContributionLedger::new(),
        };
        Self {
            address,
            beneficiary,
            goal_amount,
            created_at,
            expiry_at,
            transfer,
            clock,
            cell: ReentrantMutex::new(ProjectCell::new(state)),
        }
    }

    /// Rebuilds a project from its persisted record.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::CorruptRecord`] if the record breaks an invariant.
    pub fn restore(
        record: ProjectRecord,
        transfer: Arc<dyn ValueTransfer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SnapshotError> {
        record.validate()?;
        let state = ProjectState {
            raised_amount: record.raised_amount,
            is_open: record.is_open,
            payout_done: record.payout_done,
            refunded_total: record.refunded_total,
            payout: record.payout,
            contributions: ContributionLedger::from_slots(record.contributions),
        };
        Ok(Self {
            address: record.address,
            beneficiary: record.beneficiary,
            goal_amount: record.goal_amount,
            created_at: record.created_at,
            expiry_at: record.expiry_at,
            transfer,
            clock,
            cell: ReentrantMutex::new(ProjectCell::new(state)),
        })
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Contributes `amount` from `caller`.
    ///
    /// All checks run before any value moves, so a rejected call costs the
    /// caller nothing. If this contribution brings the raised amount exactly
    /// to the goal, the whole pot is paid to the beneficiary within the same
    /// call and the project closes.
    ///
    /// # Errors
    ///
    /// - [`FundingRejection::AlreadyPaidOut`] once the goal has been paid.
    /// - [`FundingRejection::ZeroAmount`] for a zero contribution.
    /// - [`FundingRejection::ExceedsGoal`] if the goal would be overshot.
    /// - [`FundingRejection::CallInProgress`] for a re-entrant call.
    /// - [`ContractError::Transfer`] if the deposit or the payout failed; the
    ///   deposit is returned and the project is unchanged.
    pub fn fund(&self, caller: Address, amount: Amount) -> Result<FundingOutcome, ContractError> {
        let cell = self.cell.lock();
        let Some(_in_flight) = cell.begin() else {
            tracing::warn!(project = %self.address, caller = %caller, "re-entrant fund rejected");
            return Err(FundingRejection::CallInProgress {
                project: self.address,
            }
            .into());
        };

        let raised_before = {
            let state = cell.state.borrow();
            self.check_funding(&state, amount)
                .map_err(|rejection| self.funding_rejected(caller, rejection))?;
            state.raised_amount
        };

        let deposit = self
            .transfer
            .transfer(&caller, &self.address, amount)
            .map_err(|e| self.transfer_failed("deposit", caller, amount, e))?;

        // Cannot overflow: check_funding bounded amount by goal - raised.
        let raised_amount = raised_before + amount;
        let payout = if raised_amount == self.goal_amount {
            Some(self.pay_beneficiary(caller, amount, raised_amount)?)
        } else {
            None
        };

        let contribution = {
            let mut state = cell.state.borrow_mut();
            state.raised_amount = raised_amount;
            let contribution = state.contributions.credit(caller, amount);
            if let Some(receipt) = &payout {
                state.is_open = false;
                state.payout_done = true;
                state.payout = Some(receipt.clone());
            }
            contribution
        };
        cell.commit();

        match &payout {
            Some(receipt) => tracing::info!(
                project = %self.address,
                beneficiary = %self.beneficiary,
                amount = %receipt.amount,
                receipt = %receipt.id,
                "goal reached, paid out"
            ),
            None => tracing::debug!(
                project = %self.address,
                caller = %caller,
                amount = %amount,
                raised = %raised_amount,
                "contribution accepted"
            ),
        }

        Ok(FundingOutcome {
            raised_amount,
            contribution,
            deposit,
            payout,
        })
    }

    /// Refunds the caller's whole contribution after the deadline.
    ///
    /// The contribution is zeroed before the outgoing transfer, so a second
    /// withdrawal by the same caller (re-entrant or not) finds nothing.
    ///
    /// # Errors
    ///
    /// - [`WithdrawalRejection::AlreadyPaidOut`] once the goal has been paid.
    /// - [`WithdrawalRejection::NotExpired`] up to and including the deadline.
    /// - [`WithdrawalRejection::NoContribution`] if nothing is owed.
    /// - [`WithdrawalRejection::CallInProgress`] for a re-entrant call.
    /// - [`ContractError::Transfer`] if the refund transfer failed; the
    ///   contribution is restored. It is also restored if the adapter panics.
    pub fn withdraw(&self, caller: Address) -> Result<Amount, ContractError> {
        let cell = self.cell.lock();
        let Some(_in_flight) = cell.begin() else {
            tracing::warn!(project = %self.address, caller = %caller, "re-entrant withdraw rejected");
            return Err(WithdrawalRejection::CallInProgress {
                project: self.address,
            }
            .into());
        };

        let now = self.clock.now();
        let owed = {
            let mut state = cell.state.borrow_mut();
            if state.payout_done {
                return Err(self.withdrawal_rejected(
                    caller,
                    WithdrawalRejection::AlreadyPaidOut {
                        project: self.address,
                    },
                ));
            }
            if now <= self.expiry_at {
                return Err(self.withdrawal_rejected(
                    caller,
                    WithdrawalRejection::NotExpired {
                        expiry_at: self.expiry_at,
                    },
                ));
            }
            let owed = state.contributions.take(&caller);
            if owed == 0 {
                return Err(self.withdrawal_rejected(
                    caller,
                    WithdrawalRejection::NoContribution {
                        contributor: caller,
                    },
                ));
            }
            // Contributions always sum to the raised amount.
            state.raised_amount -= owed;
            state.refunded_total += owed;
            owed
        };
        let pending = PendingRefund {
            cell: &*cell,
            contributor: caller,
            amount: owed,
            settled: false,
        };

        match self.transfer.transfer(&self.address, &caller, owed) {
            Ok(receipt) => {
                pending.settle();
                cell.commit();
                tracing::info!(
                    project = %self.address,
                    contributor = %caller,
                    amount = %owed,
                    receipt = %receipt.id,
                    "contribution refunded"
                );
                Ok(owed)
            }
            Err(e) => {
                drop(pending);
                Err(self.transfer_failed("refund", caller, owed, e))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// `(beneficiary, goal, seconds until expiry, open, raised)` as of the
    /// last committed mutation.
    ///
    /// The raised figure is what the project still holds, so it reads zero
    /// once the pot has gone to the beneficiary. [`Project::raised_amount`]
    /// keeps reporting the goal after payout.
    pub fn complete_details(&self) -> ProjectDetails {
        let summary = self.cell.lock().committed.get();
        let held = if summary.payout_done {
            0
        } else {
            summary.raised_amount
        };
        ProjectDetails {
            beneficiary: self.beneficiary,
            goal_amount: self.goal_amount,
            seconds_until_expiry: seconds_until(self.expiry_at, self.clock.now()),
            is_open: summary.is_open,
            raised_amount: held,
        }
    }

    /// Lifecycle phase right now.
    pub fn status(&self) -> ProjectStatus {
        let summary = self.cell.lock().committed.get();
        if summary.payout_done {
            ProjectStatus::PaidOut
        } else if self.clock.now() > self.expiry_at {
            ProjectStatus::Expired
        } else {
            ProjectStatus::Open
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn beneficiary(&self) -> Address {
        self.beneficiary
    }

    pub fn goal_amount(&self) -> Amount {
        self.goal_amount
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expiry_at(&self) -> DateTime<Utc> {
        self.expiry_at
    }

    /// Committed raised amount.
    pub fn raised_amount(&self) -> Amount {
        self.cell.lock().committed.get().raised_amount
    }

    pub fn is_open(&self) -> bool {
        self.cell.lock().committed.get().is_open
    }

    pub fn payout_done(&self) -> bool {
        self.cell.lock().committed.get().payout_done
    }

    /// Refundable balance of `contributor`.
    pub fn contribution_of(&self, contributor: &Address) -> Amount {
        self.cell.lock().state.borrow().contributions.amount_of(contributor)
    }

    /// Distinct contributors ever seen, refunded ones included.
    pub fn contributor_count(&self) -> usize {
        self.cell.lock().state.borrow().contributions.contributor_count()
    }

    /// Sum of all refunds issued so far.
    pub fn refunded_total(&self) -> Amount {
        self.cell.lock().state.borrow().refunded_total
    }

    /// Receipt of the payout transfer, once it has happened.
    pub fn payout_receipt(&self) -> Option<TransferReceipt> {
        self.cell.lock().state.borrow().payout.clone()
    }

    /// Balance held at the project's escrow account.
    pub fn escrow_balance(&self) -> Amount {
        self.transfer.balance_of(&self.address)
    }

    /// Persisted form of the project.
    pub fn record(&self) -> ProjectRecord {
        let cell = self.cell.lock();
        let state = cell.state.borrow();
        ProjectRecord {
            address: self.address,
            beneficiary: self.beneficiary,
            goal_amount: self.goal_amount,
            raised_amount: state.raised_amount,
            created_at: self.created_at,
            expiry_at: self.expiry_at,
            is_open: state.is_open,
            payout_done: state.payout_done,
            refunded_total: state.refunded_total,
            payout: state.payout.clone(),
            contributions: state.contributions.slots().to_vec(),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn check_funding(&self, state: &ProjectState, amount: Amount) -> Result<(), FundingRejection> {
        if state.payout_done {
            return Err(FundingRejection::AlreadyPaidOut {
                project: self.address,
            });
        }
        if amount == 0 {
            return Err(FundingRejection::ZeroAmount);
        }
        let remaining = self.goal_amount - state.raised_amount;
        if amount > remaining {
            return Err(FundingRejection::ExceedsGoal {
                attempted: amount,
                remaining,
            });
        }
        Ok(())
    }

    /// Sends the pot to the beneficiary. On failure the caller's deposit is
    /// sent back before the error is returned.
    fn pay_beneficiary(
        &self,
        caller: Address,
        deposited: Amount,
        pot: Amount,
    ) -> Result<TransferReceipt, ContractError> {
        match self.transfer.transfer(&self.address, &self.beneficiary, pot) {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                if let Err(undo) = self.transfer.transfer(&self.address, &caller, deposited) {
                    tracing::error!(
                        project = %self.address,
                        caller = %caller,
                        amount = %deposited,
                        error = %undo,
                        "could not return deposit after failed payout"
                    );
                }
                Err(self.transfer_failed("payout", self.beneficiary, pot, e))
            }
        }
    }

    fn funding_rejected(&self, caller: Address, rejection: FundingRejection) -> ContractError {
        tracing::debug!(project = %self.address, caller = %caller, reason = %rejection, "fund rejected");
        rejection.into()
    }

    fn withdrawal_rejected(&self, caller: Address, rejection: WithdrawalRejection) -> ContractError {
        tracing::debug!(project = %self.address, caller = %caller, reason = %rejection, "withdraw rejected");
        rejection.into()
    }

    fn transfer_failed(
        &self,
        leg: &'static str,
        counterparty: Address,
        amount: Amount,
        err: TransferError,
    ) -> ContractError {
        tracing::warn!(
            project = %self.address,
            leg,
            counterparty = %counterparty,
            amount = %amount,
            error = %err,
            "transfer failed"
        );
        ContractError::Transfer(err)
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("address", &self.address)
            .field("beneficiary", &self.beneficiary)
            .field("goal_amount", &self.goal_amount)
            .field("expiry_at", &self.expiry_at)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
