// Copyright (c) 2026 FundHub Contributors. MIT License.
// See LICENSE for details.

//! # FundHub Contracts
//!
//! The crowdfunding core. A [`FundingHub`] creates [`Project`]s; each project
//! holds one campaign with a fixed goal, a deadline, and a beneficiary.
//!
//! - **Hub**: append-only registry of projects, in creation order.
//! - **Project**: accepts contributions up to the goal, pays the beneficiary
//!   exactly once when the goal is reached, and refunds contributors after
//!   the deadline if it is not.
//! - **Details**: the read-only "complete details" view of a project.
//! - **Snapshot**: serde records used to persist and restore a hub.
//!
//! ## Design Principles
//!
//! 1. Every check runs before any value moves. A rejected call costs the
//!    caller nothing.
//! 2. Each project is serialized by its own lock; the payout happens inside
//!    the same critical section that closes the project.
//! 3. Value only moves through [`fundhub_protocol::ValueTransfer`]. If a
//!    transfer fails, project state is rolled back before the error is
//!    returned.
//! 4. Monetary arithmetic is bounded by the goal, so it cannot overflow.

pub mod contributions;
pub mod details;
pub mod error;
pub mod hub;
pub mod project;
pub mod snapshot;

pub use contributions::{ContributionLedger, ContributionSlot};
pub use details::{ProjectDetails, ProjectStatus};
pub use error::{ContractError, FundingRejection, WithdrawalRejection};
pub use hub::FundingHub;
pub use project::{FundingOutcome, Project};
pub use snapshot::{HubSnapshot, ProjectRecord, SnapshotError};
