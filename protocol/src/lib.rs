// Copyright (c) 2026 FundHub Contributors. MIT License.
// See LICENSE for details.

//! # FundHub Protocol: Core Primitives
//!
//! The pieces every other FundHub crate builds on:
//!
//! - **config**: Constants shared by the ledger, the contracts, and the node.
//! - **identity**: 20-byte [`Address`]es and project address derivation.
//! - **transfer**: The value-transfer adapter: [`ValueTransfer`] and [`Clock`].
//! - **vault**: In-memory balances and the reference [`InMemoryLedger`].
//!
//! The funding contracts never touch balances directly. They ask a
//! [`ValueTransfer`] to move money and a [`Clock`] for the time, which is
//! what lets the same contract code run against the in-memory ledger here
//! or against any other host.

pub mod config;
pub mod identity;
pub mod transfer;
pub mod vault;

pub use identity::Address;
pub use transfer::{
    Amount, Clock, ManualClock, SystemClock, TransferError, TransferReceipt, ValueTransfer,
};
pub use vault::{InMemoryLedger, LedgerSnapshot};
