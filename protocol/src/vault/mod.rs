//! # Vault Module: Balances & the Reference Ledger
//!
//! The vault is where money lives when FundHub runs in-process. It provides
//! the reference [`ValueTransfer`](crate::transfer::ValueTransfer)
//! implementation used by the node and by tests.
//!
//! ```text
//! balance.rs : Per-account balance bookkeeping with checked arithmetic
//! ledger.rs  : Thread-safe ledger: atomic transfers + receipt journal
//! ```
//!
//! All amounts are `u128` in smallest-unit denomination. No floating point,
//! no decimals in arithmetic.

pub mod balance;
pub mod ledger;

pub use balance::{Balance, BalanceError, BalanceSheet};
pub use ledger::{InMemoryLedger, LedgerSnapshot};
