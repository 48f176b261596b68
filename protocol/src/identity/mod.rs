//! # Identity Module
//!
//! Participant identities. FundHub does no key management: the execution
//! environment authenticates callers and hands the core an [`Address`].
//! This module only defines what an address looks like and how project
//! escrow addresses are derived.

pub mod address;

pub use address::{Address, AddressError};

