//! # Addresses
//!
//! Every participant in FundHub (contributors, beneficiaries, the hub, and
//! each project's escrow account) is identified by a 20-byte address
//! written as `0x` followed by 40 lowercase hex characters:
//!
//! ```text
//! 0x5aeda56215b167893e80b4fe645ba6d5bab767de
//! ```
//!
//! Project addresses are not chosen by anyone. They are derived from the
//! hub address and the project's creation index:
//!
//! ```text
//! BLAKE3(PROJECT_ADDRESS_DOMAIN || hub_bytes || index_be_u64)[..20]
//! ```
//!
//! so two hubs never hand out the same project address, and replaying a
//! snapshot reproduces the exact same handles.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::{ADDRESS_LENGTH, ADDRESS_PREFIX, PROJECT_ADDRESS_DOMAIN};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced when parsing an address from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The string does not start with `0x`.
    #[error("address must start with '0x': {0}")]
    MissingPrefix(String),

    /// The hex body has the wrong number of characters.
    #[error("address must have {expected} hex characters, got {got}")]
    InvalidLength {
        /// Required number of hex characters.
        expected: usize,
        /// Number of hex characters found.
        got: usize,
    },

    /// The hex body contains a non-hex character.
    #[error("address contains invalid hex: {0}")]
    InvalidHex(String),
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account or project address.
///
/// Cheap to copy and hash; ordering follows the raw bytes so that sorted
/// collections of addresses are deterministic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Derives a stable address from a human label.
    ///
    /// Handy for devnet accounts and tests: `Address::from_label("alice")`
    /// always yields the same address.
    pub fn from_label(label: &str) -> Self {
        let digest = blake3::hash(label.as_bytes());
        Self::truncate(digest.as_bytes())
    }

    /// Derives the address of the `index`-th project created by `hub`.
    pub fn derive_project(hub: &Address, index: u64) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(PROJECT_ADDRESS_DOMAIN);
        hasher.update(&hub.0);
        hasher.update(&index.to_be_bytes());
        Self::truncate(hasher.finalize().as_bytes())
    }

    fn truncate(digest: &[u8; 32]) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&digest[..ADDRESS_LENGTH]);
        Self(bytes)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Parses `0x`-prefixed hex. Upper- and lowercase hex are both accepted;
    /// the canonical form is lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix(s.to_string()))?;

        if body.len() != ADDRESS_LENGTH * 2 {
            return Err(AddressError::InvalidLength {
                expected: ADDRESS_LENGTH * 2,
                got: body.len(),
            });
        }

        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(body, &mut bytes)
            .map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", ADDRESS_PREFIX, hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_roundtrip() {
        let addr = Address::from_label("alice");
        let text = addr.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 42);
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn parse_accepts_uppercase_hex() {
        let addr: Address = "0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD".parse().unwrap();
        assert_eq!(
            addr.to_string(),
            "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd"
        );
    }

    #[test]
    fn parse_rejects_missing_prefix() {
        let err = "abcdefabcdefabcdefabcdefabcdefabcdefabcd"
            .parse::<Address>()
            .unwrap_err();
        assert!(matches!(err, AddressError::MissingPrefix(_)));
    }

    #[test]
    fn parse_rejects_wrong_length() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert_eq!(
            err,
            AddressError::InvalidLength {
                expected: 40,
                got: 4
            }
        );
    }

    #[test]
    fn parse_rejects_bad_hex() {
        let err = "0xzzzzefabcdefabcdefabcdefabcdefabcdefabcd"
            .parse::<Address>()
            .unwrap_err();
        assert!(matches!(err, AddressError::InvalidHex(_)));
    }

    #[test]
    fn project_addresses_depend_on_hub_and_index() {
        let hub_a = Address::from_label("hub-a");
        let hub_b = Address::from_label("hub-b");

        let first = Address::derive_project(&hub_a, 0);
        assert_eq!(first, Address::derive_project(&hub_a, 0));
        assert_ne!(first, Address::derive_project(&hub_a, 1));
        assert_ne!(first, Address::derive_project(&hub_b, 0));
    }

    #[test]
    fn serde_uses_hex_string() {
        let addr = Address::from_label("bob");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
