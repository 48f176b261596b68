//! # Value-Transfer Adapter
//!
//! The only two things the funding core needs from its execution
//! environment:
//!
//! - [`ValueTransfer`]: move value between two addresses, all or nothing.
//! - [`Clock`]: read the current wall-clock time.
//!
//! Everything else (signatures, fees, block production) belongs to whoever
//! hosts the core. The in-process reference implementation of
//! [`ValueTransfer`] is [`crate::vault::InMemoryLedger`].
//!
//! ## Contract for implementors
//!
//! 1. `transfer` either moves exactly `amount` and returns a receipt, or
//!    moves nothing and returns an error. There is no partial transfer.
//! 2. `transfer` must not block waiting for another transfer that involves
//!    the same project; callers hold the project's lock while transferring.
//! 3. Implementations may call back into the core (a contract that receives
//!    value may run code). The core rejects such re-entrant calls on the
//!    project it is currently mutating.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::identity::Address;

/// Smallest-unit monetary amount (wei-equivalent).
///
/// `u128` so that goals such as `20 * 10^18` fit without rescaling.
pub type Amount = u128;

/// Serde adapter that writes an [`Amount`] as a decimal string.
///
/// JSON numbers lose precision above 2^53 in most clients, so every amount
/// that crosses the RPC boundary travels as a string. Deserialization also
/// accepts plain integers that fit in a `u64`.
pub mod amount_string {
    use super::Amount;
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    /// Serializes `amount` as a decimal string.
    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(amount)
    }

    /// Parses a decimal string or a non-negative integer.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }

    /// Parses the textual form accepted by [`deserialize`].
    pub fn parse(text: &str) -> Option<Amount> {
        let text = text.trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        text.parse().ok()
    }

    struct AmountVisitor;

    impl<'de> Visitor<'de> for AmountVisitor {
        type Value = Amount;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer or a decimal string")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
            Ok(Amount::from(v))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<Amount, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
            u64::try_from(v)
                .map(Amount::from)
                .map_err(|_| E::custom("amount must not be negative"))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
            parse(v).ok_or_else(|| E::custom(format!("invalid amount: {v:?}")))
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons the execution environment refused to move value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The source account holds less than the requested amount.
    #[error("insufficient funds in {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// The account being debited.
        account: Address,
        /// Its balance at the time of the call.
        available: Amount,
        /// The amount requested.
        requested: Amount,
    },

    /// Crediting the destination would overflow its balance.
    #[error("balance overflow crediting {account}")]
    Overflow {
        /// The account being credited.
        account: Address,
    },

    /// Zero-value transfers are not recorded.
    #[error("zero-amount transfers are not permitted")]
    ZeroAmount,

    /// Source and destination are the same account.
    #[error("cannot transfer from {0} to itself")]
    SelfTransfer(Address),

    /// The environment declined for a reason of its own (e.g. the recipient
    /// rejected the incoming value).
    #[error("transfer refused: {0}")]
    Refused(String),
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// Proof that one transfer was executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    /// Unique identifier of this transfer.
    pub id: Uuid,
    /// Debited account.
    pub from: Address,
    /// Credited account.
    pub to: Address,
    /// Amount moved, in smallest units.
    #[serde(with = "amount_string")]
    pub amount: Amount,
    /// When the environment executed the transfer.
    pub executed_at: DateTime<Utc>,
}

impl TransferReceipt {
    /// Builds a receipt with a fresh identifier.
    pub fn new(from: Address, to: Address, amount: Amount, executed_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            amount,
            executed_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Moves value between accounts on behalf of the funding core.
pub trait ValueTransfer: Send + Sync {
    /// Moves `amount` from `from` to `to`, atomically.
    fn transfer(
        &self,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<TransferReceipt, TransferError>;

    /// Current balance of `account`. Unknown accounts hold zero.
    fn balance_of(&self, account: &Address) -> Amount;
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time from the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// Used by tests and by the devnet node to fast-forward past campaign
/// deadlines without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Starts the clock at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Starts the clock at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Jumps to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.write() = instant;
    }

    /// Moves the clock forward by `secs` seconds.
    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.write();
        *now += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Wrapped {
        #[serde(with = "amount_string")]
        value: Amount,
    }

    #[test]
    fn amount_string_writes_decimal_text() {
        let json = serde_json::to_string(&Wrapped {
            value: 20 * 10u128.pow(18),
        })
        .unwrap();
        assert_eq!(json, r#"{"value":"20000000000000000000"}"#);
    }

    #[test]
    fn amount_string_reads_text_and_small_integers() {
        let from_text: Wrapped = serde_json::from_str(r#"{"value":"20000000000000000000"}"#).unwrap();
        assert_eq!(from_text.value, 20 * 10u128.pow(18));

        let from_number: Wrapped = serde_json::from_str(r#"{"value":15}"#).unwrap();
        assert_eq!(from_number.value, 15);

        assert!(serde_json::from_str::<Wrapped>(r#"{"value":"-3"}"#).is_err());
        assert!(serde_json::from_str::<Wrapped>(r#"{"value":-3}"#).is_err());
        assert!(serde_json::from_str::<Wrapped>(r#"{"value":1.5}"#).is_err());
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance_secs(90);
        assert_eq!((clock.now() - start).num_seconds(), 90);

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn receipts_get_unique_ids() {
        let from = Address::from_label("a");
        let to = Address::from_label("b");
        let now = Utc::now();
        let r1 = TransferReceipt::new(from, to, 5, now);
        let r2 = TransferReceipt::new(from, to, 5, now);
        assert_ne!(r1.id, r2.id);
        assert_eq!(r1.amount, 5);
    }

    #[test]
    fn transfer_error_messages_name_the_account() {
        let account = Address::from_label("poor");
        let err = TransferError::InsufficientFunds {
            account,
            available: 1,
            requested: 2,
        };
        assert!(err.to_string().contains(&account.to_string()));
    }
}
