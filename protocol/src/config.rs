//! # Protocol Configuration & Constants
//!
//! Every magic number in FundHub lives here. Runtime knobs (ports, state
//! file, log format) are parsed by the node binary; these are the values the
//! ledger itself relies on and that must agree between a snapshot writer and
//! a snapshot reader.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Protocol version reported by the node and stamped into snapshots.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Snapshot format version. Bump whenever a persisted record changes shape.
pub const SNAPSHOT_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Length in bytes of a derived account/project address (EVM-style).
pub const ADDRESS_LENGTH: usize = 20;

/// Prefix carried by the textual form of every derived address.
pub const ADDRESS_PREFIX: &str = "0x";

/// Domain separator mixed into project address derivation so that a project
/// address can never collide with a hash computed for another purpose.
pub const PROJECT_ADDRESS_DOMAIN: &[u8] = b"fundhub/project-address/v1";

/// Address used for the hub when the operator does not configure one.
pub const DEFAULT_HUB_ADDRESS: &str = "0x00000000000000000000000000000000000f0bd5";

// ---------------------------------------------------------------------------
// Campaign limits
// ---------------------------------------------------------------------------

/// Seconds in a day. Durations are always expressed in seconds.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Longest campaign the hub accepts: 100 years. Anything above this is far
/// past any sane deadline and risks overflowing timestamp arithmetic.
pub const MAX_DURATION_SECS: u64 = 100 * 365 * SECONDS_PER_DAY;

// ---------------------------------------------------------------------------
// Node defaults
// ---------------------------------------------------------------------------

/// Default JSON-RPC API port.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Upper bound on a single JSON-RPC call, including lock waits.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest amount a single devnet faucet call may mint.
pub const MAX_FAUCET_AMOUNT: u128 = 1_000_000 * 10u128.pow(18);
