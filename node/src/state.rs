//! # Node State
//!
//! The node holds one hub and the ledger it moves value through. Both can be
//! persisted to a single JSON file:
//!
//! ```text
//! { "saved_at": ..., "hub": HubSnapshot, "ledger": LedgerSnapshot }
//! ```
//!
//! The file is written to a sibling temp file and renamed into place, so a
//! crash mid-write leaves the previous snapshot intact.
//!
//! Hub and ledger are captured one after the other. Mutating RPC calls hold
//! the [`MutationGate`] shared and [`NodeRuntime::snapshot`] holds it
//! exclusively, so no contribution or refund can land between the two
//! halves. On load, every project's escrow balance must match its books.

use std::path::Path;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};

use fundhub_contracts::{FundingHub, HubSnapshot};
use fundhub_protocol::{Address, Clock, InMemoryLedger, LedgerSnapshot, ValueTransfer};

/// Everything the node persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub saved_at: DateTime<Utc>,
    pub hub: HubSnapshot,
    pub ledger: LedgerSnapshot,
}

/// Node-wide gate between mutating calls and persistence.
#[derive(Clone, Default)]
pub struct MutationGate(Arc<RwLock<()>>);

impl MutationGate {
    /// Held for the duration of one mutating call. Many may be held at once.
    pub fn enter(&self) -> RwLockReadGuard<'_, ()> {
        self.0.read()
    }

    /// Waits for in-flight mutations to finish and keeps new ones out.
    pub fn quiesce(&self) -> RwLockWriteGuard<'_, ()> {
        self.0.write()
    }
}

/// Live hub plus the ledger backing it.
#[derive(Clone)]
pub struct NodeRuntime {
    pub hub: Arc<FundingHub>,
    pub ledger: Arc<InMemoryLedger>,
    pub gate: MutationGate,
}

impl std::fmt::Debug for NodeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRuntime").finish_non_exhaustive()
    }
}

impl NodeRuntime {
    /// A fresh hub over an empty ledger.
    pub fn fresh(hub_address: Address, clock: Arc<dyn Clock>) -> Self {
        let ledger = Arc::new(InMemoryLedger::new(clock.clone()));
        let hub = Arc::new(FundingHub::new(hub_address, ledger.clone(), clock));
        Self {
            hub,
            ledger,
            gate: MutationGate::default(),
        }
    }

    /// Rebuilds hub and ledger from a snapshot.
    ///
    /// Fails if the snapshot is invalid or if any project's escrow balance
    /// disagrees with its raised amount.
    pub fn restore(snapshot: NodeSnapshot, clock: Arc<dyn Clock>) -> Result<Self> {
        let ledger = Arc::new(InMemoryLedger::restore(snapshot.ledger, clock.clone()));
        let hub = FundingHub::restore(snapshot.hub, ledger.clone(), clock)
            .context("snapshot failed validation")?;
        check_escrow(&hub, ledger.as_ref())?;
        Ok(Self {
            hub: Arc::new(hub),
            ledger,
            gate: MutationGate::default(),
        })
    }

    /// Loads `state_file` if it exists, otherwise starts fresh.
    pub fn open(
        hub_address: Address,
        state_file: Option<&Path>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let Some(path) = state_file else {
            return Ok(Self::fresh(hub_address, clock));
        };
        match load(path)? {
            Some(snapshot) => {
                if snapshot.hub.hub != hub_address {
                    tracing::warn!(
                        configured = %hub_address,
                        persisted = %snapshot.hub.hub,
                        "hub address differs from state file, using the persisted one"
                    );
                }
                tracing::info!(
                    path = %path.display(),
                    saved_at = %snapshot.saved_at,
                    projects = snapshot.hub.projects.len(),
                    "state loaded"
                );
                Self::restore(snapshot, clock)
            }
            None => {
                tracing::info!(path = %path.display(), "no state file yet, starting fresh");
                Ok(Self::fresh(hub_address, clock))
            }
        }
    }

    /// Snapshot of hub and ledger taken while no mutation is in flight.
    pub fn snapshot(&self) -> NodeSnapshot {
        let _quiet = self.gate.quiesce();
        NodeSnapshot {
            saved_at: Utc::now(),
            hub: self.hub.snapshot(),
            ledger: self.ledger.snapshot(),
        }
    }

    /// Writes the current state to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_vec_pretty(&snapshot).context("failed to encode snapshot")?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to move snapshot into {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            projects = snapshot.hub.projects.len(),
            "state saved"
        );
        Ok(())
    }
}

/// Every unpaid project must hold exactly its raised amount, and every paid
/// one nothing.
fn check_escrow(hub: &FundingHub, ledger: &InMemoryLedger) -> Result<()> {
    for project in hub.projects() {
        let expected = if project.payout_done() {
            0
        } else {
            project.raised_amount()
        };
        let held = ledger.balance_of(&project.address());
        ensure!(
            held == expected,
            "project {} holds {} in escrow but its books expect {}",
            project.address(),
            held,
            expected
        );
    }
    Ok(())
}

/// Reads a snapshot file. `None` if the file does not exist.
pub fn load(path: &Path) -> Result<Option<NodeSnapshot>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    let snapshot = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundhub_protocol::{ManualClock, ValueTransfer};

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::starting_now())
    }

    #[test]
    fn missing_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let runtime = NodeRuntime::open(Address::from_label("hub"), Some(&path), clock()).unwrap();

        assert_eq!(runtime.hub.count_of_projects(), 0);
        assert_eq!(runtime.hub.address(), Address::from_label("hub"));
    }

    #[test]
    fn save_then_open_restores_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let clock = clock();
        let alice = Address::from_label("alice");

        let runtime = NodeRuntime::fresh(Address::from_label("hub"), clock.clone());
        runtime.ledger.mint(&alice, 100).unwrap();
        let project = runtime
            .hub
            .create_project(Address::from_label("b"), 50, 3_600)
            .unwrap();
        project.fund(alice, 20).unwrap();
        runtime.save(&path).unwrap();

        let reopened =
            NodeRuntime::open(Address::from_label("ignored"), Some(&path), clock).unwrap();

        assert_eq!(reopened.hub.address(), Address::from_label("hub"));
        assert_eq!(reopened.hub.get_all_projects(), vec![project.address()]);
        assert_eq!(reopened.ledger.balance_of(&alice), 80);
        let restored = reopened.hub.project(&project.address()).unwrap();
        assert_eq!(restored.contribution_of(&alice), 20);
        assert_eq!(restored.escrow_balance(), 20);
    }

    #[test]
    fn torn_snapshot_is_rejected() {
        let clock = clock();
        let alice = Address::from_label("alice");
        let runtime = NodeRuntime::fresh(Address::from_label("hub"), clock.clone());
        runtime.ledger.mint(&alice, 100).unwrap();
        let project = runtime
            .hub
            .create_project(Address::from_label("b"), 50, 3_600)
            .unwrap();
        project.fund(alice, 10).unwrap();

        let hub = runtime.hub.snapshot();
        project.fund(alice, 20).unwrap();
        let torn = NodeSnapshot {
            saved_at: Utc::now(),
            hub,
            ledger: runtime.ledger.snapshot(),
        };

        let err = NodeRuntime::restore(torn, clock.clone()).unwrap_err();
        assert!(err.to_string().contains("escrow"));
        assert!(NodeRuntime::restore(runtime.snapshot(), clock).is_ok());
    }

    #[test]
    fn snapshot_waits_for_in_flight_mutations() {
        let runtime = NodeRuntime::fresh(Address::from_label("hub"), clock());
        let alice = Address::from_label("alice");
        runtime.ledger.mint(&alice, 100).unwrap();
        let project = runtime
            .hub
            .create_project(Address::from_label("b"), 50, 3_600)
            .unwrap();
        let done = std::sync::atomic::AtomicBool::new(false);

        let snapshot = std::thread::scope(|s| {
            let in_flight = runtime.gate.enter();
            let saver = s.spawn(|| {
                let snapshot = runtime.snapshot();
                done.store(true, std::sync::atomic::Ordering::SeqCst);
                snapshot
            });
            std::thread::sleep(std::time::Duration::from_millis(50));
            assert!(!done.load(std::sync::atomic::Ordering::SeqCst));
            project.fund(alice, 20).unwrap();
            drop(in_flight);
            saver.join().unwrap()
        });

        assert_eq!(snapshot.hub.projects[0].raised_amount, 20);
        assert_eq!(snapshot.ledger.balances.get(&project.address()), Some(&20));
    }

    #[test]
    fn garbage_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{ not json").unwrap();

        assert!(NodeRuntime::open(Address::from_label("hub"), Some(&path), clock()).is_err());
    }
}
