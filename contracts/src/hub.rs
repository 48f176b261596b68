//! # Funding Hub
//!
//! The registry that creates projects and remembers them in creation order.
//! It is an append-only log: projects are never removed or reordered, and a
//! reader always sees a prefix of the log.
//!
//! Project addresses are derived from the hub address and the creation
//! index, so a hub restored from a snapshot hands out the same addresses it
//! would have handed out before the restart.
//!
//! Once created, a project does not depend on the hub. Callers fund and
//! withdraw against the `Arc<Project>` directly.

use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;
use fundhub_protocol::config::MAX_DURATION_SECS;
use fundhub_protocol::{Address, Amount, Clock, ValueTransfer};
use parking_lot::RwLock;

use crate::error::ContractError;
use crate::project::Project;
use crate::snapshot::{HubSnapshot, SnapshotError};

/// Creates and enumerates projects.
pub struct FundingHub {
    address: Address,
    transfer: Arc<dyn ValueTransfer>,
    clock: Arc<dyn Clock>,
    projects: RwLock<Vec<Arc<Project>>>,
    by_address: DashMap<Address, Arc<Project>>,
}

impl FundingHub {
    /// Creates an empty hub living at `address`.
    pub fn new(address: Address, transfer: Arc<dyn ValueTransfer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            address,
            transfer,
            clock,
            projects: RwLock::new(Vec::new()),
            by_address: DashMap::new(),
        }
    }

    /// Rebuilds a hub and all of its projects from a snapshot.
    ///
    /// # Errors
    ///
    /// Any [`SnapshotError`] found while validating the snapshot. Nothing is
    /// built unless the whole snapshot is valid.
    pub fn restore(
        snapshot: HubSnapshot,
        transfer: Arc<dyn ValueTransfer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SnapshotError> {
        snapshot.validate()?;
        let hub = Self::new(snapshot.hub, transfer, clock);
        {
            let mut projects = hub.projects.write();
            for record in snapshot.projects {
                let project = Arc::new(Project::restore(
                    record,
                    hub.transfer.clone(),
                    hub.clock.clone(),
                )?);
                hub.by_address.insert(project.address(), project.clone());
                projects.push(project);
            }
        }
        tracing::info!(hub = %hub.address, projects = hub.count_of_projects(), "hub restored");
        Ok(hub)
    }

    /// Opens a new campaign with `caller` as beneficiary.
    ///
    /// The project expires `duration_secs` seconds after the clock's current
    /// time.
    ///
    /// # Errors
    ///
    /// [`ContractError::InvalidArgument`] if `goal_amount` or `duration_secs`
    /// is zero, or the duration exceeds [`MAX_DURATION_SECS`].
    pub fn create_project(
        &self,
        caller: Address,
        goal_amount: Amount,
        duration_secs: u64,
    ) -> Result<Arc<Project>, ContractError> {
        if goal_amount == 0 {
            return Err(ContractError::InvalidArgument(
                "goal amount must be greater than zero".into(),
            ));
        }
        if duration_secs == 0 {
            return Err(ContractError::InvalidArgument(
                "duration must be greater than zero".into(),
            ));
        }
        if duration_secs > MAX_DURATION_SECS {
            return Err(ContractError::InvalidArgument(format!(
                "duration {duration_secs}s exceeds the maximum of {MAX_DURATION_SECS}s"
            )));
        }

        let created_at = self.clock.now();
        let expiry_at = i64::try_from(duration_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| created_at.checked_add_signed(d))
            .ok_or_else(|| {
                ContractError::InvalidArgument(format!(
                    "expiry {duration_secs}s from now is not representable"
                ))
            })?;

        let mut projects = self.projects.write();
        let address = Address::derive_project(&self.address, projects.len() as u64);
        let project = Arc::new(Project::new(
            address,
            caller,
            goal_amount,
            created_at,
            expiry_at,
            self.transfer.clone(),
            self.clock.clone(),
        ));
        self.by_address.insert(address, project.clone());
        projects.push(project.clone());
        let count = projects.len();
        drop(projects);

        tracing::info!(
            project = %address,
            beneficiary = %caller,
            goal = %goal_amount,
            expiry_at = %expiry_at,
            count,
            "project created"
        );
        Ok(project)
    }

    /// Addresses of every project, in creation order.
    pub fn get_all_projects(&self) -> Vec<Address> {
        self.projects.read().iter().map(|p| p.address()).collect()
    }

    /// Number of projects created so far.
    pub fn count_of_projects(&self) -> usize {
        self.projects.read().len()
    }

    /// Looks a project up by address.
    pub fn project(&self, address: &Address) -> Option<Arc<Project>> {
        self.by_address.get(address).map(|entry| entry.value().clone())
    }

    /// Handles to every project, in creation order.
    pub fn projects(&self) -> Vec<Arc<Project>> {
        self.projects.read().clone()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Persisted form of the hub and all of its projects.
    pub fn snapshot(&self) -> HubSnapshot {
        let records = self.projects.read().iter().map(|p| p.record()).collect();
        HubSnapshot::new(self.address, records)
    }
}

impl fmt::Debug for FundingHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FundingHub")
            .field("address", &self.address)
            .field("projects", &self.count_of_projects())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundhub_protocol::{InMemoryLedger, ManualClock};

    fn hub() -> FundingHub {
        let clock = Arc::new(ManualClock::starting_now());
        let ledger = Arc::new(InMemoryLedger::new(clock.clone()));
        FundingHub::new(Address::from_label("hub"), ledger, clock)
    }

    #[test]
    fn create_project_records_in_order() {
        let hub = hub();
        let creator = Address::from_label("creator");

        let first = hub.create_project(creator, 1_000, 172_800).unwrap();
        let second = hub.create_project(creator, 50, 60).unwrap();

        assert_eq!(hub.count_of_projects(), 2);
        assert_eq!(
            hub.get_all_projects(),
            vec![first.address(), second.address()]
        );
        assert_eq!(first.beneficiary(), creator);
        assert_eq!(
            (first.expiry_at() - first.created_at()).num_seconds(),
            172_800
        );
    }

    #[test]
    fn addresses_derive_from_hub_and_index() {
        let hub = hub();
        let project = hub
            .create_project(Address::from_label("c"), 1, 1)
            .unwrap();
        assert_eq!(
            project.address(),
            Address::derive_project(&Address::from_label("hub"), 0)
        );
    }

    #[test]
    fn invalid_arguments_rejected_without_side_effects() {
        let hub = hub();
        let creator = Address::from_label("creator");

        for (goal, duration) in [(0, 60), (10, 0), (10, MAX_DURATION_SECS + 1)] {
            let err = hub.create_project(creator, goal, duration).unwrap_err();
            assert_eq!(err.kind(), "InvalidArgument");
        }
        assert_eq!(hub.count_of_projects(), 0);
    }

    #[test]
    fn lookup_by_address() {
        let hub = hub();
        let project = hub
            .create_project(Address::from_label("c"), 10, 60)
            .unwrap();

        let found = hub.project(&project.address()).unwrap();
        assert!(Arc::ptr_eq(&found, &project));
        assert!(hub.project(&Address::from_label("nowhere")).is_none());
    }

    #[test]
    fn get_all_projects_returns_a_copy() {
        let hub = hub();
        hub.create_project(Address::from_label("c"), 10, 60).unwrap();

        let before = hub.get_all_projects();
        hub.create_project(Address::from_label("c"), 10, 60).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(hub.get_all_projects().len(), 2);
    }
}
