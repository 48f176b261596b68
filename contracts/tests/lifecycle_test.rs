//! Integration tests for the hub and project lifecycle.
//!
//! These run against the in-memory ledger with a manual clock, so deadlines
//! are crossed by advancing time instead of sleeping.

use std::sync::Arc;

use fundhub_contracts::{
    ContractError, FundingHub, FundingRejection, HubSnapshot, ProjectStatus, WithdrawalRejection,
};
use fundhub_protocol::config::SECONDS_PER_DAY;
use fundhub_protocol::{Address, Amount, Clock, InMemoryLedger, ManualClock, ValueTransfer};

const ETHER: Amount = 1_000_000_000_000_000_000;

struct Harness {
    clock: Arc<ManualClock>,
    ledger: Arc<InMemoryLedger>,
    hub: FundingHub,
}

/// Helper: a hub over a fresh ledger where every named account holds 100 ether.
fn harness(accounts: &[&str]) -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let ledger = Arc::new(InMemoryLedger::new(clock.clone()));
    for name in accounts {
        ledger.mint(&Address::from_label(name), 100 * ETHER).unwrap();
    }
    let hub = FundingHub::new(Address::from_label("hub"), ledger.clone(), clock.clone());
    Harness { clock, ledger, hub }
}

fn addr(name: &str) -> Address {
    Address::from_label(name)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_create_one_project() {
    let h = harness(&[]);

    h.hub.create_project(addr("a"), 1_000, 2 * SECONDS_PER_DAY).unwrap();

    assert_eq!(h.hub.count_of_projects(), 1);
}

#[test]
fn scenario_b_fresh_project_details() {
    let h = harness(&[]);
    let project = h
        .hub
        .create_project(addr("b"), 20 * ETHER, 2 * SECONDS_PER_DAY)
        .unwrap();

    let (beneficiary, goal, seconds_left, is_open, raised) =
        project.complete_details().as_tuple();

    assert_eq!(beneficiary, addr("b"));
    assert_eq!(goal, 20 * ETHER);
    assert_eq!(seconds_left, 172_800);
    assert!(is_open);
    assert_eq!(raised, 0);
}

#[test]
fn scenario_c_partial_funding() {
    let h = harness(&["c"]);
    let project = h
        .hub
        .create_project(addr("b"), 20 * ETHER, 2 * SECONDS_PER_DAY)
        .unwrap();
    h.clock.advance_secs(3_600);

    project.fund(addr("c"), 5 * ETHER).unwrap();

    let (beneficiary, goal, seconds_left, is_open, raised) =
        project.complete_details().as_tuple();
    assert_eq!(beneficiary, addr("b"));
    assert_eq!(goal, 20 * ETHER);
    assert!((86_400..=172_800).contains(&seconds_left));
    assert!(is_open);
    assert_eq!(raised, 5 * ETHER);
    assert_eq!(project.escrow_balance(), 5 * ETHER);
}

#[test]
fn scenario_d_exact_goal_pays_out_and_closes() {
    let h = harness(&["funder"]);
    let project = h
        .hub
        .create_project(addr("beneficiary"), 15, 5 * SECONDS_PER_DAY)
        .unwrap();

    let outcome = project.fund(addr("funder"), 15).unwrap();
    assert!(outcome.paid_out());

    assert_eq!(
        project.complete_details().as_tuple(),
        (addr("beneficiary"), 15, 432_000, false, 0)
    );
    assert_eq!(h.ledger.balance_of(&addr("beneficiary")), 15);
    assert_eq!(project.raised_amount(), 15);

    let err = project.fund(addr("funder"), 2).unwrap_err();
    assert!(matches!(
        err,
        ContractError::FundingRejected(FundingRejection::AlreadyPaidOut { .. })
    ));
    assert_eq!(
        project.complete_details().as_tuple(),
        (addr("beneficiary"), 15, 432_000, false, 0)
    );
    assert_eq!(h.ledger.balance_of(&addr("beneficiary")), 15);
}

#[test]
fn scenario_e_refund_after_expiry() {
    let h = harness(&["c"]);
    let project = h.hub.create_project(addr("b"), 20 * ETHER, 10).unwrap();
    project.fund(addr("c"), 3 * ETHER).unwrap();

    h.clock.advance_secs(11);

    assert_eq!(project.withdraw(addr("c")).unwrap(), 3 * ETHER);
    assert_eq!(h.ledger.balance_of(&addr("c")), 100 * ETHER);

    let err = project.withdraw(addr("c")).unwrap_err();
    assert!(matches!(
        err,
        ContractError::WithdrawalRejected(WithdrawalRejection::NoContribution { .. })
    ));
}

// ---------------------------------------------------------------------------
// Invariants
// ---------------------------------------------------------------------------

#[test]
fn raised_never_exceeds_goal() {
    let h = harness(&["x", "y", "z"]);
    let project = h.hub.create_project(addr("b"), 100, 60).unwrap();
    let attempts: [(&str, Amount); 9] = [
        ("x", 30),
        ("y", 80),
        ("z", 50),
        ("x", 0),
        ("y", 40),
        ("z", 31),
        ("x", 30),
        ("y", 1),
        ("z", 19),
    ];

    for (who, amount) in attempts {
        let _ = project.fund(addr(who), amount);
        assert!(project.raised_amount() <= project.goal_amount());
    }
    assert_eq!(project.raised_amount(), 100);
    assert!(project.payout_done());
}

#[test]
fn contributions_sum_to_raised_through_refunds() {
    let names = ["p", "q", "r"];
    let h = harness(&names);
    let project = h.hub.create_project(addr("b"), 1_000, 60).unwrap();
    project.fund(addr("p"), 100).unwrap();
    project.fund(addr("q"), 200).unwrap();
    project.fund(addr("p"), 50).unwrap();
    project.fund(addr("r"), 25).unwrap();

    let sum = || -> Amount {
        names
            .iter()
            .map(|n| project.contribution_of(&addr(n)))
            .sum()
    };
    assert_eq!(sum(), project.raised_amount());
    assert_eq!(project.escrow_balance(), project.raised_amount());

    h.clock.advance_secs(61);
    project.withdraw(addr("q")).unwrap();

    assert_eq!(sum(), project.raised_amount());
    assert_eq!(project.raised_amount(), 175);
    assert_eq!(project.refunded_total(), 200);
    assert_eq!(project.escrow_balance(), 175);
    assert_eq!(project.contributor_count(), 3);
}

#[test]
fn expiry_does_not_close_the_project() {
    let h = harness(&["c"]);
    let project = h.hub.create_project(addr("b"), 100, 60).unwrap();
    h.clock.advance_secs(120);

    assert_eq!(project.status(), ProjectStatus::Expired);
    assert!(project.is_open());
    assert_eq!(project.complete_details().seconds_until_expiry, 0);

    // Funding is not gated on the deadline.
    project.fund(addr("c"), 10).unwrap();
    assert_eq!(project.withdraw(addr("c")).unwrap(), 10);
}

#[test]
fn withdraw_without_contribution_rejected() {
    let h = harness(&[]);
    let project = h.hub.create_project(addr("b"), 100, 1).unwrap();
    h.clock.advance_secs(2);

    let err = project.withdraw(addr("stranger")).unwrap_err();
    assert_eq!(
        err,
        ContractError::from(WithdrawalRejection::NoContribution {
            contributor: addr("stranger")
        })
    );
}

#[test]
fn payout_happens_exactly_once() {
    let h = harness(&["x", "y"]);
    let project = h.hub.create_project(addr("b"), 10, 60).unwrap();
    project.fund(addr("x"), 4).unwrap();
    project.fund(addr("y"), 6).unwrap();
    let _ = project.fund(addr("x"), 1);
    h.clock.advance_secs(61);
    let _ = project.withdraw(addr("x"));

    let payouts: Vec<_> = h
        .ledger
        .receipts_for(&addr("b"))
        .into_iter()
        .filter(|r| r.from == project.address())
        .collect();
    assert_eq!(payouts.len(), 1);
    assert_eq!(payouts[0].amount, 10);
    assert_eq!(project.payout_receipt().as_ref(), Some(&payouts[0]));
}

#[test]
fn projects_are_independent() {
    let h = harness(&["c"]);
    let first = h.hub.create_project(addr("b1"), 10, 60).unwrap();
    let second = h.hub.create_project(addr("b2"), 10, 60).unwrap();

    first.fund(addr("c"), 10).unwrap();

    assert!(first.payout_done());
    assert!(!second.payout_done());
    second.fund(addr("c"), 3).unwrap();
    assert_eq!(second.raised_amount(), 3);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[test]
fn hub_snapshot_restores_through_json() {
    let h = harness(&["c", "d"]);
    let open = h.hub.create_project(addr("b"), 100, 60).unwrap();
    let done = h.hub.create_project(addr("b"), 10, 60).unwrap();
    open.fund(addr("c"), 40).unwrap();
    done.fund(addr("d"), 10).unwrap();

    let json = serde_json::to_string(&h.hub.snapshot()).unwrap();
    let snapshot: HubSnapshot = serde_json::from_str(&json).unwrap();
    let restored = FundingHub::restore(snapshot, h.ledger.clone(), h.clock.clone()).unwrap();

    assert_eq!(restored.get_all_projects(), h.hub.get_all_projects());
    let open_again = restored.project(&open.address()).unwrap();
    assert_eq!(open_again.complete_details(), open.complete_details());
    assert_eq!(open_again.contribution_of(&addr("c")), 40);
    assert!(restored.project(&done.address()).unwrap().payout_done());

    // New projects continue the address sequence.
    let next = restored.create_project(addr("b"), 5, 60).unwrap();
    assert_eq!(next.address(), Address::derive_project(&addr("hub"), 2));
    assert!(h.clock.now() < next.expiry_at());
}
