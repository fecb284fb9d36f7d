//! Integration tests for the Stability Pool.
//!
//! These tests drive the public pool API end to end: deposits, offsets,
//! epoch and scale transitions, rewards, rollback and persistence.

use std::str::FromStr;

use rust_decimal::Decimal;

use stability_pool::prelude::*;
use stability_pool::stability_pool::pool::PoolState;
use stability_pool::storage::{FileStore, PoolStateStore};
use stability_pool::utils::math::abs_diff;

// ═══════════════════════════════════════════════════════════════════════════════
// TEST HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

type TestPool = StabilityPool<InMemoryLedger, ExternalRewards>;

fn units(n: u64) -> Decimal18 {
    Decimal18::from_integer(n)
}

fn amount(s: &str) -> Decimal18 {
    Decimal18::parse_units(s).unwrap()
}

fn coll_x() -> CollateralId {
    CollateralId::new("COLL_X").unwrap()
}

fn coll_y() -> CollateralId {
    CollateralId::new("COLL_Y").unwrap()
}

fn user(label: &str) -> DepositorId {
    DepositorId::from_label(label)
}

fn setup_pool(params: PoolParams, funded: &[&str]) -> TestPool {
    let mut ledger = InMemoryLedger::new();
    for label in funded {
        ledger.mint(&user(label), units(1_000_000)).unwrap();
    }
    let mut pool = StabilityPool::new(params, ledger, ExternalRewards::new()).unwrap();
    pool.register_collateral(coll_x()).unwrap();
    pool.register_collateral(coll_y()).unwrap();
    pool
}

fn default_pool() -> TestPool {
    setup_pool(PoolParams::default(), &["a", "b", "c", "d"])
}

// ═══════════════════════════════════════════════════════════════════════════════
// REFERENCE SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_half_offset_scenario() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(1000)).unwrap();

    pool.offset(units(500), &[(coll_x(), units(10))]).unwrap();

    assert_eq!(pool.get_compounded_deposit(&user("a")).unwrap(), units(500));
    let gains = pool.get_depositor_gains(&user("a")).unwrap();
    assert_eq!(gains[&coll_x()], units(10));
    assert!(gains[&coll_y()].is_zero());
    assert_eq!(pool.get_total_deposits(), units(500));
}

#[test]
fn test_full_depletion_scenario() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(1000)).unwrap();
    pool.provide(&user("b"), units(1000)).unwrap();
    let epoch_before = pool.epoch();

    let outcome = pool.offset(units(2000), &[(coll_x(), units(20))]).unwrap();
    match outcome {
        OffsetOutcome::Absorbed(report) => assert_eq!(report.transition, Transition::EpochBump),
        OffsetOutcome::Skipped => panic!("offset should be absorbed"),
    }

    assert!(pool.get_compounded_deposit(&user("a")).unwrap().is_zero());
    assert!(pool.get_compounded_deposit(&user("b")).unwrap().is_zero());
    assert_eq!(pool.epoch(), epoch_before + 1);
    assert_eq!(pool.scale(), 0);
    assert_eq!(pool.p(), Decimal18::ONE);
    assert!(pool.get_total_deposits().is_zero());

    // the depleting offset's collateral is still owed to the old depositors
    assert_eq!(pool.get_depositor_gains(&user("a")).unwrap()[&coll_x()], units(10));
    assert_eq!(pool.get_depositor_gains(&user("b")).unwrap()[&coll_x()], units(10));

    pool.provide(&user("c"), units(500)).unwrap();
    assert_eq!(pool.get_compounded_deposit(&user("c")).unwrap(), units(500));
    assert!(pool.get_depositor_gains(&user("c")).unwrap()[&coll_x()].is_zero());

    // a later offset only touches the new epoch
    pool.offset(units(100), &[(coll_x(), units(5))]).unwrap();
    assert_eq!(pool.get_compounded_deposit(&user("c")).unwrap(), units(400));
    assert_eq!(pool.get_depositor_gains(&user("c")).unwrap()[&coll_x()], units(5));
    assert_eq!(pool.get_depositor_gains(&user("a")).unwrap()[&coll_x()], units(10));
}

#[test]
fn test_scale_bump_matches_reference() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(1000)).unwrap();

    let debt = amount("999.999999");
    let outcome = pool.offset(debt, &[(coll_x(), units(1))]).unwrap();
    match outcome {
        OffsetOutcome::Absorbed(report) => assert_eq!(report.transition, Transition::ScaleBump),
        OffsetOutcome::Skipped => panic!("offset should be absorbed"),
    }
    assert_eq!(pool.scale(), 1);
    assert_eq!(pool.epoch(), 0);

    let compounded = pool.get_compounded_deposit(&user("a")).unwrap();
    let expected = Decimal::from(1000) - Decimal::from_str("999.999999").unwrap();
    let actual = compounded.to_decimal().unwrap();

    let relative_error = ((actual - expected) / expected).abs();
    assert!(
        relative_error <= Decimal::from_str("0.000000001").unwrap(),
        "compounded {} vs reference {}",
        actual,
        expected
    );
    assert_eq!(pool.get_total_deposits(), compounded);

    // the whole offset's collateral goes to the only depositor
    assert_eq!(pool.get_depositor_gains(&user("a")).unwrap()[&coll_x()], units(1));
}

#[test]
fn test_deposit_straddling_two_scale_bumps_is_zero() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(1000)).unwrap();

    // each offset leaves a 1e-9 fraction of the pool
    pool.offset(amount("999.999999"), &[]).unwrap();
    let remaining = pool.get_total_deposits();
    let debt = remaining.checked_sub(Decimal18::from_raw(1_000)).unwrap();
    pool.offset(debt, &[]).unwrap();

    assert_eq!(pool.scale(), 2);
    assert!(pool.get_compounded_deposit(&user("a")).unwrap().is_zero());
}

#[test]
fn test_depositor_after_scale_bump() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(1000)).unwrap();
    pool.offset(amount("999.999999"), &[]).unwrap();

    pool.provide(&user("b"), units(1000)).unwrap();
    pool.offset(amount("500.0000005"), &[(coll_x(), units(100))]).unwrap();

    // b holds almost the whole pool, loses half and collects almost all the collateral
    let b = pool.get_compounded_deposit(&user("b")).unwrap();
    let b_gain = pool.get_depositor_gains(&user("b")).unwrap()[&coll_x()];
    assert!(abs_diff(b, units(500)) <= Decimal18::from_raw(1_000));
    assert!(b_gain <= units(100));
    assert!(abs_diff(b_gain, amount("99.9999999")) <= Decimal18::from_raw(1_000));
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPOSITOR LIFECYCLE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_top_up_pays_pending_gains() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(1000)).unwrap();
    pool.offset(units(200), &[(coll_x(), units(4)), (coll_y(), units(2))]).unwrap();

    let receipt = pool.provide(&user("a"), units(200)).unwrap();
    assert_eq!(receipt.new_deposit, units(1000));
    assert_eq!(receipt.debt_loss, units(200));
    assert_eq!(receipt.collateral_paid[&coll_x()], units(4));
    assert_eq!(receipt.collateral_paid[&coll_y()], units(2));

    assert_eq!(pool.ledger().collateral_balance_of(&coll_x(), &user("a")), units(4));
    assert!(pool.ledger().pool_collateral_balance(&coll_x()).is_zero());
    assert!(pool.get_depositor_gains(&user("a")).unwrap()[&coll_x()].is_zero());
}

#[test]
fn test_withdraw_everything_after_offset() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(600)).unwrap();
    pool.provide(&user("b"), units(400)).unwrap();
    pool.offset(units(100), &[(coll_x(), units(10))]).unwrap();

    let a = pool.withdraw(&user("a"), units(1_000_000)).unwrap();
    assert_eq!(a.withdrawn, units(540));
    assert_eq!(a.collateral_paid[&coll_x()], units(6));

    let b = pool.withdraw(&user("b"), units(1_000_000)).unwrap();
    assert_eq!(b.withdrawn, units(360));
    assert_eq!(b.collateral_paid[&coll_x()], units(4));

    assert!(pool.get_total_deposits().is_zero());
    assert_eq!(pool.statistics().depositor_count, 0);
    assert!(pool.ledger().pool_debt_balance().is_zero());
    assert!(pool.ledger().pool_collateral_balance(&coll_x()).is_zero());
}

#[test]
fn test_caller_errors_have_no_side_effects() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(1000)).unwrap();
    pool.offset(units(10), &[(coll_x(), units(1))]).unwrap();

    let before = pool.state_bytes().unwrap();
    let ledger_before = pool.ledger().clone();
    let events_before = pool.events().total_recorded();

    let errors = vec![
        pool.provide(&user("a"), Decimal18::ZERO).unwrap_err(),
        pool.provide(&user("nobody"), units(1)).unwrap_err(),
        pool.withdraw(&user("b"), units(1)).unwrap_err(),
        pool.claim_gains(&user("b")).unwrap_err(),
        pool.offset(units(1), &[(CollateralId::new("COLL_Z").unwrap(), units(1))]).unwrap_err(),
    ];
    for err in &errors {
        assert!(err.is_recoverable(), "{err} should be recoverable");
    }

    assert_eq!(pool.state_bytes().unwrap(), before);
    assert_eq!(pool.ledger(), &ledger_before);
    assert_eq!(pool.events().total_recorded(), events_before);
}

#[test]
fn test_capacity_violation_rolls_back() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(1000)).unwrap();
    let before = pool.state_bytes().unwrap();
    let hash = pool.state_hash().unwrap();

    let err = pool.offset(units(1001), &[(coll_x(), units(5))]).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.code(), 3002);

    assert_eq!(pool.state_bytes().unwrap(), before);
    assert_eq!(pool.state_hash().unwrap(), hash);
    assert_eq!(pool.ledger().pool_debt_balance(), units(1000));
    assert!(pool.ledger().pool_collateral_balance(&coll_x()).is_zero());
}

#[test]
fn test_offset_skipped_on_empty_pool_or_zero_debt() {
    let mut pool = default_pool();
    assert_eq!(pool.offset(units(10), &[(coll_x(), units(1))]).unwrap(), OffsetOutcome::Skipped);

    pool.provide(&user("a"), units(10)).unwrap();
    let before = pool.state_bytes().unwrap();
    assert_eq!(pool.offset(Decimal18::ZERO, &[(coll_x(), units(1))]).unwrap(), OffsetOutcome::Skipped);
    assert_eq!(pool.state_bytes().unwrap(), before);
    assert_eq!(pool.events().filter_by_type("OffsetSkipped").len(), 2);
}

#[test]
fn test_minimum_deposit_floor() {
    let params = PoolParams::default().with_min_deposit(units(100));
    let mut pool = setup_pool(params, &["a"]);

    let err = pool.provide(&user("a"), units(99)).unwrap_err();
    assert!(matches!(err, Error::BelowMinimumDeposit { .. }));
    pool.provide(&user("a"), units(100)).unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWARDS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_rewards_follow_compounded_stake() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(1000)).unwrap();
    pool.tick(units(100)).unwrap();

    pool.provide(&user("b"), units(1000)).unwrap();
    pool.offset(units(1000), &[]).unwrap();
    pool.tick(units(100)).unwrap();

    // a: all of the first tick, half of the second
    assert_eq!(pool.get_depositor_reward_gain(&user("a")).unwrap(), units(150));
    assert_eq!(pool.get_depositor_reward_gain(&user("b")).unwrap(), units(50));

    pool.claim_gains(&user("a")).unwrap();
    assert_eq!(pool.rewards().balance_of(&user("a")), units(150));
    assert!(pool.get_depositor_reward_gain(&user("a")).unwrap().is_zero());
}

#[test]
fn test_reward_survives_epoch_bump() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(100)).unwrap();
    pool.tick(units(7)).unwrap();
    pool.offset(units(100), &[(coll_x(), units(3))]).unwrap();

    assert_eq!(pool.get_depositor_reward_gain(&user("a")).unwrap(), units(7));
    let receipt = pool.claim_gains(&user("a")).unwrap();
    assert_eq!(receipt.reward_paid, units(7));
    assert_eq!(receipt.collateral_paid[&coll_x()], units(3));
    assert!(pool.deposit_record(&user("a")).is_none());
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENTS AND STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_offset_events() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(100)).unwrap();
    pool.offset(units(100), &[(coll_x(), units(1))]).unwrap();

    assert_eq!(pool.events().filter_by_type("SUpdated").len(), 1);
    assert_eq!(pool.events().filter_by_type("EpochUpdated").len(), 1);
    match pool.events().last() {
        Some(PoolEvent::TotalDepositsUpdated { total }) => assert!(total.is_zero()),
        other => panic!("unexpected last event {other:?}"),
    }
    assert!(!pool.events().for_depositor(&user("a")).is_empty());
}

#[test]
fn test_statistics_accumulate() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(1000)).unwrap();
    pool.offset(units(100), &[(coll_x(), units(1))]).unwrap();
    pool.offset(units(50), &[(coll_x(), units(2)), (coll_y(), units(3))]).unwrap();

    let stats = pool.statistics();
    assert_eq!(stats.totals.liquidations_absorbed, 2);
    assert_eq!(stats.totals.debt_absorbed, units(150));
    assert_eq!(stats.totals.collateral_absorbed[&coll_x()], units(3));
    assert_eq!(stats.totals.collateral_absorbed[&coll_y()], units(3));
    assert_eq!(stats.total_deposits, units(850));
}

// ═══════════════════════════════════════════════════════════════════════════════
// PERSISTENCE
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_queries_do_not_mutate() {
    let mut pool = default_pool();
    pool.provide(&user("a"), units(300)).unwrap();
    pool.offset(units(33), &[(coll_x(), units(1))]).unwrap();
    let before = pool.state_bytes().unwrap();

    let first = pool.get_depositor_gains(&user("a")).unwrap();
    let second = pool.get_depositor_gains(&user("a")).unwrap();
    assert_eq!(first, second);
    pool.get_compounded_deposit(&user("a")).unwrap();
    pool.audit_conservation().unwrap();

    assert_eq!(pool.state_bytes().unwrap(), before);
}

#[test]
fn test_persist_and_resume_from_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut pool = default_pool();
    pool.provide(&user("a"), units(700)).unwrap();
    pool.provide(&user("b"), units(300)).unwrap();
    pool.offset(units(250), &[(coll_x(), units(5))]).unwrap();

    {
        let store = PoolStateStore::new(FileStore::new(temp_dir.path()).unwrap());
        store.save(pool.state()).unwrap();
    }

    let store = PoolStateStore::new(FileStore::new(temp_dir.path()).unwrap());
    let state: PoolState = store.load().unwrap().unwrap();
    let (_, ledger, rewards) = pool.into_parts();
    let mut resumed = StabilityPool::from_state(state, ledger, rewards).unwrap();

    assert_eq!(resumed.get_compounded_deposit(&user("a")).unwrap(), amount("525"));
    assert_eq!(resumed.get_compounded_deposit(&user("b")).unwrap(), amount("225"));
    assert_eq!(resumed.get_depositor_gains(&user("a")).unwrap()[&coll_x()], amount("3.5"));

    resumed.withdraw(&user("b"), units(1_000_000)).unwrap();
    assert_eq!(resumed.get_total_deposits(), amount("525"));
}

#[test]
fn test_independent_pools() {
    let mut first = default_pool();
    let mut second = default_pool();
    first.provide(&user("a"), units(100)).unwrap();
    second.provide(&user("a"), units(100)).unwrap();

    first.offset(units(50), &[]).unwrap();
    assert_eq!(first.get_compounded_deposit(&user("a")).unwrap(), units(50));
    assert_eq!(second.get_compounded_deposit(&user("a")).unwrap(), units(100));
}
