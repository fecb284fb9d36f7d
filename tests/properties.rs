//! Property tests for the Stability Pool.
//!
//! Random sequences of deposits, withdrawals, offsets and emissions are
//! replayed against a pool and the accounting invariants checked after each.

use proptest::prelude::*;

use stability_pool::prelude::*;
use stability_pool::utils::math::{abs_diff, safe_add};

const DEPOSITORS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Provide { who: usize, units: u64 },
    Withdraw { who: usize, units: u64 },
    Offset { bps: u128, collateral: u64 },
    Tick { units: u64 },
}

fn coll() -> CollateralId {
    CollateralId::new("COLL_X").unwrap()
}

fn depositor(i: usize) -> DepositorId {
    DepositorId::from_label(&format!("depositor-{i}"))
}

fn new_pool() -> StabilityPool<InMemoryLedger, ExternalRewards> {
    let mut ledger = InMemoryLedger::new();
    for i in 0..DEPOSITORS {
        ledger.mint(&depositor(i), Decimal18::from_integer(1_000_000_000)).unwrap();
    }
    let mut pool = StabilityPool::new(PoolParams::default(), ledger, ExternalRewards::new()).unwrap();
    pool.register_collateral(coll()).unwrap();
    pool
}

fn fraction_of(total: Decimal18, bps: u128) -> Decimal18 {
    total
        .mul_div(Decimal18::from_raw(bps), Decimal18::from_raw(10_000))
        .unwrap()
}

// Strategy for a single pool operation
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..DEPOSITORS, 1u64..100_000).prop_map(|(who, units)| Op::Provide { who, units }),
        2 => (0..DEPOSITORS, 0u64..150_000).prop_map(|(who, units)| Op::Withdraw { who, units }),
        3 => (1u128..=10_000, 0u64..1_000).prop_map(|(bps, collateral)| Op::Offset { bps, collateral }),
        1 => (0u64..1_000).prop_map(|units| Op::Tick { units }),
    ]
}

// Strategy for a partial offset, as basis points of the pool
fn partial_bps_strategy() -> impl Strategy<Value = u128> {
    1u128..10_000
}

/// Apply an operation, ignoring rejected depositor calls. Returns the debt offset.
fn apply(pool: &mut StabilityPool<InMemoryLedger, ExternalRewards>, op: &Op) -> Decimal18 {
    match op {
        Op::Provide { who, units } => {
            let _ = pool.provide(&depositor(*who), Decimal18::from_integer(*units));
            Decimal18::ZERO
        }
        Op::Withdraw { who, units } => {
            match pool.withdraw(&depositor(*who), Decimal18::from_integer(*units)) {
                Ok(_) => {}
                Err(err) => assert!(err.is_recoverable(), "withdraw failed: {err}"),
            }
            Decimal18::ZERO
        }
        Op::Offset { bps, collateral } => {
            let debt = fraction_of(pool.get_total_deposits(), *bps);
            pool.offset(debt, &[(coll(), Decimal18::from_integer(*collateral))])
                .unwrap();
            debt
        }
        Op::Tick { units } => {
            pool.tick(Decimal18::from_integer(*units)).unwrap();
            Decimal18::ZERO
        }
    }
}

// Total deposits track the sum of compounded deposits and never fall short of it
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_conservation(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut pool = new_pool();
        let mut provided = Decimal18::ZERO;
        let mut offsets = 0u128;

        for op in &ops {
            if let Op::Provide { units, .. } = op {
                provided = safe_add(provided, Decimal18::from_integer(*units)).unwrap();
            }
            if let Op::Offset { .. } = op {
                offsets += 1;
            }
            apply(&mut pool, op);

            let report = pool.audit_conservation().unwrap();
            prop_assert!(
                report.is_conservative(),
                "depositors hold {} but the pool tracks {}",
                report.sum_compounded.raw(),
                report.total_deposits.raw()
            );
            let slack = (DEPOSITORS as u128) * (offsets + 1);
            let tolerance = safe_add(
                Decimal18::from_raw(slack),
                provided.mul_div(Decimal18::from_raw(1), Decimal18::from_raw(1_000_000_000_000)).unwrap(),
            ).unwrap();
            prop_assert!(
                report.discrepancy() <= tolerance,
                "total {} vs sum {} (tolerance {})",
                report.total_deposits.raw(),
                report.sum_compounded.raw(),
                tolerance.raw()
            );
        }
    }
}

// Without deposits or withdrawals, offsets never increase a deposit
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_monotonic_dilution(
        deposits in prop::collection::vec(1u64..1_000_000, DEPOSITORS),
        offsets in prop::collection::vec(partial_bps_strategy(), 1..20)
    ) {
        let mut pool = new_pool();
        for (i, units) in deposits.iter().enumerate() {
            pool.provide(&depositor(i), Decimal18::from_integer(*units)).unwrap();
        }

        let mut previous: Vec<Decimal18> = (0..DEPOSITORS)
            .map(|i| pool.get_compounded_deposit(&depositor(i)).unwrap())
            .collect();

        for bps in offsets {
            let debt = fraction_of(pool.get_total_deposits(), bps);
            pool.offset(debt, &[(coll(), Decimal18::from_integer(1))]).unwrap();

            for (i, prev) in previous.iter_mut().enumerate() {
                let now = pool.get_compounded_deposit(&depositor(i)).unwrap();
                prop_assert!(now <= *prev, "depositor {} grew from {} to {}", i, prev.raw(), now.raw());
                *prev = now;
            }
        }
    }
}

// A deposit twice as large loses and earns twice as much
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_proportional_fairness(
        base in 1u64..1_000_000,
        offsets in prop::collection::vec((partial_bps_strategy(), 0u64..10_000), 1..10),
        emission in 0u64..10_000
    ) {
        let mut pool = new_pool();
        let (a, b) = (depositor(0), depositor(1));
        pool.provide(&a, Decimal18::from_integer(base * 2)).unwrap();
        pool.provide(&b, Decimal18::from_integer(base)).unwrap();

        for (bps, collateral) in offsets {
            let debt = fraction_of(pool.get_total_deposits(), bps);
            pool.offset(debt, &[(coll(), Decimal18::from_integer(collateral))]).unwrap();
        }
        pool.tick(Decimal18::from_integer(emission)).unwrap();

        let two = Decimal18::from_raw(2);
        let twice = |v: Decimal18| v.mul_div(two, Decimal18::from_raw(1)).unwrap();
        let tolerance = Decimal18::from_raw(2);

        let deposit_a = pool.get_compounded_deposit(&a).unwrap();
        let deposit_b = pool.get_compounded_deposit(&b).unwrap();
        prop_assert!(abs_diff(deposit_a, twice(deposit_b)) <= tolerance);

        let gain_a = pool.get_depositor_gains(&a).unwrap()[&coll()];
        let gain_b = pool.get_depositor_gains(&b).unwrap()[&coll()];
        prop_assert!(abs_diff(gain_a, twice(gain_b)) <= tolerance);

        let reward_a = pool.get_depositor_reward_gain(&a).unwrap();
        let reward_b = pool.get_depositor_reward_gain(&b).unwrap();
        prop_assert!(abs_diff(reward_a, twice(reward_b)) <= tolerance);
    }
}

// The pool never owes more collateral than it received
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_collateral_never_overpaid(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let mut pool = new_pool();
        for op in &ops {
            apply(&mut pool, op);
        }

        let depositors: Vec<DepositorId> = pool.depositors().copied().collect();
        let mut owed = Decimal18::ZERO;
        for d in &depositors {
            owed = safe_add(owed, pool.get_depositor_gains(d).unwrap()[&coll()]).unwrap();
        }
        let held = pool.ledger().pool_collateral_balance(&coll());
        prop_assert!(
            owed <= safe_add(held, Decimal18::from_raw((DEPOSITORS * (ops.len() + 1)) as u128)).unwrap(),
            "owed {} but pool holds {}",
            owed.raw(),
            held.raw()
        );
    }
}

// Queries and rejected calls leave the state byte-identical
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_idempotent_materialization(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let mut pool = new_pool();
        for op in &ops {
            apply(&mut pool, op);
        }
        let before = pool.state_bytes().unwrap();

        for i in 0..DEPOSITORS {
            let first = pool.get_depositor_gains(&depositor(i)).unwrap();
            let second = pool.get_depositor_gains(&depositor(i)).unwrap();
            prop_assert_eq!(first, second);
            prop_assert_eq!(pool.provide(&depositor(i), Decimal18::ZERO), Err(Error::ZeroAmount));
        }

        prop_assert_eq!(pool.state_bytes().unwrap(), before);
    }
}
