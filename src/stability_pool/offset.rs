//! Liquidation absorption.
//!
//! An offset cancels `debt` against the pool's deposits and distributes the
//! seized collateral pro rata, in O(1) regardless of how many depositors
//! exist. The computation is split into a pure `plan` over a borrowed
//! accumulator and an infallible `apply`, so a failure at any point of the
//! computation leaves the accumulator untouched.
//!
//! Per collateral:
//!
//! ```text
//! gain_per_unit = floor((gain * 1e18 + coll_error) / total)
//! S[epoch][scale][c] += gain_per_unit * P
//! ```
//!
//! Debt:
//!
//! ```text
//! loss_per_unit = ceil((debt * 1e18 - loss_error) / total)   (1e18 when debt == total)
//! factor        = 1e18 - loss_per_unit
//! factor == 0          => epoch += 1, scale = 0, P = 1e18
//! P * factor / 1e18 <= scale_factor
//!                      => P = P * factor * scale_factor / 1e18, scale += 1
//! otherwise            => P = P * factor / 1e18
//! ```

use primitive_types::U256;
use std::collections::BTreeMap;

use crate::core::collateral::{CollateralId, CollateralRegistry};
use crate::error::{Error, Result};
use crate::stability_pool::accumulator::GlobalAccumulator;
use crate::utils::math::{
    mul_add_div_rem, mul_div, mul_sub_div_ceil, safe_add, safe_sub, Decimal18,
};
use crate::utils::validation::validate_offset_capacity;

/// How an offset moved the (epoch, scale) state
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Transition {
    /// Same epoch and scale
    None,
    /// P was rescaled and the scale advanced
    ScaleBump,
    /// The pool was emptied and a new epoch started
    EpochBump,
}

/// Per-collateral part of an offset plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollateralUpdate {
    /// Collateral type
    pub collateral: CollateralId,
    /// Total gain after merging duplicates
    pub gain: Decimal18,
    /// Gain per unit staked, rounded down
    pub gain_per_unit: Decimal18,
    /// New value of `S[epoch][scale][collateral]`
    pub new_sum: Decimal18,
    /// Remainder carried into the next offset
    pub new_error: Decimal18,
}

/// Fully computed effect of one offset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetPlan {
    /// Debt being cancelled
    pub debt: Decimal18,
    /// Collateral updates, in collateral order
    pub collateral: Vec<CollateralUpdate>,
    /// Debt loss per unit staked, rounded up
    pub loss_per_unit: Decimal18,
    /// Over-charge carried into the next offset
    pub new_debt_loss_error: Decimal18,
    /// P after the offset
    pub new_p: Decimal18,
    /// Epoch after the offset
    pub new_epoch: u64,
    /// Scale after the offset
    pub new_scale: u64,
    /// Total deposits after the offset
    pub new_total: Decimal18,
    /// Kind of state transition
    pub transition: Transition,
}

/// Stateless offset computation
pub struct OffsetEngine;

impl OffsetEngine {
    /// Merge `(collateral, gain)` pairs, rejecting unregistered types
    pub fn merge_gains(
        registry: &CollateralRegistry,
        gains: &[(CollateralId, Decimal18)],
    ) -> Result<BTreeMap<CollateralId, Decimal18>> {
        let mut merged: BTreeMap<CollateralId, Decimal18> = BTreeMap::new();
        for (collateral, gain) in gains {
            registry.ensure_known(collateral)?;
            let entry = merged.entry(collateral.clone()).or_default();
            *entry = safe_add(*entry, *gain)?;
        }
        Ok(merged)
    }

    /// Compute an offset against a non-empty pool.
    ///
    /// Callers skip offsets with zero debt or an empty pool before planning.
    pub fn plan(
        acc: &GlobalAccumulator,
        debt: Decimal18,
        gains: &BTreeMap<CollateralId, Decimal18>,
    ) -> Result<OffsetPlan> {
        let total = acc.total_deposits();
        validate_offset_capacity(debt, total)?;
        if total.is_zero() || debt.is_zero() {
            return Err(Error::InvalidParameter {
                name: "offset".into(),
                reason: "nothing to offset".into(),
            });
        }

        let precision = Decimal18::ONE.raw();
        let p = acc.p();

        // Collateral sums, against the P in force before the loss
        let mut collateral = Vec::with_capacity(gains.len());
        for (id, gain) in gains {
            let (per_unit, remainder) =
                mul_add_div_rem(gain.raw(), precision, acc.last_coll_error(id).raw(), total.raw())?;
            let marginal = per_unit
                .checked_mul(p.raw())
                .ok_or_else(|| Error::overflow(format!("S increment for {}", id)))?;
            let new_sum = safe_add(acc.current_sum(id), Decimal18::from_u256(marginal))?;

            collateral.push(CollateralUpdate {
                collateral: id.clone(),
                gain: *gain,
                gain_per_unit: Decimal18::from_u256(per_unit),
                new_sum,
                new_error: Decimal18::from_u256(remainder),
            });
        }

        // Debt loss
        let (loss_per_unit, new_debt_loss_error) = if debt == total {
            (precision, U256::zero())
        } else {
            mul_sub_div_ceil(debt.raw(), precision, acc.last_debt_loss_error().raw(), total.raw())?
        };
        if loss_per_unit > precision {
            return Err(Error::InvariantViolation(format!(
                "loss per unit {} exceeds one",
                loss_per_unit
            )));
        }
        let factor = precision - loss_per_unit;

        let scale_factor = U256::from(acc.scale_factor());
        let (new_p, new_epoch, new_scale, transition, new_debt_loss_error) = if factor.is_zero() {
            (precision, acc.epoch() + 1, 0, Transition::EpochBump, U256::zero())
        } else {
            let candidate = mul_div(p.raw(), factor, precision)?;
            if candidate <= scale_factor {
                let scaled_factor = factor
                    .checked_mul(scale_factor)
                    .ok_or_else(|| Error::overflow("rescaled product factor"))?;
                let rescaled = mul_div(p.raw(), scaled_factor, precision)?;
                (rescaled, acc.epoch(), acc.scale() + 1, Transition::ScaleBump, new_debt_loss_error)
            } else {
                (candidate, acc.epoch(), acc.scale(), Transition::None, new_debt_loss_error)
            }
        };

        if new_p.is_zero() {
            return Err(Error::InvariantViolation("running product reached zero".into()));
        }

        Ok(OffsetPlan {
            debt,
            collateral,
            loss_per_unit: Decimal18::from_u256(loss_per_unit),
            new_debt_loss_error: Decimal18::from_u256(new_debt_loss_error),
            new_p: Decimal18::from_u256(new_p),
            new_epoch,
            new_scale,
            new_total: safe_sub(total, debt)?,
            transition,
        })
    }

    /// Commit a plan computed against this same accumulator state
    pub fn apply(acc: &mut GlobalAccumulator, plan: &OffsetPlan) {
        // S increments land in the bucket that was current before the loss
        for update in &plan.collateral {
            acc.set_current_sum(&update.collateral, update.new_sum);
            acc.set_coll_error(&update.collateral, update.new_error);
        }
        acc.set_debt_loss_error(plan.new_debt_loss_error);
        acc.set_product(plan.new_p, plan.new_epoch, plan.new_scale);
        acc.set_total(plan.new_total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::DEFAULT_SCALE_FACTOR;

    fn weth() -> CollateralId {
        CollateralId::new("wETH").unwrap()
    }

    fn units(n: u64) -> Decimal18 {
        Decimal18::from_integer(n)
    }

    fn pool_with(total: Decimal18) -> GlobalAccumulator {
        let mut acc = GlobalAccumulator::new(DEFAULT_SCALE_FACTOR);
        acc.increase_total(total).unwrap();
        acc
    }

    fn gains(amount: Decimal18) -> BTreeMap<CollateralId, Decimal18> {
        [(weth(), amount)].into_iter().collect()
    }

    #[test]
    fn test_half_offset() {
        let mut acc = pool_with(units(1000));
        let plan = OffsetEngine::plan(&acc, units(500), &gains(units(10))).unwrap();

        assert_eq!(plan.loss_per_unit, Decimal18::from_raw(500_000_000_000_000_000));
        assert_eq!(plan.new_p, Decimal18::from_raw(500_000_000_000_000_000));
        assert_eq!(plan.transition, Transition::None);
        assert_eq!(plan.collateral[0].gain_per_unit, Decimal18::from_raw(10_000_000_000_000_000));
        assert!(plan.collateral[0].new_error.is_zero());

        OffsetEngine::apply(&mut acc, &plan);
        assert_eq!(acc.total_deposits(), units(500));
        assert_eq!(acc.p(), Decimal18::from_raw(500_000_000_000_000_000));
        // 1e16 per unit times P = 1e18
        assert_eq!(
            acc.current_sum(&weth()).raw(),
            U256::from(10_000_000_000_000_000u128) * U256::from(1_000_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_full_depletion_bumps_epoch() {
        let mut acc = pool_with(units(2000));
        let plan = OffsetEngine::plan(&acc, units(2000), &gains(units(20))).unwrap();
        assert_eq!(plan.transition, Transition::EpochBump);

        OffsetEngine::apply(&mut acc, &plan);
        assert_eq!(acc.epoch(), 1);
        assert_eq!(acc.scale(), 0);
        assert_eq!(acc.p(), Decimal18::ONE);
        assert!(acc.total_deposits().is_zero());
        // the depleting offset's gains stay readable in the old epoch
        assert!(!acc.sum_at(0, 0, &weth()).is_zero());
        assert!(acc.current_sum(&weth()).is_zero());
    }

    #[test]
    fn test_scale_bump() {
        let mut acc = pool_with(units(1000));
        // leaves 1e-7 of the pool: factor = 1e8 < 1e9
        let debt = safe_sub(units(1000), Decimal18::from_raw(100_000_000_000)).unwrap();
        let plan = OffsetEngine::plan(&acc, debt, &BTreeMap::new()).unwrap();

        assert_eq!(plan.transition, Transition::ScaleBump);
        OffsetEngine::apply(&mut acc, &plan);
        assert_eq!(acc.scale(), 1);
        assert_eq!(acc.p(), Decimal18::from_raw(100_000_000_000_000_000));
    }

    #[test]
    fn test_capacity_violation() {
        let acc = pool_with(units(1000));
        let err = OffsetEngine::plan(&acc, units(1001), &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::PoolCapacityViolation { .. }));
    }

    #[test]
    fn test_rounding_error_is_carried() {
        let mut acc = pool_with(units(3));
        let plan = OffsetEngine::plan(&acc, units(1), &gains(units(1))).unwrap();

        // 1/3 per unit: gain rounds down, loss rounds up
        assert_eq!(plan.collateral[0].gain_per_unit, Decimal18::from_raw(333_333_333_333_333_333));
        assert_eq!(plan.loss_per_unit, Decimal18::from_raw(333_333_333_333_333_334));
        assert!(!plan.collateral[0].new_error.is_zero());
        assert!(!plan.new_debt_loss_error.is_zero());

        OffsetEngine::apply(&mut acc, &plan);
        assert_eq!(acc.last_coll_error(&weth()), plan.collateral[0].new_error);
        assert_eq!(acc.last_debt_loss_error(), plan.new_debt_loss_error);
    }

    #[test]
    fn test_merge_gains() {
        let mut registry = CollateralRegistry::new();
        registry.register(weth()).unwrap();

        let merged = OffsetEngine::merge_gains(
            &registry,
            &[(weth(), units(1)), (weth(), units(2))],
        )
        .unwrap();
        assert_eq!(merged[&weth()], units(3));

        let reth = CollateralId::new("rETH").unwrap();
        assert!(matches!(
            OffsetEngine::merge_gains(&registry, &[(reth, units(1))]),
            Err(Error::UnknownCollateral(_))
        ));
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let acc = pool_with(units(1000));
        let before = acc.clone();
        let _ = OffsetEngine::plan(&acc, units(400), &gains(units(4))).unwrap();
        assert_eq!(acc, before);
    }
}
