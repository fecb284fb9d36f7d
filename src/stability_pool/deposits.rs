//! Lazy per-depositor reconciliation.
//!
//! Pure reads over a `DepositRecord` and the live `GlobalAccumulator`:
//!
//! - compounded deposit: `raw * P / snapP`, divided once more by the scale
//!   factor when one rescale happened since the snapshot, zero after two or
//!   more rescales or after an epoch change
//! - gains: `raw * (S[e][s] - snapS + S[e][s+1] / scale_factor) / (snapP * 1e18)`
//!   with `e` and `s` taken from the snapshot, so an epoch bump does not hide
//!   the collateral earned in the offset that caused it
//! - reward: the same read over `G`

use primitive_types::U256;
use std::collections::BTreeMap;

use crate::core::collateral::{CollateralId, CollateralRegistry};
use crate::error::{Error, Result};
use crate::stability_pool::accumulator::GlobalAccumulator;
use crate::stability_pool::snapshot::{DepositRecord, Snapshot};
use crate::utils::math::{mul_div, safe_sub, Decimal18};

/// Stateless deposit formulas
pub struct DepositController;

impl DepositController {
    /// Current balance of a deposit after every offset since its snapshot
    pub fn compounded_deposit(acc: &GlobalAccumulator, record: &DepositRecord) -> Result<Decimal18> {
        let snapshot = &record.snapshot;
        if record.raw_deposit.is_zero() || snapshot.epoch != acc.epoch() {
            return Ok(Decimal18::ZERO);
        }
        ensure_valid_product(snapshot)?;

        let scale_diff = acc.scale().checked_sub(snapshot.scale).ok_or_else(|| {
            Error::InvariantViolation(format!(
                "snapshot scale {} ahead of current scale {}",
                snapshot.scale,
                acc.scale()
            ))
        })?;

        let compounded = match scale_diff {
            0 => mul_div(record.raw_deposit.raw(), acc.p().raw(), snapshot.p.raw())?,
            1 => {
                let denominator = snapshot
                    .p
                    .raw()
                    .checked_mul(U256::from(acc.scale_factor()))
                    .ok_or_else(|| Error::overflow("snapshot P times scale factor"))?;
                mul_div(record.raw_deposit.raw(), acc.p().raw(), denominator)?
            }
            _ => U256::zero(),
        };

        Ok(Decimal18::from_u256(compounded))
    }

    /// Collateral accrued since the snapshot, for every registered type
    pub fn collateral_gains(
        acc: &GlobalAccumulator,
        record: &DepositRecord,
        registry: &CollateralRegistry,
    ) -> Result<BTreeMap<CollateralId, Decimal18>> {
        registry
            .iter()
            .map(|id| {
                let gain = Self::collateral_gain(acc, record, id)?;
                Ok((id.clone(), gain))
            })
            .collect()
    }

    /// Collateral of one type accrued since the snapshot
    pub fn collateral_gain(
        acc: &GlobalAccumulator,
        record: &DepositRecord,
        collateral: &CollateralId,
    ) -> Result<Decimal18> {
        let snapshot = &record.snapshot;
        let (epoch, scale) = (snapshot.epoch, snapshot.scale);
        gain_from_sums(
            acc,
            record,
            acc.sum_at(epoch, scale, collateral),
            snapshot.sum_for(collateral),
            acc.sum_at(epoch, scale + 1, collateral),
        )
    }

    /// Reward accrued since the snapshot
    pub fn reward_gain(acc: &GlobalAccumulator, record: &DepositRecord) -> Result<Decimal18> {
        let snapshot = &record.snapshot;
        let (epoch, scale) = (snapshot.epoch, snapshot.scale);
        gain_from_sums(
            acc,
            record,
            acc.reward_sum_at(epoch, scale),
            snapshot.g,
            acc.reward_sum_at(epoch, scale + 1),
        )
    }

    /// Fresh record at the current accumulator state
    pub fn fresh_record(
        acc: &GlobalAccumulator,
        registry: &CollateralRegistry,
        raw_deposit: Decimal18,
    ) -> DepositRecord {
        DepositRecord::new(raw_deposit, acc.snapshot(registry))
    }
}

fn ensure_valid_product(snapshot: &Snapshot) -> Result<()> {
    if snapshot.p.is_zero() {
        return Err(Error::InvariantViolation("snapshot with zero product".into()));
    }
    Ok(())
}

fn gain_from_sums(
    acc: &GlobalAccumulator,
    record: &DepositRecord,
    sum_at_snapshot_scale: Decimal18,
    snapshot_sum: Decimal18,
    sum_at_next_scale: Decimal18,
) -> Result<Decimal18> {
    if record.raw_deposit.is_zero() {
        return Ok(Decimal18::ZERO);
    }
    ensure_valid_product(&record.snapshot)?;

    let first = safe_sub(sum_at_snapshot_scale, snapshot_sum).map_err(|_| {
        Error::InvariantViolation(format!(
            "sum {} below snapshot {}",
            sum_at_snapshot_scale, snapshot_sum
        ))
    })?;
    let second = sum_at_next_scale.raw() / U256::from(acc.scale_factor());
    let delta = first
        .raw()
        .checked_add(second)
        .ok_or_else(|| Error::overflow("gain sum delta"))?;

    let denominator = record
        .snapshot
        .p
        .raw()
        .checked_mul(Decimal18::ONE.raw())
        .ok_or_else(|| Error::overflow("snapshot P times precision"))?;

    mul_div(record.raw_deposit.raw(), delta, denominator).map(Decimal18::from_u256)
}
