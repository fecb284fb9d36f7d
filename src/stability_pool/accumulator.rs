//! Global product-sum accumulator.
//!
//! Holds the running product `P`, the per-(epoch, scale, collateral) sums `S`,
//! the per-(epoch, scale) reward sums `G`, the epoch and scale counters and
//! the pool's total deposits. Only the offset engine and the reward driver
//! mutate it. Depositor operations read it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::collateral::{CollateralId, CollateralRegistry};
use crate::error::{Error, Result};
use crate::stability_pool::snapshot::Snapshot;
use crate::utils::math::{safe_add, safe_sub, Decimal18};

type SumsByCollateral = BTreeMap<CollateralId, Decimal18>;

/// Process-wide accounting state of one pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAccumulator {
    /// Running product P, in (0, 1e18]
    p: Decimal18,
    /// Incremented when an offset empties the pool
    epoch: u64,
    /// Incremented when P is rescaled
    scale: u64,
    /// Rescale factor applied to P
    scale_factor: u128,
    /// S[epoch][scale][collateral]
    epoch_to_scale_to_sum: BTreeMap<u64, BTreeMap<u64, SumsByCollateral>>,
    /// G[epoch][scale]
    epoch_to_scale_to_g: BTreeMap<u64, BTreeMap<u64, Decimal18>>,
    /// Deposits currently in the pool
    total_deposits: Decimal18,
    /// Over-charge of the last rounded-up loss per unit, owed back next offset
    last_debt_loss_error: Decimal18,
    /// Remainders of the last collateral gain divisions
    last_coll_error: SumsByCollateral,
    /// Remainder of the last reward division
    last_reward_error: Decimal18,
}

/// Rollback point for one operation
#[derive(Debug, Clone)]
pub struct AccumulatorCheckpoint {
    p: Decimal18,
    epoch: u64,
    scale: u64,
    total_deposits: Decimal18,
    current_sums: Option<SumsByCollateral>,
    current_g: Option<Decimal18>,
    last_debt_loss_error: Decimal18,
    last_coll_error: SumsByCollateral,
    last_reward_error: Decimal18,
}

impl GlobalAccumulator {
    /// Fresh accumulator: P = 1, epoch 0, scale 0, all sums zero
    pub fn new(scale_factor: u128) -> Self {
        Self {
            p: Decimal18::ONE,
            epoch: 0,
            scale: 0,
            scale_factor,
            epoch_to_scale_to_sum: BTreeMap::new(),
            epoch_to_scale_to_g: BTreeMap::new(),
            total_deposits: Decimal18::ZERO,
            last_debt_loss_error: Decimal18::ZERO,
            last_coll_error: BTreeMap::new(),
            last_reward_error: Decimal18::ZERO,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // READS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Running product P
    pub fn p(&self) -> Decimal18 {
        self.p
    }

    /// Current epoch
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current scale
    pub fn scale(&self) -> u64 {
        self.scale
    }

    /// Rescale factor
    pub fn scale_factor(&self) -> u128 {
        self.scale_factor
    }

    /// Rescale factor as a raw fixed-point value
    pub fn scale_factor_decimal(&self) -> Decimal18 {
        Decimal18::from_raw(self.scale_factor)
    }

    /// Total deposits
    pub fn total_deposits(&self) -> Decimal18 {
        self.total_deposits
    }

    /// `S[epoch][scale][collateral]`, zero when never written
    pub fn sum_at(&self, epoch: u64, scale: u64, collateral: &CollateralId) -> Decimal18 {
        self.epoch_to_scale_to_sum
            .get(&epoch)
            .and_then(|scales| scales.get(&scale))
            .and_then(|sums| sums.get(collateral))
            .copied()
            .unwrap_or_default()
    }

    /// `G[epoch][scale]`, zero when never written
    pub fn reward_sum_at(&self, epoch: u64, scale: u64) -> Decimal18 {
        self.epoch_to_scale_to_g
            .get(&epoch)
            .and_then(|scales| scales.get(&scale))
            .copied()
            .unwrap_or_default()
    }

    /// `S` at the current epoch and scale
    pub fn current_sum(&self, collateral: &CollateralId) -> Decimal18 {
        self.sum_at(self.epoch, self.scale, collateral)
    }

    /// `G` at the current epoch and scale
    pub fn current_reward_sum(&self) -> Decimal18 {
        self.reward_sum_at(self.epoch, self.scale)
    }

    /// Pending debt-loss rounding error
    pub fn last_debt_loss_error(&self) -> Decimal18 {
        self.last_debt_loss_error
    }

    /// Pending collateral rounding error for one type
    pub fn last_coll_error(&self, collateral: &CollateralId) -> Decimal18 {
        self.last_coll_error.get(collateral).copied().unwrap_or_default()
    }

    /// Pending reward rounding error
    pub fn last_reward_error(&self) -> Decimal18 {
        self.last_reward_error
    }

    /// Snapshot of the current state for every registered collateral
    pub fn snapshot(&self, registry: &CollateralRegistry) -> Snapshot {
        Snapshot {
            p: self.p,
            s: registry
                .iter()
                .map(|id| (id.clone(), self.current_sum(id)))
                .collect(),
            g: self.current_reward_sum(),
            scale: self.scale,
            epoch: self.epoch,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // WRITES (offset engine, reward driver, deposit bookkeeping)
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add to total deposits
    pub fn increase_total(&mut self, amount: Decimal18) -> Result<()> {
        self.total_deposits = safe_add(self.total_deposits, amount)?;
        Ok(())
    }

    /// Subtract from total deposits
    pub fn decrease_total(&mut self, amount: Decimal18) -> Result<()> {
        self.total_deposits = safe_sub(self.total_deposits, amount).map_err(|_| {
            Error::InvariantViolation(format!(
                "total deposits {} cannot drop by {}",
                self.total_deposits, amount
            ))
        })?;
        Ok(())
    }

    pub(crate) fn set_current_sum(&mut self, collateral: &CollateralId, value: Decimal18) {
        self.epoch_to_scale_to_sum
            .entry(self.epoch)
            .or_default()
            .entry(self.scale)
            .or_default()
            .insert(collateral.clone(), value);
    }

    pub(crate) fn set_current_reward_sum(&mut self, value: Decimal18) {
        self.epoch_to_scale_to_g
            .entry(self.epoch)
            .or_default()
            .insert(self.scale, value);
    }

    pub(crate) fn set_coll_error(&mut self, collateral: &CollateralId, value: Decimal18) {
        if value.is_zero() {
            self.last_coll_error.remove(collateral);
        } else {
            self.last_coll_error.insert(collateral.clone(), value);
        }
    }

    pub(crate) fn set_debt_loss_error(&mut self, value: Decimal18) {
        self.last_debt_loss_error = value;
    }

    pub(crate) fn set_reward_error(&mut self, value: Decimal18) {
        self.last_reward_error = value;
    }

    pub(crate) fn set_product(&mut self, p: Decimal18, epoch: u64, scale: u64) {
        self.p = p;
        self.epoch = epoch;
        self.scale = scale;
    }

    pub(crate) fn set_total(&mut self, total: Decimal18) {
        self.total_deposits = total;
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ROLLBACK
    // ═══════════════════════════════════════════════════════════════════════════

    /// Capture everything a single operation can change.
    ///
    /// An operation only writes the sums of the current (epoch, scale) and
    /// can create buckets for later ones, so those are all that is saved.
    pub fn checkpoint(&self) -> AccumulatorCheckpoint {
        AccumulatorCheckpoint {
            p: self.p,
            epoch: self.epoch,
            scale: self.scale,
            total_deposits: self.total_deposits,
            current_sums: self
                .epoch_to_scale_to_sum
                .get(&self.epoch)
                .and_then(|scales| scales.get(&self.scale))
                .cloned(),
            current_g: self
                .epoch_to_scale_to_g
                .get(&self.epoch)
                .and_then(|scales| scales.get(&self.scale))
                .copied(),
            last_debt_loss_error: self.last_debt_loss_error,
            last_coll_error: self.last_coll_error.clone(),
            last_reward_error: self.last_reward_error,
        }
    }

    /// Return to a checkpoint taken earlier in the same operation
    pub fn restore(&mut self, checkpoint: AccumulatorCheckpoint) {
        let (epoch, scale) = (checkpoint.epoch, checkpoint.scale);

        // Drop buckets created after the checkpoint
        self.epoch_to_scale_to_sum.retain(|e, _| *e <= epoch);
        if let Some(scales) = self.epoch_to_scale_to_sum.get_mut(&epoch) {
            scales.retain(|s, _| *s < scale);
        }
        self.epoch_to_scale_to_g.retain(|e, _| *e <= epoch);
        if let Some(scales) = self.epoch_to_scale_to_g.get_mut(&epoch) {
            scales.retain(|s, _| *s < scale);
        }

        if let Some(sums) = checkpoint.current_sums {
            self.epoch_to_scale_to_sum
                .entry(epoch)
                .or_default()
                .insert(scale, sums);
        }
        if let Some(g) = checkpoint.current_g {
            self.epoch_to_scale_to_g
                .entry(epoch)
                .or_default()
                .insert(scale, g);
        }
        self.epoch_to_scale_to_sum.retain(|_, scales| !scales.is_empty());
        self.epoch_to_scale_to_g.retain(|_, scales| !scales.is_empty());

        self.p = checkpoint.p;
        self.epoch = epoch;
        self.scale = scale;
        self.total_deposits = checkpoint.total_deposits;
        self.last_debt_loss_error = checkpoint.last_debt_loss_error;
        self.last_coll_error = checkpoint.last_coll_error;
        self.last_reward_error = checkpoint.last_reward_error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::constants::DEFAULT_SCALE_FACTOR;

    fn weth() -> CollateralId {
        CollateralId::new("wETH").unwrap()
    }

    #[test]
    fn test_initial_state() {
        let acc = GlobalAccumulator::new(DEFAULT_SCALE_FACTOR);
        assert_eq!(acc.p(), Decimal18::ONE);
        assert_eq!(acc.epoch(), 0);
        assert_eq!(acc.scale(), 0);
        assert!(acc.total_deposits().is_zero());
        assert!(acc.current_sum(&weth()).is_zero());
        assert!(acc.current_reward_sum().is_zero());
    }

    #[test]
    fn test_decrease_total_below_zero() {
        let mut acc = GlobalAccumulator::new(DEFAULT_SCALE_FACTOR);
        acc.increase_total(Decimal18::ONE).unwrap();
        let err = acc.decrease_total(Decimal18::from_integer(2)).unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(acc.total_deposits(), Decimal18::ONE);
    }

    #[test]
    fn test_snapshot_lists_registered_collateral() {
        let mut registry = CollateralRegistry::new();
        registry.register(weth()).unwrap();

        let mut acc = GlobalAccumulator::new(DEFAULT_SCALE_FACTOR);
        acc.set_current_sum(&weth(), Decimal18::from_integer(3));

        let snapshot = acc.snapshot(&registry);
        assert_eq!(snapshot.sum_for(&weth()), Decimal18::from_integer(3));
        assert_eq!(snapshot.p, Decimal18::ONE);
    }

    #[test]
    fn test_checkpoint_restore_round_trip() {
        let mut acc = GlobalAccumulator::new(DEFAULT_SCALE_FACTOR);
        acc.increase_total(Decimal18::from_integer(10)).unwrap();
        acc.set_current_sum(&weth(), Decimal18::from_integer(1));
        let before = acc.clone();

        let checkpoint = acc.checkpoint();
        acc.set_current_sum(&weth(), Decimal18::from_integer(5));
        acc.set_current_reward_sum(Decimal18::from_integer(7));
        acc.set_product(Decimal18::ONE, 1, 0);
        acc.set_current_sum(&weth(), Decimal18::from_integer(9));
        acc.set_debt_loss_error(Decimal18::from_raw(3));
        acc.set_total(Decimal18::ZERO);

        acc.restore(checkpoint);
        assert_eq!(acc, before);
    }
}
