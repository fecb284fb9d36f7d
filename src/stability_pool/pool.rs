//! The Stability Pool.
//!
//! `StabilityPool` ties the accumulator, the snapshot store and the
//! collaborators together. Every mutating operation runs in three phases:
//! validation (no side effects), a body that may touch the accumulator and
//! the ledgers, and a commit that writes the depositor's record. If the body
//! fails the accumulator is restored to its checkpoint and no event is
//! recorded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::core::collateral::{CollateralId, CollateralRegistry};
use crate::core::config::PoolParams;
use crate::core::ledger::PoolLedger;
use crate::error::{Error, Result};
use crate::events::{EventLog, PoolEvent};
use crate::stability_pool::accumulator::GlobalAccumulator;
use crate::stability_pool::deposits::DepositController;
use crate::stability_pool::offset::{OffsetEngine, Transition};
use crate::stability_pool::rewards::{RewardDriver, RewardSource, TickOutcome};
use crate::stability_pool::snapshot::{DepositRecord, DepositSnapshotStore};
use crate::utils::crypto::{DepositorId, Hash};
use crate::utils::math::{abs_diff, safe_add, safe_sub, Decimal18};
use crate::utils::validation::{
    validate_balance, validate_min_deposit, validate_non_zero, validate_offset_capacity,
};

// ═══════════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Lifetime counters of a pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolTotals {
    /// Offsets absorbed
    pub liquidations_absorbed: u64,
    /// Debt cancelled by offsets
    pub debt_absorbed: Decimal18,
    /// Collateral received by offsets, by type
    pub collateral_absorbed: BTreeMap<CollateralId, Decimal18>,
    /// Emissions folded into G
    pub rewards_distributed: Decimal18,
    /// Emissions dropped because the pool was empty
    pub emissions_discarded: Decimal18,
}

/// Everything that defines a pool apart from its collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Accounting parameters
    pub params: PoolParams,
    /// Registered collateral types
    pub collaterals: CollateralRegistry,
    /// Product-sum accumulator
    pub accumulator: GlobalAccumulator,
    /// Deposit records
    pub deposits: DepositSnapshotStore,
    /// Lifetime counters
    pub totals: PoolTotals,
}

impl PoolState {
    /// Empty state for the given parameters
    pub fn new(params: PoolParams) -> Self {
        Self {
            accumulator: GlobalAccumulator::new(params.scale_factor),
            params,
            collaterals: CollateralRegistry::new(),
            deposits: DepositSnapshotStore::new(),
            totals: PoolTotals::default(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTCOMES
// ═══════════════════════════════════════════════════════════════════════════════

/// What a depositor operation moved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositorReceipt {
    /// Depositor
    pub depositor: DepositorId,
    /// Debt tokens moved into the pool
    pub deposited: Decimal18,
    /// Debt tokens returned to the depositor
    pub withdrawn: Decimal18,
    /// Deposit after the operation
    pub new_deposit: Decimal18,
    /// Deposit lost to offsets since the previous snapshot
    pub debt_loss: Decimal18,
    /// Collateral paid, by type
    pub collateral_paid: BTreeMap<CollateralId, Decimal18>,
    /// Reward paid
    pub reward_paid: Decimal18,
}

/// Summary of an absorbed offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetReport {
    /// Debt cancelled
    pub debt: Decimal18,
    /// Loss per unit staked
    pub loss_per_unit: Decimal18,
    /// P after the offset
    pub p: Decimal18,
    /// Epoch after the offset
    pub epoch: u64,
    /// Scale after the offset
    pub scale: u64,
    /// State transition
    pub transition: Transition,
    /// Total deposits after the offset
    pub total_deposits: Decimal18,
}

/// Result of an offset call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OffsetOutcome {
    /// Empty pool or zero debt, no loss applied
    Skipped,
    /// Offset absorbed by the pool
    Absorbed(OffsetReport),
}

/// Pool statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatistics {
    /// Total deposits
    pub total_deposits: Decimal18,
    /// Depositors with a record
    pub depositor_count: u64,
    /// Current epoch
    pub epoch: u64,
    /// Current scale
    pub scale: u64,
    /// Running product
    pub p: Decimal18,
    /// Lifetime counters
    pub totals: PoolTotals,
}

/// Result of comparing `total_deposits` against every depositor's balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConservationReport {
    /// Tracked total
    pub total_deposits: Decimal18,
    /// Sum of compounded deposits
    pub sum_compounded: Decimal18,
    /// Depositors visited
    pub depositors: usize,
}

impl ConservationReport {
    /// Absolute gap between the tracked total and the sum
    pub fn discrepancy(&self) -> Decimal18 {
        abs_diff(self.total_deposits, self.sum_compounded)
    }

    /// True when the depositors never hold more than the pool tracks
    pub fn is_conservative(&self) -> bool {
        self.sum_compounded <= self.total_deposits
    }
}

struct Pending {
    compounded: Decimal18,
    debt_loss: Decimal18,
    gains: BTreeMap<CollateralId, Decimal18>,
    reward: Decimal18,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY POOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Product-sum Stability Pool over a ledger `L` and reward source `R`
#[derive(Debug, Clone)]
pub struct StabilityPool<L, R> {
    state: PoolState,
    ledger: L,
    rewards: R,
    events: EventLog,
}

impl<L: PoolLedger, R: RewardSource> StabilityPool<L, R> {
    /// Create an empty pool
    pub fn new(params: PoolParams, ledger: L, rewards: R) -> Result<Self> {
        Self::from_state(PoolState::new(params), ledger, rewards)
    }

    /// Resume a pool from saved state
    pub fn from_state(state: PoolState, ledger: L, rewards: R) -> Result<Self> {
        state.params.validate()?;
        if state.params.scale_factor != state.accumulator.scale_factor() {
            return Err(Error::InvariantViolation(format!(
                "accumulator scale factor {} does not match parameters {}",
                state.accumulator.scale_factor(),
                state.params.scale_factor
            )));
        }
        let events = EventLog::new(state.params.max_event_history);
        Ok(Self {
            state,
            ledger,
            rewards,
            events,
        })
    }

    /// Accept a new collateral type
    pub fn register_collateral(&mut self, id: CollateralId) -> Result<()> {
        self.state.collaterals.register(id.clone())?;
        info!(collateral = %id, "collateral registered");
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEPOSITOR OPERATIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Add `amount` to a depositor's deposit.
    ///
    /// Pending collateral gains and reward are paid out first, then the
    /// deposit is rewritten at `compounded + amount`.
    pub fn provide(&mut self, depositor: &DepositorId, amount: Decimal18) -> Result<DepositorReceipt> {
        validate_non_zero(amount)?;
        validate_balance(amount, self.ledger.debt_balance_of(depositor))?;

        let compounded = self.get_compounded_deposit(depositor)?;
        let new_deposit = safe_add(compounded, amount)?;
        validate_min_deposit(new_deposit, self.state.params.min_deposit)?;

        self.transact("provide", |pool, events| {
            pool.issue_and_tick(events)?;
            let pending = pool.pending(depositor)?;

            pool.ledger.pull_deposit(depositor, amount)?;
            pool.pay_pending(depositor, &pending, events)?;
            pool.state.accumulator.increase_total(amount)?;

            pool.write_record(depositor, new_deposit, events);
            events.push(PoolEvent::TotalDepositsUpdated {
                total: pool.state.accumulator.total_deposits(),
            });

            info!(depositor = %depositor, amount = %amount, deposit = %new_deposit, "deposit provided");
            Ok(DepositorReceipt {
                depositor: *depositor,
                deposited: amount,
                withdrawn: Decimal18::ZERO,
                new_deposit,
                debt_loss: pending.debt_loss,
                collateral_paid: pending.gains,
                reward_paid: pending.reward,
            })
        })
    }

    /// Withdraw up to `requested` from a depositor's compounded deposit.
    ///
    /// Requests beyond the compounded deposit are capped. A zero request only
    /// pays out pending gains.
    pub fn withdraw(&mut self, depositor: &DepositorId, requested: Decimal18) -> Result<DepositorReceipt> {
        let compounded = match self.state.deposits.get(depositor) {
            Some(record) => DepositController::compounded_deposit(&self.state.accumulator, record)?,
            None => Decimal18::ZERO,
        };
        if compounded.is_zero() {
            return Err(Error::NoActiveDeposit(depositor.to_string()));
        }

        self.transact("withdraw", |pool, events| {
            pool.issue_and_tick(events)?;
            let pending = pool.pending(depositor)?;

            let total = pool.state.accumulator.total_deposits();
            let withdrawn = requested.min(pending.compounded).min(total);
            let new_deposit = safe_sub(pending.compounded, withdrawn)?;

            if !withdrawn.is_zero() {
                pool.ledger.pay_out(depositor, withdrawn)?;
            }
            pool.pay_pending(depositor, &pending, events)?;
            pool.state.accumulator.decrease_total(withdrawn)?;

            pool.write_record(depositor, new_deposit, events);
            events.push(PoolEvent::TotalDepositsUpdated {
                total: pool.state.accumulator.total_deposits(),
            });

            info!(depositor = %depositor, withdrawn = %withdrawn, deposit = %new_deposit, "deposit withdrawn");
            Ok(DepositorReceipt {
                depositor: *depositor,
                deposited: Decimal18::ZERO,
                withdrawn,
                new_deposit,
                debt_loss: pending.debt_loss,
                collateral_paid: pending.gains,
                reward_paid: pending.reward,
            })
        })
    }

    /// Pay out pending gains and reward without changing the deposit.
    ///
    /// Works for depositors whose deposit compounded to zero, whose record
    /// is then removed.
    pub fn claim_gains(&mut self, depositor: &DepositorId) -> Result<DepositorReceipt> {
        if !self.state.deposits.contains(depositor) {
            return Err(Error::NoActiveDeposit(depositor.to_string()));
        }

        self.transact("claim_gains", |pool, events| {
            pool.issue_and_tick(events)?;
            let pending = pool.pending(depositor)?;

            pool.pay_pending(depositor, &pending, events)?;
            pool.write_record(depositor, pending.compounded, events);

            info!(depositor = %depositor, deposit = %pending.compounded, "gains claimed");
            Ok(DepositorReceipt {
                depositor: *depositor,
                deposited: Decimal18::ZERO,
                withdrawn: Decimal18::ZERO,
                new_deposit: pending.compounded,
                debt_loss: pending.debt_loss,
                collateral_paid: pending.gains,
                reward_paid: pending.reward,
            })
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIQUIDATION ABSORPTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Absorb `debt` from a liquidation and distribute `gains` pro rata.
    ///
    /// Pending issuance is folded into G first, so rewards accrued before the
    /// loss go to the depositors who bore it. The offset itself is skipped when
    /// the pool is empty or `debt` is zero; the caller routes the collateral
    /// elsewhere. `debt` above the total deposits is a `PoolCapacityViolation`
    /// and nothing changes.
    pub fn offset(&mut self, debt: Decimal18, gains: &[(CollateralId, Decimal18)]) -> Result<OffsetOutcome> {
        let merged = OffsetEngine::merge_gains(&self.state.collaterals, gains)?;
        validate_offset_capacity(debt, self.state.accumulator.total_deposits())?;

        self.transact("offset", |pool, events| {
            // Emissions accrued so far belong to the depositors before the loss
            pool.issue_and_tick(events)?;

            let total = pool.state.accumulator.total_deposits();
            if total.is_zero() || debt.is_zero() {
                warn!(debt = %debt, total_deposits = %total, "offset skipped");
                events.push(PoolEvent::OffsetSkipped { debt });
                return Ok(OffsetOutcome::Skipped);
            }

            let plan = OffsetEngine::plan(&pool.state.accumulator, debt, &merged)?;
            let (epoch, scale) = (pool.state.accumulator.epoch(), pool.state.accumulator.scale());

            pool.ledger.burn_offset(debt)?;
            for (collateral, gain) in merged.iter().filter(|(_, g)| !g.is_zero()) {
                pool.ledger.credit_pool(collateral, *gain)?;
            }

            // Lifetime counters before the accumulator so overflow aborts cleanly
            let totals = &mut pool.state.totals;
            totals.debt_absorbed = safe_add(totals.debt_absorbed, debt)?;
            for (collateral, gain) in &merged {
                let absorbed = totals.collateral_absorbed.entry(collateral.clone()).or_default();
                *absorbed = safe_add(*absorbed, *gain)?;
            }
            totals.liquidations_absorbed += 1;

            OffsetEngine::apply(&mut pool.state.accumulator, &plan);

            for update in &plan.collateral {
                events.push(PoolEvent::SUpdated {
                    collateral: update.collateral.clone(),
                    s: update.new_sum,
                    epoch,
                    scale,
                });
            }
            events.push(PoolEvent::PUpdated { p: plan.new_p });
            match plan.transition {
                Transition::EpochBump => {
                    info!(epoch = plan.new_epoch, "pool emptied, new epoch");
                    events.push(PoolEvent::EpochUpdated { epoch: plan.new_epoch });
                    events.push(PoolEvent::ScaleUpdated { scale: plan.new_scale });
                }
                Transition::ScaleBump => {
                    info!(scale = plan.new_scale, p = %plan.new_p, "running product rescaled");
                    events.push(PoolEvent::ScaleUpdated { scale: plan.new_scale });
                }
                Transition::None => {}
            }
            events.push(PoolEvent::TotalDepositsUpdated { total: plan.new_total });

            info!(
                debt = %debt,
                loss_per_unit = %plan.loss_per_unit,
                total_deposits = %plan.new_total,
                "offset absorbed"
            );
            Ok(OffsetOutcome::Absorbed(OffsetReport {
                debt,
                loss_per_unit: plan.loss_per_unit,
                p: plan.new_p,
                epoch: plan.new_epoch,
                scale: plan.new_scale,
                transition: plan.transition,
                total_deposits: plan.new_total,
            }))
        })
    }

    /// Fold an externally pushed emission into G
    pub fn tick(&mut self, emitted: Decimal18) -> Result<TickOutcome> {
        self.transact("tick", |pool, events| pool.apply_emission(emitted, events))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════════════

    /// Current balance of a depositor (zero without a record)
    pub fn get_compounded_deposit(&self, depositor: &DepositorId) -> Result<Decimal18> {
        match self.state.deposits.get(depositor) {
            Some(record) => DepositController::compounded_deposit(&self.state.accumulator, record),
            None => Ok(Decimal18::ZERO),
        }
    }

    /// Pending collateral gains for every registered type
    pub fn get_depositor_gains(&self, depositor: &DepositorId) -> Result<BTreeMap<CollateralId, Decimal18>> {
        match self.state.deposits.get(depositor) {
            Some(record) => DepositController::collateral_gains(
                &self.state.accumulator,
                record,
                &self.state.collaterals,
            ),
            None => Ok(self
                .state
                .collaterals
                .iter()
                .map(|id| (id.clone(), Decimal18::ZERO))
                .collect()),
        }
    }

    /// Pending reward from G
    pub fn get_depositor_reward_gain(&self, depositor: &DepositorId) -> Result<Decimal18> {
        match self.state.deposits.get(depositor) {
            Some(record) => DepositController::reward_gain(&self.state.accumulator, record),
            None => Ok(Decimal18::ZERO),
        }
    }

    /// Total deposits
    pub fn get_total_deposits(&self) -> Decimal18 {
        self.state.accumulator.total_deposits()
    }

    /// Current epoch
    pub fn epoch(&self) -> u64 {
        self.state.accumulator.epoch()
    }

    /// Current scale
    pub fn scale(&self) -> u64 {
        self.state.accumulator.scale()
    }

    /// Running product
    pub fn p(&self) -> Decimal18 {
        self.state.accumulator.p()
    }

    /// Accumulator
    pub fn accumulator(&self) -> &GlobalAccumulator {
        &self.state.accumulator
    }

    /// Stored record of a depositor
    pub fn deposit_record(&self, depositor: &DepositorId) -> Option<&DepositRecord> {
        self.state.deposits.get(depositor)
    }

    /// Depositors with a record
    pub fn depositors(&self) -> impl Iterator<Item = &DepositorId> {
        self.state.deposits.iter().map(|(id, _)| id)
    }

    /// Registered collateral types
    pub fn collaterals(&self) -> &CollateralRegistry {
        &self.state.collaterals
    }

    /// Parameters
    pub fn params(&self) -> &PoolParams {
        &self.state.params
    }

    /// Full state
    pub fn state(&self) -> &PoolState {
        &self.state
    }

    /// Ledger collaborator
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Ledger collaborator, mutably (minting in tests and simulations)
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Reward source
    pub fn rewards(&self) -> &R {
        &self.rewards
    }

    /// Reward source, mutably (funding, rate changes)
    pub fn rewards_mut(&mut self) -> &mut R {
        &mut self.rewards
    }

    /// Event log
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Get pool statistics
    pub fn statistics(&self) -> PoolStatistics {
        PoolStatistics {
            total_deposits: self.get_total_deposits(),
            depositor_count: self.state.deposits.len() as u64,
            epoch: self.epoch(),
            scale: self.scale(),
            p: self.p(),
            totals: self.state.totals.clone(),
        }
    }

    /// Walk every depositor and compare their balances with the tracked total.
    ///
    /// O(depositors); for audits and tests only.
    pub fn audit_conservation(&self) -> Result<ConservationReport> {
        let mut sum = Decimal18::ZERO;
        for (_, record) in self.state.deposits.iter() {
            let compounded = DepositController::compounded_deposit(&self.state.accumulator, record)?;
            sum = safe_add(sum, compounded)?;
        }
        Ok(ConservationReport {
            total_deposits: self.get_total_deposits(),
            sum_compounded: sum,
            depositors: self.state.deposits.len(),
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Serialize the pool state to bytes
    pub fn state_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.state).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Rebuild a pool from `state_bytes` output
    pub fn restore(bytes: &[u8], ledger: L, rewards: R) -> Result<Self> {
        let state: PoolState =
            bincode::deserialize(bytes).map_err(|e| Error::Deserialization(e.to_string()))?;
        Self::from_state(state, ledger, rewards)
    }

    /// SHA-256 fingerprint of the accumulator
    pub fn state_hash(&self) -> Result<Hash> {
        let bytes = bincode::serialize(&self.state.accumulator)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Hash::sha256(&bytes))
    }

    /// Split into state and collaborators
    pub fn into_parts(self) -> (PoolState, L, R) {
        (self.state, self.ledger, self.rewards)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INTERNALS
    // ═══════════════════════════════════════════════════════════════════════════

    fn transact<T, F>(&mut self, operation: &'static str, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self, &mut Vec<PoolEvent>) -> Result<T>,
    {
        let checkpoint = self.state.accumulator.checkpoint();
        let totals = self.state.totals.clone();
        let mut events = Vec::new();

        match body(self, &mut events) {
            Ok(value) => {
                self.events.extend(events);
                Ok(value)
            }
            Err(err) => {
                self.state.accumulator.restore(checkpoint);
                self.state.totals = totals;
                warn!(operation, error = %err, "operation rolled back");
                Err(err)
            }
        }
    }

    // Issuance drawn here is not returned to the source if the operation later rolls back
    fn issue_and_tick(&mut self, events: &mut Vec<PoolEvent>) -> Result<()> {
        let issued = self.rewards.issue()?;
        self.apply_emission(issued, events)?;
        Ok(())
    }

    fn apply_emission(&mut self, emitted: Decimal18, events: &mut Vec<PoolEvent>) -> Result<TickOutcome> {
        let outcome = RewardDriver::tick(&mut self.state.accumulator, emitted)?;
        match outcome {
            TickOutcome::Distributed { emitted, new_g, .. } => {
                let totals = &mut self.state.totals;
                totals.rewards_distributed = safe_add(totals.rewards_distributed, emitted)?;
                events.push(PoolEvent::GUpdated {
                    g: new_g,
                    epoch: self.state.accumulator.epoch(),
                    scale: self.state.accumulator.scale(),
                });
                debug!(emitted = %emitted, g = %new_g, "emission distributed");
            }
            TickOutcome::Discarded { emitted } => {
                let totals = &mut self.state.totals;
                totals.emissions_discarded = safe_add(totals.emissions_discarded, emitted)?;
                events.push(PoolEvent::EmissionDiscarded { amount: emitted });
                warn!(emitted = %emitted, "emission discarded, pool is empty");
            }
            TickOutcome::Idle => {}
        }
        Ok(outcome)
    }

    fn pending(&self, depositor: &DepositorId) -> Result<Pending> {
        let acc = &self.state.accumulator;
        let pending = match self.state.deposits.get(depositor) {
            Some(record) => {
                let compounded = DepositController::compounded_deposit(acc, record)?;
                let mut gains = DepositController::collateral_gains(acc, record, &self.state.collaterals)?;
                // Rounding dust may leave the pool a few wei short of the last claimant
                for (collateral, gain) in gains.iter_mut() {
                    *gain = (*gain).min(self.ledger.pool_collateral_balance(collateral));
                }
                Pending {
                    compounded,
                    debt_loss: record.raw_deposit.saturating_sub(compounded),
                    gains,
                    reward: DepositController::reward_gain(acc, record)?,
                }
            }
            None => Pending {
                compounded: Decimal18::ZERO,
                debt_loss: Decimal18::ZERO,
                gains: BTreeMap::new(),
                reward: Decimal18::ZERO,
            },
        };

        debug!(
            depositor = %depositor,
            compounded = %pending.compounded,
            reward = %pending.reward,
            "deposit materialized"
        );
        Ok(pending)
    }

    fn pay_pending(
        &mut self,
        depositor: &DepositorId,
        pending: &Pending,
        events: &mut Vec<PoolEvent>,
    ) -> Result<()> {
        let mut paid_any = false;
        for (collateral, gain) in pending.gains.iter().filter(|(_, g)| !g.is_zero()) {
            self.ledger.send_collateral(collateral, depositor, *gain)?;
            paid_any = true;
        }
        if paid_any || !pending.debt_loss.is_zero() {
            events.push(PoolEvent::GainsWithdrawn {
                depositor: *depositor,
                gains: pending.gains.clone(),
                debt_loss: pending.debt_loss,
            });
        }

        if !pending.reward.is_zero() {
            self.rewards.send(depositor, pending.reward)?;
            events.push(PoolEvent::RewardPaid {
                depositor: *depositor,
                amount: pending.reward,
            });
        }
        Ok(())
    }

    /// Last step of every depositor operation; infallible
    fn write_record(&mut self, depositor: &DepositorId, new_deposit: Decimal18, events: &mut Vec<PoolEvent>) {
        if new_deposit.is_zero() {
            self.state.deposits.remove(depositor);
            events.push(PoolEvent::DepositSnapshotUpdated {
                depositor: *depositor,
                p: Decimal18::ZERO,
                g: Decimal18::ZERO,
                epoch: 0,
                scale: 0,
            });
        } else {
            let record = DepositController::fresh_record(
                &self.state.accumulator,
                &self.state.collaterals,
                new_deposit,
            );
            events.push(PoolEvent::DepositSnapshotUpdated {
                depositor: *depositor,
                p: record.snapshot.p,
                g: record.snapshot.g,
                epoch: record.snapshot.epoch,
                scale: record.snapshot.scale,
            });
            self.state.deposits.insert(*depositor, record);
        }
        events.push(PoolEvent::UserDepositChanged {
            depositor: *depositor,
            new_deposit,
        });
    }
}
