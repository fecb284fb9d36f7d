//! Reward emission.
//!
//! `RewardDriver` turns an emitted amount into an increment of `G` for the
//! current (epoch, scale). Where the emission comes from is abstracted by
//! `RewardSource`; `CommunityIssuance` is a funded, time-based issuer and
//! `ExternalRewards` only pays out what was pushed through `tick`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::stability_pool::accumulator::GlobalAccumulator;
use crate::utils::constants::SECONDS_PER_WEEK;
use crate::utils::crypto::DepositorId;
use crate::utils::math::{mul_add_div_rem, safe_add, safe_sub, Decimal18};

// ═══════════════════════════════════════════════════════════════════════════════
// REWARD DRIVER
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a reward tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickOutcome {
    /// Nothing was emitted
    Idle,
    /// Emission added to G
    Distributed {
        /// Amount emitted
        emitted: Decimal18,
        /// Reward per unit staked, rounded down
        per_unit: Decimal18,
        /// New value of G at the current epoch and scale
        new_g: Decimal18,
    },
    /// Pool was empty, emission dropped
    Discarded {
        /// Amount that found no depositor
        emitted: Decimal18,
    },
}

/// Folds emissions into G
pub struct RewardDriver;

impl RewardDriver {
    /// Credit `emitted` to everyone currently in the pool.
    ///
    /// `G += floor((emitted * 1e18 + reward_error) / total) * P`
    pub fn tick(acc: &mut GlobalAccumulator, emitted: Decimal18) -> Result<TickOutcome> {
        if emitted.is_zero() {
            return Ok(TickOutcome::Idle);
        }

        let total = acc.total_deposits();
        if total.is_zero() {
            return Ok(TickOutcome::Discarded { emitted });
        }

        let (per_unit, remainder) = mul_add_div_rem(
            emitted.raw(),
            Decimal18::ONE.raw(),
            acc.last_reward_error().raw(),
            total.raw(),
        )?;
        let marginal = per_unit
            .checked_mul(acc.p().raw())
            .ok_or_else(|| Error::overflow("G increment"))?;
        let new_g = safe_add(acc.current_reward_sum(), Decimal18::from_u256(marginal))?;

        acc.set_current_reward_sum(new_g);
        acc.set_reward_error(Decimal18::from_u256(remainder));

        Ok(TickOutcome::Distributed {
            emitted,
            per_unit: Decimal18::from_u256(per_unit),
            new_g,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REWARD SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// External reward emitter consulted by depositor operations
pub trait RewardSource {
    /// Amount emitted since the previous call
    fn issue(&mut self) -> Result<Decimal18>;

    /// Pay a depositor's accrued reward
    fn send(&mut self, to: &DepositorId, amount: Decimal18) -> Result<()>;
}

/// Source for pools whose emissions are pushed through `tick`.
///
/// Issues nothing by itself and records what each depositor was paid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRewards {
    balances: BTreeMap<DepositorId, Decimal18>,
    total_sent: Decimal18,
}

impl ExternalRewards {
    /// Create an empty payout book
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewards received by a depositor
    pub fn balance_of(&self, depositor: &DepositorId) -> Decimal18 {
        self.balances.get(depositor).copied().unwrap_or_default()
    }

    /// Rewards paid so far
    pub fn total_sent(&self) -> Decimal18 {
        self.total_sent
    }
}

impl RewardSource for ExternalRewards {
    fn issue(&mut self) -> Result<Decimal18> {
        Ok(Decimal18::ZERO)
    }

    fn send(&mut self, to: &DepositorId, amount: Decimal18) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let balance = safe_add(self.balance_of(to), amount)?;
        self.total_sent = safe_add(self.total_sent, amount)?;
        self.balances.insert(*to, balance);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLOCK
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of the current time in seconds
pub trait Clock {
    /// Seconds since the Unix epoch
    fn now(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Manually advanced clock; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    /// Start at `now`
    pub fn new(now: u64) -> Self {
        Self(Arc::new(AtomicU64::new(now)))
    }

    /// Move forward by `secs`
    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to `now`
    pub fn set(&self, now: u64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMUNITY ISSUANCE
// ═══════════════════════════════════════════════════════════════════════════════

/// Persistent part of a `CommunityIssuance`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceState {
    /// Funds made available for issuance
    pub supply_cap: Decimal18,
    /// Issued so far
    pub total_issued: Decimal18,
    /// Paid to depositors so far
    pub total_sent: Decimal18,
    /// Emission rate per second
    pub rewards_per_second: Decimal18,
    /// Time of the last issuance (zero until first funded)
    pub last_update_time: u64,
    /// Rewards received by each depositor
    pub balances: BTreeMap<DepositorId, Decimal18>,
}

/// Funded, rate-limited reward issuer
#[derive(Debug, Clone)]
pub struct CommunityIssuance<C: Clock = SystemClock> {
    state: IssuanceState,
    clock: C,
}

impl CommunityIssuance<SystemClock> {
    /// Issuer on the wall clock
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for CommunityIssuance<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> CommunityIssuance<C> {
    /// Issuer on a custom clock
    pub fn with_clock(clock: C) -> Self {
        Self {
            state: IssuanceState::default(),
            clock,
        }
    }

    /// Resume from persisted state
    pub fn from_state(state: IssuanceState, clock: C) -> Self {
        Self { state, clock }
    }

    /// Persistent state
    pub fn state(&self) -> &IssuanceState {
        &self.state
    }

    /// Funds available for issuance
    pub fn supply_cap(&self) -> Decimal18 {
        self.state.supply_cap
    }

    /// Issued so far
    pub fn total_issued(&self) -> Decimal18 {
        self.state.total_issued
    }

    /// Time of the last issuance
    pub fn last_update_time(&self) -> u64 {
        self.state.last_update_time
    }

    /// Emission rate per second
    pub fn rewards_per_second(&self) -> Decimal18 {
        self.state.rewards_per_second
    }

    /// Rewards received by a depositor
    pub fn balance_of(&self, depositor: &DepositorId) -> Decimal18 {
        self.state.balances.get(depositor).copied().unwrap_or_default()
    }

    /// Increase the supply cap. The first funding starts the clock.
    pub fn add_funds(&mut self, amount: Decimal18) -> Result<()> {
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }
        self.state.supply_cap = safe_add(self.state.supply_cap, amount)?;
        if self.state.last_update_time == 0 {
            self.state.last_update_time = self.clock.now();
        }
        info!(amount = %amount, cap = %self.state.supply_cap, "issuance funds added");
        Ok(())
    }

    /// Withdraw unissued funds
    pub fn remove_funds(&mut self, amount: Decimal18) -> Result<()> {
        let available = self.state.supply_cap.saturating_sub(self.state.total_issued);
        if amount > available {
            return Err(Error::InsufficientIssuanceFunds {
                requested: amount.to_string(),
                available: available.to_string(),
            });
        }
        self.state.supply_cap = safe_sub(self.state.supply_cap, amount)?;
        info!(amount = %amount, cap = %self.state.supply_cap, "issuance funds removed");
        Ok(())
    }

    /// Set the emission rate from a weekly amount (truncated to whole raw units per second)
    pub fn set_weekly_distribution(&mut self, weekly: Decimal18) {
        let per_second = weekly.raw() / primitive_types::U256::from(SECONDS_PER_WEEK);
        self.state.rewards_per_second = Decimal18::from_u256(per_second);
        info!(weekly = %weekly, per_second = %self.state.rewards_per_second, "issuance rate set");
    }
}

impl<C: Clock> RewardSource for CommunityIssuance<C> {
    fn issue(&mut self) -> Result<Decimal18> {
        let state = &mut self.state;
        if state.last_update_time == 0 || state.total_issued >= state.supply_cap {
            return Ok(Decimal18::ZERO);
        }

        let now = self.clock.now();
        let elapsed = now.saturating_sub(state.last_update_time);
        let accrued = state
            .rewards_per_second
            .raw()
            .checked_mul(primitive_types::U256::from(elapsed))
            .map(Decimal18::from_u256)
            .ok_or_else(|| Error::overflow("issuance accrual"))?;

        let remaining = safe_sub(state.supply_cap, state.total_issued)?;
        let issuance = accrued.min(remaining);

        state.total_issued = safe_add(state.total_issued, issuance)?;
        state.last_update_time = now;

        debug!(issued = %issuance, elapsed, total_issued = %state.total_issued, "rewards issued");
        Ok(issuance)
    }

    fn send(&mut self, to: &DepositorId, amount: Decimal18) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let sent = safe_add(self.state.total_sent, amount)?;
        let balance = safe_add(self.balance_of(to), amount)?;
        self.state.total_sent = sent;
        self.state.balances.insert(*to, balance);
        Ok(())
    }
}
