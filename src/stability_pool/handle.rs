//! Shared access to a pool.
//!
//! Mutations take the write lock for their whole duration, so concurrent
//! callers are serialized and every reader sees a state between operations.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::core::collateral::CollateralId;
use crate::core::ledger::PoolLedger;
use crate::error::{Error, Result};
use crate::stability_pool::pool::{DepositorReceipt, OffsetOutcome, PoolStatistics, StabilityPool};
use crate::stability_pool::rewards::{RewardSource, TickOutcome};
use crate::utils::crypto::DepositorId;
use crate::utils::math::Decimal18;

/// Cloneable, thread-safe handle to a `StabilityPool`
#[derive(Debug)]
pub struct PoolHandle<L, R> {
    inner: Arc<RwLock<StabilityPool<L, R>>>,
}

impl<L, R> Clone for PoolHandle<L, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: PoolLedger, R: RewardSource> PoolHandle<L, R> {
    /// Wrap a pool
    pub fn new(pool: StabilityPool<L, R>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(pool)),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StabilityPool<L, R>>> {
        self.inner.read().map_err(|_| Error::Lock)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StabilityPool<L, R>>> {
        self.inner.write().map_err(|_| Error::Lock)
    }

    /// See [`StabilityPool::provide`]
    pub fn provide(&self, depositor: &DepositorId, amount: Decimal18) -> Result<DepositorReceipt> {
        self.write()?.provide(depositor, amount)
    }

    /// See [`StabilityPool::withdraw`]
    pub fn withdraw(&self, depositor: &DepositorId, amount: Decimal18) -> Result<DepositorReceipt> {
        self.write()?.withdraw(depositor, amount)
    }

    /// See [`StabilityPool::claim_gains`]
    pub fn claim_gains(&self, depositor: &DepositorId) -> Result<DepositorReceipt> {
        self.write()?.claim_gains(depositor)
    }

    /// See [`StabilityPool::offset`]
    pub fn offset(&self, debt: Decimal18, gains: &[(CollateralId, Decimal18)]) -> Result<OffsetOutcome> {
        self.write()?.offset(debt, gains)
    }

    /// See [`StabilityPool::tick`]
    pub fn tick(&self, emitted: Decimal18) -> Result<TickOutcome> {
        self.write()?.tick(emitted)
    }

    /// Compounded deposit of a depositor
    pub fn compounded_deposit(&self, depositor: &DepositorId) -> Result<Decimal18> {
        self.read()?.get_compounded_deposit(depositor)
    }

    /// Pending collateral gains of a depositor
    pub fn depositor_gains(&self, depositor: &DepositorId) -> Result<BTreeMap<CollateralId, Decimal18>> {
        self.read()?.get_depositor_gains(depositor)
    }

    /// Total deposits
    pub fn total_deposits(&self) -> Result<Decimal18> {
        Ok(self.read()?.get_total_deposits())
    }

    /// Pool statistics
    pub fn statistics(&self) -> Result<PoolStatistics> {
        Ok(self.read()?.statistics())
    }

    /// Run `f` against the pool under the read lock
    pub fn with_read<T>(&self, f: impl FnOnce(&StabilityPool<L, R>) -> T) -> Result<T> {
        let pool = self.read()?;
        Ok(f(&pool))
    }

    /// Run `f` against the pool under the write lock
    pub fn with_write<T>(&self, f: impl FnOnce(&mut StabilityPool<L, R>) -> T) -> Result<T> {
        let mut pool = self.write()?;
        Ok(f(&mut pool))
    }
}
