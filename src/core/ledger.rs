//! External ledger collaborators.
//!
//! The pool never owns token balances itself. Debt-token movements go
//! through a `DebtLedger`, collateral movements through a
//! `CollateralLedger`. `InMemoryLedger` implements both for tests and
//! the simulator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::collateral::CollateralId;
use crate::error::{Error, Result};
use crate::utils::crypto::DepositorId;
use crate::utils::math::{safe_add, safe_sub, Decimal18};
use crate::utils::validation::validate_balance;

// ═══════════════════════════════════════════════════════════════════════════════
// LEDGER TRAITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Debt-token side of the pool
pub trait DebtLedger {
    /// Debt-token balance held by a depositor
    fn debt_balance_of(&self, owner: &DepositorId) -> Decimal18;

    /// Debt tokens backing the pool
    fn pool_debt_balance(&self) -> Decimal18;

    /// Move `amount` from a depositor into the pool.
    /// Fails with `InsufficientBalance` if the depositor cannot cover it.
    fn pull_deposit(&mut self, from: &DepositorId, amount: Decimal18) -> Result<()>;

    /// Move `amount` from the pool back to a depositor
    fn pay_out(&mut self, to: &DepositorId, amount: Decimal18) -> Result<()>;

    /// Cancel `amount` of pool backing against liquidated debt
    fn burn_offset(&mut self, amount: Decimal18) -> Result<()>;
}

/// Collateral side of the pool
pub trait CollateralLedger {
    /// Collateral of one type held by the pool
    fn pool_collateral_balance(&self, collateral: &CollateralId) -> Decimal18;

    /// Collateral of one type held by a depositor
    fn collateral_balance_of(&self, collateral: &CollateralId, owner: &DepositorId) -> Decimal18;

    /// Credit seized collateral into the pool
    fn credit_pool(&mut self, collateral: &CollateralId, amount: Decimal18) -> Result<()>;

    /// Send pool collateral to a depositor
    fn send_collateral(
        &mut self,
        collateral: &CollateralId,
        to: &DepositorId,
        amount: Decimal18,
    ) -> Result<()>;
}

/// Everything the pool consumes from its ledgers
pub trait PoolLedger: DebtLedger + CollateralLedger {}

impl<T: DebtLedger + CollateralLedger> PoolLedger for T {}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Balance book for the debt token and every collateral type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InMemoryLedger {
    /// Debt-token balances by holder
    debt_balances: BTreeMap<DepositorId, Decimal18>,
    /// Debt tokens held by the pool
    pool_debt: Decimal18,
    /// Debt tokens burned by offsets
    total_burned: Decimal18,
    /// Collateral balances by type, then holder
    collateral_balances: BTreeMap<CollateralId, BTreeMap<DepositorId, Decimal18>>,
    /// Collateral held by the pool, by type
    pool_collateral: BTreeMap<CollateralId, Decimal18>,
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint debt tokens to a holder
    pub fn mint(&mut self, to: &DepositorId, amount: Decimal18) -> Result<()> {
        if amount.is_zero() {
            return Err(Error::ZeroAmount);
        }
        let balance = self.debt_balance_of(to);
        self.debt_balances.insert(*to, safe_add(balance, amount)?);
        Ok(())
    }

    /// Debt tokens destroyed by offsets so far
    pub fn total_burned(&self) -> Decimal18 {
        self.total_burned
    }

    fn set_debt_balance(&mut self, owner: &DepositorId, balance: Decimal18) {
        if balance.is_zero() {
            self.debt_balances.remove(owner);
        } else {
            self.debt_balances.insert(*owner, balance);
        }
    }
}

impl DebtLedger for InMemoryLedger {
    fn debt_balance_of(&self, owner: &DepositorId) -> Decimal18 {
        self.debt_balances.get(owner).copied().unwrap_or_default()
    }

    fn pool_debt_balance(&self) -> Decimal18 {
        self.pool_debt
    }

    fn pull_deposit(&mut self, from: &DepositorId, amount: Decimal18) -> Result<()> {
        let balance = self.debt_balance_of(from);
        validate_balance(amount, balance)?;

        let pool_debt = safe_add(self.pool_debt, amount)?;
        self.set_debt_balance(from, safe_sub(balance, amount)?);
        self.pool_debt = pool_debt;
        Ok(())
    }

    fn pay_out(&mut self, to: &DepositorId, amount: Decimal18) -> Result<()> {
        let pool_debt = safe_sub(self.pool_debt, amount)
            .map_err(|_| Error::InvariantViolation(format!(
                "pool debt balance {} cannot cover payout {}",
                self.pool_debt, amount
            )))?;
        let balance = safe_add(self.debt_balance_of(to), amount)?;
        self.pool_debt = pool_debt;
        self.set_debt_balance(to, balance);
        Ok(())
    }

    fn burn_offset(&mut self, amount: Decimal18) -> Result<()> {
        let pool_debt = safe_sub(self.pool_debt, amount)
            .map_err(|_| Error::InvariantViolation(format!(
                "pool debt balance {} cannot cover offset {}",
                self.pool_debt, amount
            )))?;
        let burned = safe_add(self.total_burned, amount)?;
        self.pool_debt = pool_debt;
        self.total_burned = burned;
        Ok(())
    }
}

impl CollateralLedger for InMemoryLedger {
    fn pool_collateral_balance(&self, collateral: &CollateralId) -> Decimal18 {
        self.pool_collateral.get(collateral).copied().unwrap_or_default()
    }

    fn collateral_balance_of(&self, collateral: &CollateralId, owner: &DepositorId) -> Decimal18 {
        self.collateral_balances
            .get(collateral)
            .and_then(|holders| holders.get(owner))
            .copied()
            .unwrap_or_default()
    }

    fn credit_pool(&mut self, collateral: &CollateralId, amount: Decimal18) -> Result<()> {
        let balance = safe_add(self.pool_collateral_balance(collateral), amount)?;
        self.pool_collateral.insert(collateral.clone(), balance);
        Ok(())
    }

    fn send_collateral(
        &mut self,
        collateral: &CollateralId,
        to: &DepositorId,
        amount: Decimal18,
    ) -> Result<()> {
        let pool_balance = self.pool_collateral_balance(collateral);
        let remaining = safe_sub(pool_balance, amount).map_err(|_| {
            Error::InvariantViolation(format!(
                "pool {} balance {} cannot cover payout {}",
                collateral, pool_balance, amount
            ))
        })?;
        let holder = safe_add(self.collateral_balance_of(collateral, to), amount)?;

        self.pool_collateral.insert(collateral.clone(), remaining);
        self.collateral_balances
            .entry(collateral.clone())
            .or_default()
            .insert(*to, holder);
        Ok(())
    }
}
