//! Input validation utilities.
//!
//! These checks run before any state is touched, so a failure here
//! always leaves the pool unchanged.

use crate::error::{Error, Result};
use crate::utils::constants::{DECIMAL_PRECISION, MAX_COLLATERAL_ID_LENGTH};
use crate::utils::math::Decimal18;

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: Decimal18) -> Result<()> {
    if amount.is_zero() {
        return Err(Error::ZeroAmount);
    }
    Ok(())
}

/// Validate that a resulting deposit respects the configured floor.
///
/// A zero floor disables the check.
pub fn validate_min_deposit(amount: Decimal18, minimum: Decimal18) -> Result<()> {
    if !minimum.is_zero() && amount < minimum {
        return Err(Error::BelowMinimumDeposit {
            amount: amount.to_string(),
            minimum: minimum.to_string(),
        });
    }
    Ok(())
}

/// Validate that a balance covers a required amount
pub fn validate_balance(required: Decimal18, available: Decimal18) -> Result<()> {
    if required > available {
        return Err(Error::InsufficientBalance {
            required: required.to_string(),
            available: available.to_string(),
        });
    }
    Ok(())
}

/// Validate that an offset fits inside the pool
pub fn validate_offset_capacity(debt: Decimal18, total_deposits: Decimal18) -> Result<()> {
    if debt > total_deposits {
        return Err(Error::PoolCapacityViolation {
            debt: debt.to_string(),
            total_deposits: total_deposits.to_string(),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETER VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a collateral symbol
pub fn validate_collateral_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::InvalidParameter {
            name: "collateral".into(),
            reason: "symbol cannot be empty".into(),
        });
    }

    if id.len() > MAX_COLLATERAL_ID_LENGTH {
        return Err(Error::InvalidParameter {
            name: "collateral".into(),
            reason: format!(
                "symbol length {} exceeds maximum {}",
                id.len(),
                MAX_COLLATERAL_ID_LENGTH
            ),
        });
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(Error::InvalidParameter {
            name: "collateral".into(),
            reason: format!("symbol {:?} contains invalid characters", id),
        });
    }

    Ok(())
}

/// Validate the rescale factor of the running product.
///
/// Must be a power of ten strictly between 1 and `DECIMAL_PRECISION`.
pub fn validate_scale_factor(scale_factor: u128) -> Result<()> {
    if scale_factor <= 1 || scale_factor >= DECIMAL_PRECISION {
        return Err(Error::InvalidParameter {
            name: "scale_factor".into(),
            reason: format!(
                "must be in (1, {}), got {}",
                DECIMAL_PRECISION, scale_factor
            ),
        });
    }

    let mut rest = scale_factor;
    while rest % 10 == 0 {
        rest /= 10;
    }
    if rest != 1 {
        return Err(Error::InvalidParameter {
            name: "scale_factor".into(),
            reason: format!("{} is not a power of ten", scale_factor),
        });
    }

    Ok(())
}
