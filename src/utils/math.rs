//! Fixed-point arithmetic and mathematical utilities.
//!
//! Every pool quantity (deposits, gains, the running product `P`, the sums
//! `S` and `G`) is a `Decimal18`: an unsigned integer scaled by 10^18 and
//! backed by 256 bits. Products are formed in 512 bits so `mul_div` never
//! overflows in the intermediate; a result that does not fit 256 bits is an
//! `ArithmeticOverflow`. All divisions truncate unless the function name says
//! otherwise.

use primitive_types::{U256, U512};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::utils::constants::{DECIMALS, DECIMAL_PRECISION};

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT TYPE
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-point number with 18 decimal places precision.
///
/// Serializes as the raw scaled integer in base 10, e.g. one unit is
/// `"1000000000000000000"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Decimal18(U256);

impl Serialize for Decimal18 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Decimal18 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        U256::from_dec_str(&s)
            .map(Self)
            .map_err(|e| serde::de::Error::custom(format!("invalid raw amount {:?}: {:?}", s, e)))
    }
}

impl Decimal18 {
    /// Scale factor: 10^18
    pub const SCALE: u128 = DECIMAL_PRECISION;

    /// Zero value
    pub const ZERO: Self = Self(U256([0, 0, 0, 0]));

    /// One (1.0)
    pub const ONE: Self = Self(U256([DECIMAL_PRECISION as u64, 0, 0, 0]));

    /// Create from a raw scaled value
    pub fn from_raw(raw: u128) -> Self {
        Self(U256::from(raw))
    }

    /// Create from a raw 256-bit scaled value
    pub const fn from_u256(raw: U256) -> Self {
        Self(raw)
    }

    /// Create from a whole number of units (scales up)
    pub fn from_integer(value: u64) -> Self {
        Self(U256::from(value) * U256::from(Self::SCALE))
    }

    /// Get the raw underlying value
    pub fn raw(&self) -> U256 {
        self.0
    }

    /// Raw value as u128, if it fits
    pub fn raw_u128(&self) -> Option<u128> {
        if self.0.bits() > 128 {
            None
        } else {
            Some(self.0.low_u128())
        }
    }

    /// Whole units, truncated
    pub fn to_integer_floor(&self) -> U256 {
        self.0 / U256::from(Self::SCALE)
    }

    /// Check if value is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Saturating subtraction
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Minimum of two values
    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Maximum of two values
    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    /// `self * b / denominator`, truncated
    pub fn mul_div(self, b: Self, denominator: Self) -> Result<Self> {
        mul_div(self.0, b.0, denominator.0).map(Self)
    }

    /// Convert to a `rust_decimal::Decimal`, if it fits its 96-bit mantissa
    pub fn to_decimal(&self) -> Option<Decimal> {
        let raw = self.raw_u128()?;
        let raw = i128::try_from(raw).ok()?;
        Decimal::try_from_i128_with_scale(raw, DECIMALS).ok()
    }

    /// Convert from a non-negative `rust_decimal::Decimal`, truncating digits
    /// beyond the 18th decimal place
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(Error::InvalidParameter {
                name: "amount".into(),
                reason: format!("{} is negative", value),
            });
        }

        let mantissa = U256::from(value.mantissa().unsigned_abs());
        let scale = value.scale();

        let raw = if scale <= DECIMALS {
            mantissa
                .checked_mul(U256::exp10((DECIMALS - scale) as usize))
                .ok_or_else(|| Error::overflow("decimal conversion"))?
        } else {
            mantissa / U256::exp10((scale - DECIMALS) as usize)
        };

        Ok(Self(raw))
    }

    /// Parse a human-readable amount such as `"1000"` or `"0.25"`
    pub fn parse_units(s: &str) -> Result<Self> {
        let value = Decimal::from_str(s.trim()).map_err(|e| Error::InvalidParameter {
            name: "amount".into(),
            reason: format!("cannot parse {:?}: {}", s, e),
        })?;
        Self::from_decimal(value)
    }
}

impl fmt::Display for Decimal18 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = U256::from(Self::SCALE);
        let whole = self.0 / scale;
        let frac = (self.0 % scale).low_u64();

        if frac == 0 {
            return write!(f, "{}", whole);
        }

        let digits = format!("{:018}", frac);
        write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
    }
}

impl From<U256> for Decimal18 {
    fn from(raw: U256) -> Self {
        Self(raw)
    }
}

impl From<Decimal18> for U256 {
    fn from(value: Decimal18) -> Self {
        value.0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: Decimal18, b: Decimal18) -> Result<Decimal18> {
    a.checked_add(b)
        .ok_or_else(|| Error::overflow(format!("{} + {}", a, b)))
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: Decimal18, b: Decimal18) -> Result<Decimal18> {
    a.checked_sub(b)
        .ok_or_else(|| Error::overflow(format!("{} - {}", a, b)))
}

fn division_by_zero() -> Error {
    Error::InvalidParameter {
        name: "divisor".into(),
        reason: "division by zero".into(),
    }
}

fn narrow(value: U512, operation: &str) -> Result<U256> {
    U256::try_from(value).map_err(|_| Error::overflow(operation))
}

/// Computes `(a * b) / denominator`, truncated, with a 512-bit intermediate
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(division_by_zero());
    }
    let product = a.full_mul(b);
    narrow(product / U512::from(denominator), "mul_div")
}

/// Computes `(a * b) / denominator`, rounded up
pub fn mul_div_up(a: U256, b: U256, denominator: U256) -> Result<U256> {
    if denominator.is_zero() {
        return Err(division_by_zero());
    }
    let product = a.full_mul(b);
    let denominator = U512::from(denominator);
    let mut quotient = product / denominator;
    if !(product % denominator).is_zero() {
        quotient += U512::one();
    }
    narrow(quotient, "mul_div_up")
}

/// Computes `(a * b + addend) / denominator` and its remainder.
///
/// The remainder is always below `denominator`.
pub fn mul_add_div_rem(a: U256, b: U256, addend: U256, denominator: U256) -> Result<(U256, U256)> {
    if denominator.is_zero() {
        return Err(division_by_zero());
    }
    let numerator = a
        .full_mul(b)
        .checked_add(U512::from(addend))
        .ok_or_else(|| Error::overflow("mul_add_div_rem numerator"))?;
    let denominator = U512::from(denominator);
    let quotient = narrow(numerator / denominator, "mul_add_div_rem")?;
    let remainder = narrow(numerator % denominator, "mul_add_div_rem remainder")?;
    Ok((quotient, remainder))
}

/// Computes `ceil((a * b - subtrahend) / denominator)` and the overshoot
/// `quotient * denominator - (a * b - subtrahend)`.
///
/// When `a * b <= subtrahend` the quotient is zero and the second value is the
/// unconsumed part of `subtrahend`.
pub fn mul_sub_div_ceil(a: U256, b: U256, subtrahend: U256, denominator: U256) -> Result<(U256, U256)> {
    if denominator.is_zero() {
        return Err(division_by_zero());
    }
    let product = a.full_mul(b);
    let subtrahend = U512::from(subtrahend);
    if product <= subtrahend {
        return Ok((U256::zero(), narrow(subtrahend - product, "mul_sub_div_ceil carry")?));
    }

    let numerator = product - subtrahend;
    let denominator = U512::from(denominator);
    let mut quotient = numerator / denominator;
    if !(numerator % denominator).is_zero() {
        quotient += U512::one();
    }
    let overshoot = quotient * denominator - numerator;
    Ok((
        narrow(quotient, "mul_sub_div_ceil")?,
        narrow(overshoot, "mul_sub_div_ceil overshoot")?,
    ))
}

/// Fixed-point multiplication: `a * b / 10^18`
pub fn dec_mul(a: Decimal18, b: Decimal18) -> Result<Decimal18> {
    a.mul_div(b, Decimal18::ONE)
}

/// Fixed-point division: `a * 10^18 / b`
pub fn dec_div(a: Decimal18, b: Decimal18) -> Result<Decimal18> {
    a.mul_div(Decimal18::ONE, b)
}

/// Absolute difference between two values
pub fn abs_diff(a: Decimal18, b: Decimal18) -> Decimal18 {
    if a > b {
        a.saturating_sub(b)
    } else {
        b.saturating_sub(a)
    }
}
