//! Pool constants and magic numbers.
//!
//! All pool-wide constants are defined here for easy auditing and modification.
//! Policy values that deployments may tune live in `PoolParams` and default to
//! the constants below.

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED POINT CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Decimal precision of every fixed-point quantity (10^18)
pub const DECIMAL_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Number of decimals behind `DECIMAL_PRECISION`
pub const DECIMALS: u32 = 18;

// ═══════════════════════════════════════════════════════════════════════════════
// STABILITY POOL CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default rescale factor for the running product P (10^9).
/// When P would drop below this value it is multiplied by it and the scale advances.
pub const DEFAULT_SCALE_FACTOR: u128 = 1_000_000_000;

/// Default minimum deposit (zero disables the floor)
pub const DEFAULT_MIN_DEPOSIT: u128 = 0;

/// Maximum events kept in memory by a pool
pub const DEFAULT_MAX_EVENT_HISTORY: usize = 1000;

// ═══════════════════════════════════════════════════════════════════════════════
// REWARD ISSUANCE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Seconds in one week, the unit of the issuance distribution rate
pub const SECONDS_PER_WEEK: u64 = 7 * 24 * 3600;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIER CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of a depositor id in bytes (address-sized)
pub const DEPOSITOR_ID_LENGTH: usize = 20;

/// Length of a hash in bytes (SHA256)
pub const HASH_LENGTH: usize = 32;

/// Maximum length of a collateral symbol
pub const MAX_COLLATERAL_ID_LENGTH: usize = 32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_factor_fits_precision() {
        assert!(DEFAULT_SCALE_FACTOR > 1);
        assert!(DEFAULT_SCALE_FACTOR < DECIMAL_PRECISION);
        assert_eq!(DECIMAL_PRECISION, 10u128.pow(DECIMALS));
    }

    #[test]
    fn test_identifier_lengths() {
        assert!(DEPOSITOR_ID_LENGTH <= HASH_LENGTH);
    }
}
