//! Error types for the stability pool.
//!
//! This module defines all error types used throughout the crate,
//! split between caller errors (recoverable, reported with no side effects)
//! and fatal accounting faults (the enclosing operation is aborted and the
//! pool is left exactly as it was before the call).

use thiserror::Error;

/// Result type alias for stability pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the stability pool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Depositor Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount is zero
    #[error("Amount cannot be zero")]
    ZeroAmount,

    /// Depositor has no deposit, or the deposit compounded to zero
    #[error("No active deposit for depositor {0}")]
    NoActiveDeposit(String),

    /// Depositor's debt-token balance cannot cover the request
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance {
        /// Required amount
        required: String,
        /// Available amount
        available: String,
    },

    /// Resulting deposit would sit below the configured floor
    #[error("Deposit {amount} below minimum {minimum}")]
    BelowMinimumDeposit {
        /// Deposit that would result
        amount: String,
        /// Configured floor
        minimum: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Collateral Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Collateral type is not registered with the pool
    #[error("Unknown collateral: {0}")]
    UnknownCollateral(String),

    /// Collateral type registered twice
    #[error("Collateral already registered: {0}")]
    CollateralAlreadyRegistered(String),

    // ═══════════════════════════════════════════════════════════════════
    // Accounting Faults
    // ═══════════════════════════════════════════════════════════════════

    /// Fixed-point result not representable
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Offset asked the pool to absorb more debt than it holds
    #[error("Pool capacity violation: debt to offset {debt} exceeds total deposits {total_deposits}")]
    PoolCapacityViolation {
        /// Requested debt to offset
        debt: String,
        /// Deposits currently in the pool
        total_deposits: String,
    },

    /// Invariant violation detected
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    // ═══════════════════════════════════════════════════════════════════
    // Reward Issuance Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Attempt to remove more issuance funds than remain unissued
    #[error("Insufficient issuance funds: requested {requested}, available {available}")]
    InsufficientIssuanceFunds {
        /// Requested amount
        requested: String,
        /// Unissued remainder
        available: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Validation Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    // ═══════════════════════════════════════════════════════════════════
    // Serialization Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Lock acquisition failed
    #[error("Failed to acquire lock")]
    Lock,

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Shorthand for an overflow in a named operation
    pub fn overflow(operation: impl Into<String>) -> Self {
        Error::ArithmeticOverflow {
            operation: operation.into(),
        }
    }

    /// Returns true if this is a caller error that left no side effects
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ZeroAmount
                | Error::NoActiveDeposit(_)
                | Error::InsufficientBalance { .. }
                | Error::BelowMinimumDeposit { .. }
                | Error::UnknownCollateral(_)
                | Error::InvalidParameter { .. }
        )
    }

    /// Returns true if this error signals a broken accounting contract
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ArithmeticOverflow { .. }
                | Error::PoolCapacityViolation { .. }
                | Error::InvariantViolation(_)
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Depositor errors: 1xxx
            Error::ZeroAmount => 1001,
            Error::NoActiveDeposit(_) => 1002,
            Error::InsufficientBalance { .. } => 1003,
            Error::BelowMinimumDeposit { .. } => 1004,

            // Collateral errors: 2xxx
            Error::UnknownCollateral(_) => 2001,
            Error::CollateralAlreadyRegistered(_) => 2002,

            // Accounting faults: 3xxx
            Error::ArithmeticOverflow { .. } => 3001,
            Error::PoolCapacityViolation { .. } => 3002,
            Error::InvariantViolation(_) => 3003,

            // Issuance errors: 4xxx
            Error::InsufficientIssuanceFunds { .. } => 4001,

            // Validation errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::Config(_) => 5002,

            // Serialization errors: 7xxx
            Error::Serialization(_) => 7001,
            Error::Deserialization(_) => 7002,

            // Internal errors: 9xxx
            Error::Lock => 9002,
            Error::Storage(_) => 9003,
        }
    }
}
