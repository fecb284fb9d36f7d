//! Utility modules for the stability pool.
//!
//! This module contains shared utilities used across the crate:
//! - Fixed-point arithmetic
//! - Hashing and identifiers
//! - Validation helpers
//! - Constants

pub mod constants;
pub mod crypto;
pub mod math;
pub mod validation;

pub use constants::*;
pub use crypto::*;
pub use math::*;
pub use validation::*;
