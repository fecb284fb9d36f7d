//! Core modules for the stability pool.
//!
//! This module contains the building blocks the accounting engine sits on:
//! - Configuration and pool parameters
//! - Collateral types and their registry
//! - Ledger collaborator traits and an in-memory ledger

pub mod collateral;
pub mod config;
pub mod ledger;

pub use collateral::*;
pub use config::*;
pub use ledger::*;
