//! # Stability Pool
//!
//! Product-sum accounting for the Stability Pool of a collateralized-debt
//! stablecoin. Depositors stake debt tokens; liquidations burn part of the
//! pool against the liquidated debt and hand the seized collateral to the
//! depositors pro rata. Every depositor's balance and gains are derived in
//! O(1) from a snapshot, however many liquidations happened in between.
//!
//! ## Architecture
//!
//! - **Utils**: 18-decimal fixed point over 256-bit integers, ids, validation
//! - **Core**: configuration, collateral registry, ledger collaborators
//! - **Stability Pool**: accumulator, offsets, deposits, rewards, the pool
//! - **Events**: bounded log of state changes
//! - **Storage**: persistence of pool state on key-value backends
//! - **CLI**: scenario replay for the `sp-sim` binary
//!
//! ## Example
//!
//! ```rust,ignore
//! use stability_pool::prelude::*;
//!
//! let mut pool = StabilityPool::new(PoolParams::default(), ledger, ExternalRewards::new())?;
//! pool.register_collateral(CollateralId::new("wETH")?)?;
//!
//! pool.provide(&alice, Decimal18::from_integer(1000))?;
//! pool.offset(Decimal18::from_integer(500), &[(weth, Decimal18::from_integer(10))])?;
//!
//! assert_eq!(pool.get_compounded_deposit(&alice)?, Decimal18::from_integer(500));
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod cli;
pub mod core;
pub mod error;
pub mod events;
pub mod stability_pool;
pub mod storage;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        collateral::{CollateralId, CollateralRegistry},
        config::{PoolConfig, PoolParams},
        ledger::{CollateralLedger, DebtLedger, InMemoryLedger, PoolLedger},
    };
    pub use crate::error::{Error, Result};
    pub use crate::events::{EventLog, PoolEvent};
    pub use crate::stability_pool::{
        CommunityIssuance, DepositorReceipt, ExternalRewards, GlobalAccumulator, OffsetOutcome,
        PoolHandle, RewardSource, StabilityPool, TickOutcome, Transition,
    };
    pub use crate::utils::{
        crypto::{DepositorId, Hash},
        math::Decimal18,
    };
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
