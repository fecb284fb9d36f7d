//! Stability Pool accounting.
//!
//! Depositors stake debt tokens that are burned against liquidated debt, in
//! exchange for the seized collateral. Every deposit is tracked in O(1)
//! through a running product `P` and per-collateral running sums `S`:
//!
//! - **accumulator**: global `P`, `S`, `G`, epoch and scale
//! - **snapshot**: per-depositor records taken at deposit time
//! - **offset**: absorption of a liquidation, planned then applied
//! - **deposits**: compounded deposits and gains from a snapshot
//! - **rewards**: emission ticks and reward sources
//! - **pool**: the transactional pool built on the above
//! - **handle**: shared, lock-protected access

pub mod accumulator;
pub mod deposits;
pub mod handle;
pub mod offset;
pub mod pool;
pub mod rewards;
pub mod snapshot;

pub use accumulator::{AccumulatorCheckpoint, GlobalAccumulator};
pub use deposits::DepositController;
pub use handle::PoolHandle;
pub use offset::{CollateralUpdate, OffsetEngine, OffsetPlan, Transition};
pub use pool::{
    ConservationReport, DepositorReceipt, OffsetOutcome, OffsetReport, PoolState, PoolStatistics,
    PoolTotals, StabilityPool,
};
pub use rewards::{
    Clock, CommunityIssuance, ExternalRewards, IssuanceState, ManualClock, RewardDriver,
    RewardSource, SystemClock, TickOutcome,
};
pub use snapshot::{DepositRecord, DepositSnapshotStore, Snapshot};
