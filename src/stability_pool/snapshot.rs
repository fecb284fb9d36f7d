//! Per-depositor snapshots.
//!
//! A depositor's record holds the raw deposit written at their last
//! interaction together with the accumulator values seen at that moment.
//! Their current balance and gains are derived lazily from the difference
//! between the snapshot and the live accumulator.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::collateral::CollateralId;
use crate::utils::crypto::DepositorId;
use crate::utils::math::Decimal18;

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT
// ═══════════════════════════════════════════════════════════════════════════════

/// Accumulator values captured when a deposit was last materialized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Running product P
    pub p: Decimal18,
    /// Collateral sums S at (epoch, scale), by collateral type
    pub s: BTreeMap<CollateralId, Decimal18>,
    /// Reward sum G at (epoch, scale)
    pub g: Decimal18,
    /// Scale counter
    pub scale: u64,
    /// Epoch counter
    pub epoch: u64,
}

impl Snapshot {
    /// Collateral sum recorded for one type (zero if it was not yet registered)
    pub fn sum_for(&self, collateral: &CollateralId) -> Decimal18 {
        self.s.get(collateral).copied().unwrap_or_default()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEPOSIT RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// A depositor's stored position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    /// Deposit as of the snapshot, before any later offsets
    pub raw_deposit: Decimal18,
    /// Accumulator values at the last interaction
    pub snapshot: Snapshot,
}

impl DepositRecord {
    /// Create a record
    pub fn new(raw_deposit: Decimal18, snapshot: Snapshot) -> Self {
        Self {
            raw_deposit,
            snapshot,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SNAPSHOT STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// All deposit records, keyed by depositor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositSnapshotStore {
    records: BTreeMap<DepositorId, DepositRecord>,
}

impl DepositSnapshotStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for a depositor
    pub fn get(&self, depositor: &DepositorId) -> Option<&DepositRecord> {
        self.records.get(depositor)
    }

    /// Write a depositor's record, returning the previous one
    pub fn insert(&mut self, depositor: DepositorId, record: DepositRecord) -> Option<DepositRecord> {
        self.records.insert(depositor, record)
    }

    /// Remove a depositor
    pub fn remove(&mut self, depositor: &DepositorId) -> Option<DepositRecord> {
        self.records.remove(depositor)
    }

    /// Check if a depositor has a record
    pub fn contains(&self, depositor: &DepositorId) -> bool {
        self.records.contains_key(depositor)
    }

    /// Iterate over all records in depositor order
    pub fn iter(&self) -> impl Iterator<Item = (&DepositorId, &DepositRecord)> {
        self.records.iter()
    }

    /// Number of depositors with a record
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
