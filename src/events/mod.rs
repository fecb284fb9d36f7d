//! Pool events for state change notifications.
//!
//! Every successful operation appends the events describing what it
//! changed. Failed operations append nothing. The log is bounded and drops
//! its oldest entries first.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

use crate::core::collateral::CollateralId;
use crate::error::{Error, Result};
use crate::utils::crypto::{DepositorId, Hash};
use crate::utils::math::Decimal18;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All pool event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolEvent {
    // Depositor events
    /// A depositor's snapshot was rewritten or cleared
    DepositSnapshotUpdated {
        /// Depositor
        depositor: DepositorId,
        /// P in the new snapshot (zero when cleared)
        p: Decimal18,
        /// G in the new snapshot (zero when cleared)
        g: Decimal18,
        /// Epoch in the new snapshot
        epoch: u64,
        /// Scale in the new snapshot
        scale: u64,
    },
    /// A depositor's deposit changed
    UserDepositChanged {
        /// Depositor
        depositor: DepositorId,
        /// Deposit after the operation
        new_deposit: Decimal18,
    },
    /// Collateral gains paid to a depositor
    GainsWithdrawn {
        /// Depositor
        depositor: DepositorId,
        /// Collateral paid, by type
        gains: BTreeMap<CollateralId, Decimal18>,
        /// Deposit lost to offsets since the previous snapshot
        debt_loss: Decimal18,
    },
    /// Reward paid to a depositor
    RewardPaid {
        /// Depositor
        depositor: DepositorId,
        /// Amount paid
        amount: Decimal18,
    },

    // Accumulator events
    /// Running product changed
    PUpdated {
        /// New P
        p: Decimal18,
    },
    /// A collateral sum changed
    SUpdated {
        /// Collateral type
        collateral: CollateralId,
        /// New S value
        s: Decimal18,
        /// Epoch of the bucket
        epoch: u64,
        /// Scale of the bucket
        scale: u64,
    },
    /// The reward sum changed
    GUpdated {
        /// New G value
        g: Decimal18,
        /// Epoch of the bucket
        epoch: u64,
        /// Scale of the bucket
        scale: u64,
    },
    /// A new epoch started
    EpochUpdated {
        /// New epoch
        epoch: u64,
    },
    /// The scale advanced
    ScaleUpdated {
        /// New scale
        scale: u64,
    },
    /// Total deposits changed
    TotalDepositsUpdated {
        /// New total
        total: Decimal18,
    },

    // Skipped work
    /// Offset ignored: empty pool or zero debt
    OffsetSkipped {
        /// Debt that was offered
        debt: Decimal18,
    },
    /// Emission ignored: empty pool
    EmissionDiscarded {
        /// Amount that found no depositor
        amount: Decimal18,
    },
}

impl PoolEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::DepositSnapshotUpdated { .. } => "DepositSnapshotUpdated",
            Self::UserDepositChanged { .. } => "UserDepositChanged",
            Self::GainsWithdrawn { .. } => "GainsWithdrawn",
            Self::RewardPaid { .. } => "RewardPaid",
            Self::PUpdated { .. } => "PUpdated",
            Self::SUpdated { .. } => "SUpdated",
            Self::GUpdated { .. } => "GUpdated",
            Self::EpochUpdated { .. } => "EpochUpdated",
            Self::ScaleUpdated { .. } => "ScaleUpdated",
            Self::TotalDepositsUpdated { .. } => "TotalDepositsUpdated",
            Self::OffsetSkipped { .. } => "OffsetSkipped",
            Self::EmissionDiscarded { .. } => "EmissionDiscarded",
        }
    }

    /// Depositor the event concerns, if any
    pub fn depositor(&self) -> Option<&DepositorId> {
        match self {
            Self::DepositSnapshotUpdated { depositor, .. }
            | Self::UserDepositChanged { depositor, .. }
            | Self::GainsWithdrawn { depositor, .. }
            | Self::RewardPaid { depositor, .. } => Some(depositor),
            _ => None,
        }
    }

    /// Compute event hash
    pub fn hash(&self) -> Result<Hash> {
        let data = bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Hash::sha256(&data))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded, in-memory event log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    events: VecDeque<PoolEvent>,
    max_events: usize,
    total_recorded: u64,
}

impl EventLog {
    /// Create an empty log keeping at most `max_events`
    pub fn new(max_events: usize) -> Self {
        Self {
            events: VecDeque::new(),
            max_events: max_events.max(1),
            total_recorded: 0,
        }
    }

    /// Add an event, evicting the oldest when full
    pub fn push(&mut self, event: PoolEvent) {
        if self.events.len() == self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
        self.total_recorded += 1;
    }

    /// Add several events in order
    pub fn extend(&mut self, events: impl IntoIterator<Item = PoolEvent>) {
        for event in events {
            self.push(event);
        }
    }

    /// Retained events, oldest first
    pub fn events(&self) -> impl Iterator<Item = &PoolEvent> {
        self.events.iter()
    }

    /// Retained events of one type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&PoolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Retained events concerning one depositor
    pub fn for_depositor(&self, depositor: &DepositorId) -> Vec<&PoolEvent> {
        self.events
            .iter()
            .filter(|e| e.depositor() == Some(depositor))
            .collect()
    }

    /// Most recent event
    pub fn last(&self) -> Option<&PoolEvent> {
        self.events.back()
    }

    /// Number of retained events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events recorded since creation, including evicted ones
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(crate::utils::constants::DEFAULT_MAX_EVENT_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        let event = PoolEvent::EpochUpdated { epoch: 1 };
        assert_eq!(event.event_type(), "EpochUpdated");
        assert!(event.depositor().is_none());

        let alice = DepositorId::from_label("alice");
        let event = PoolEvent::RewardPaid {
            depositor: alice,
            amount: Decimal18::ONE,
        };
        assert_eq!(event.depositor(), Some(&alice));
    }

    #[test]
    fn test_event_log_bounded() {
        let mut log = EventLog::new(2);
        log.push(PoolEvent::ScaleUpdated { scale: 1 });
        log.push(PoolEvent::ScaleUpdated { scale: 2 });
        log.push(PoolEvent::ScaleUpdated { scale: 3 });

        assert_eq!(log.len(), 2);
        assert_eq!(log.total_recorded(), 3);
        assert_eq!(log.events().next(), Some(&PoolEvent::ScaleUpdated { scale: 2 }));
        assert_eq!(log.last(), Some(&PoolEvent::ScaleUpdated { scale: 3 }));
    }

    #[test]
    fn test_filter_by_type() {
        let mut log = EventLog::default();
        log.push(PoolEvent::PUpdated { p: Decimal18::ONE });
        log.push(PoolEvent::TotalDepositsUpdated { total: Decimal18::ONE });
        log.push(PoolEvent::PUpdated { p: Decimal18::ONE });

        assert_eq!(log.filter_by_type("PUpdated").len(), 2);
        assert_eq!(log.filter_by_type("GUpdated").len(), 0);
    }

    #[test]
    fn test_event_hash_deterministic() {
        let a = PoolEvent::EmissionDiscarded { amount: Decimal18::ONE };
        let b = PoolEvent::EmissionDiscarded { amount: Decimal18::ONE };
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());

        let c = PoolEvent::EmissionDiscarded { amount: Decimal18::ZERO };
        assert_ne!(a.hash().unwrap(), c.hash().unwrap());
    }
}
