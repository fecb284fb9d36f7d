//! Pool state persistence.
//!
//! The accumulator is one row (`sp:acc`), pool metadata another (`sp:meta`),
//! and every deposit record lives under `dep:<hex id>`. Collaborator state
//! that a host wants to keep alongside the pool goes under `aux:<name>`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::core::collateral::CollateralRegistry;
use crate::core::config::PoolParams;
use crate::error::{Error, Result};
use crate::stability_pool::accumulator::GlobalAccumulator;
use crate::stability_pool::pool::{PoolState, PoolTotals};
use crate::stability_pool::snapshot::{DepositRecord, DepositSnapshotStore};
use crate::storage::backend::{make_key, prefixes, StorageBackend, TypedStore};
use crate::utils::crypto::{DepositorId, Hash};

const ACCUMULATOR_KEY: &[u8] = b"acc";
const META_KEY: &[u8] = b"meta";

/// Everything in `PoolState` except the accumulator and the deposits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolMeta {
    /// Accounting parameters
    pub params: PoolParams,
    /// Registered collateral types
    pub collaterals: CollateralRegistry,
    /// Lifetime counters
    pub totals: PoolTotals,
    /// Layout version
    pub version: u32,
}

impl PoolMeta {
    /// Current layout version
    pub const VERSION: u32 = 1;
}

/// Persists a `PoolState` on any storage backend
#[derive(Debug)]
pub struct PoolStateStore<B: StorageBackend> {
    store: TypedStore<B>,
}

impl<B: StorageBackend> PoolStateStore<B> {
    /// Create a new state store
    pub fn new(backend: B) -> Self {
        Self {
            store: TypedStore::new(backend),
        }
    }

    fn accumulator_key() -> Vec<u8> {
        make_key(prefixes::STABILITY_POOL, ACCUMULATOR_KEY)
    }

    fn meta_key() -> Vec<u8> {
        make_key(prefixes::STABILITY_POOL, META_KEY)
    }

    fn deposit_key(depositor: &DepositorId) -> Vec<u8> {
        make_key(prefixes::DEPOSIT, depositor.to_hex().as_bytes())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // POOL STATE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Whether a pool has been saved
    pub fn exists(&self) -> Result<bool> {
        self.store.exists(&Self::accumulator_key())
    }

    /// Write the full state, dropping records of depositors that left
    pub fn save(&self, state: &PoolState) -> Result<()> {
        let meta = PoolMeta {
            params: state.params.clone(),
            collaterals: state.collaterals.clone(),
            totals: state.totals.clone(),
            version: PoolMeta::VERSION,
        };
        self.store.set(&Self::meta_key(), &meta)?;
        self.store.set(&Self::accumulator_key(), &state.accumulator)?;

        for key in self.store.list_prefix(prefixes::DEPOSIT)? {
            let depositor = depositor_from_key(&key)?;
            if !state.deposits.contains(&depositor) {
                self.store.delete(&key)?;
            }
        }
        for (depositor, record) in state.deposits.iter() {
            self.save_deposit(depositor, record)?;
        }

        self.store.flush()
    }

    /// Read a saved state back
    pub fn load(&self) -> Result<Option<PoolState>> {
        let accumulator: GlobalAccumulator = match self.store.get(&Self::accumulator_key())? {
            Some(accumulator) => accumulator,
            None => return Ok(None),
        };
        let meta: PoolMeta = self
            .store
            .get(&Self::meta_key())?
            .ok_or_else(|| Error::Storage("pool metadata missing".into()))?;
        if meta.version != PoolMeta::VERSION {
            return Err(Error::Storage(format!(
                "unsupported layout version {}",
                meta.version
            )));
        }

        let mut deposits = DepositSnapshotStore::new();
        for key in self.store.list_prefix(prefixes::DEPOSIT)? {
            let depositor = depositor_from_key(&key)?;
            if let Some(record) = self.store.get::<DepositRecord>(&key)? {
                deposits.insert(depositor, record);
            }
        }

        Ok(Some(PoolState {
            params: meta.params,
            collaterals: meta.collaterals,
            accumulator,
            deposits,
            totals: meta.totals,
        }))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // DEPOSIT RECORDS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Load one deposit record
    pub fn load_deposit(&self, depositor: &DepositorId) -> Result<Option<DepositRecord>> {
        self.store.get(&Self::deposit_key(depositor))
    }

    /// Save one deposit record
    pub fn save_deposit(&self, depositor: &DepositorId, record: &DepositRecord) -> Result<()> {
        self.store.set(&Self::deposit_key(depositor), record)
    }

    /// Number of stored deposit records
    pub fn count_deposits(&self) -> Result<usize> {
        Ok(self.store.list_prefix(prefixes::DEPOSIT)?.len())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // COLLABORATOR STATE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Save collaborator state under `aux:<name>`
    pub fn save_aux<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        self.store.set(&make_key(prefixes::AUX, name.as_bytes()), value)?;
        self.store.flush()
    }

    /// Load collaborator state saved with `save_aux`
    pub fn load_aux<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.store.get(&make_key(prefixes::AUX, name.as_bytes()))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // UTILITY METHODS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Hash over the stored accumulator and every deposit row, in key order
    pub fn compute_state_root(&self) -> Result<Hash> {
        let mut keys = vec![Self::accumulator_key()];
        keys.extend(self.store.list_prefix(prefixes::DEPOSIT)?);

        let mut buffer = Vec::new();
        for key in keys {
            if let Some(value) = self.store.backend().get(&key)? {
                buffer.extend_from_slice(&key);
                buffer.extend_from_slice(Hash::sha256(&value).as_bytes());
            }
        }
        Ok(Hash::sha256(&buffer))
    }

    /// Flush all pending writes
    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    /// Clear all data
    pub fn clear(&self) -> Result<()> {
        self.store.clear()
    }

    /// Underlying backend
    pub fn backend(&self) -> &B {
        self.store.backend()
    }
}

fn depositor_from_key(key: &[u8]) -> Result<DepositorId> {
    let hex_id = key
        .strip_prefix(prefixes::DEPOSIT)
        .and_then(|rest| std::str::from_utf8(rest).ok())
        .ok_or_else(|| Error::Storage("malformed deposit key".into()))?;
    DepositorId::from_hex(hex_id).map_err(|e| Error::Storage(format!("malformed deposit key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::collateral::CollateralId;
    use crate::core::ledger::InMemoryLedger;
    use crate::stability_pool::pool::StabilityPool;
    use crate::stability_pool::rewards::ExternalRewards;
    use crate::storage::backend::{FileStore, InMemoryStore};
    use crate::utils::math::Decimal18;

    fn populated_pool() -> StabilityPool<InMemoryLedger, ExternalRewards> {
        let alice = DepositorId::from_label("alice");
        let bob = DepositorId::from_label("bob");
        let mut ledger = InMemoryLedger::new();
        ledger.mint(&alice, Decimal18::from_integer(1000)).unwrap();
        ledger.mint(&bob, Decimal18::from_integer(1000)).unwrap();

        let mut pool = StabilityPool::new(PoolParams::default(), ledger, ExternalRewards::new()).unwrap();
        let weth = CollateralId::new("wETH").unwrap();
        pool.register_collateral(weth.clone()).unwrap();
        pool.provide(&alice, Decimal18::from_integer(600)).unwrap();
        pool.provide(&bob, Decimal18::from_integer(400)).unwrap();
        pool.offset(Decimal18::from_integer(100), &[(weth, Decimal18::from_integer(1))])
            .unwrap();
        pool
    }

    #[test]
    fn test_save_and_load() {
        let pool = populated_pool();
        let store = PoolStateStore::new(InMemoryStore::new());

        assert!(!store.exists().unwrap());
        assert!(store.load().unwrap().is_none());

        store.save(pool.state()).unwrap();
        assert!(store.exists().unwrap());
        assert_eq!(store.count_deposits().unwrap(), 2);
        assert_eq!(store.load().unwrap().as_ref(), Some(pool.state()));
    }

    #[test]
    fn test_save_drops_departed_depositors() {
        let mut pool = populated_pool();
        let store = PoolStateStore::new(InMemoryStore::new());
        store.save(pool.state()).unwrap();

        let bob = DepositorId::from_label("bob");
        pool.withdraw(&bob, Decimal18::from_integer(1000)).unwrap();
        store.save(pool.state()).unwrap();

        assert_eq!(store.count_deposits().unwrap(), 1);
        assert!(store.load_deposit(&bob).unwrap().is_none());
    }

    #[test]
    fn test_state_root_tracks_changes() {
        let mut pool = populated_pool();
        let store = PoolStateStore::new(InMemoryStore::new());
        store.save(pool.state()).unwrap();
        let root = store.compute_state_root().unwrap();

        store.save(pool.state()).unwrap();
        assert_eq!(store.compute_state_root().unwrap(), root);

        pool.tick(Decimal18::from_integer(1)).unwrap();
        store.save(pool.state()).unwrap();
        assert_ne!(store.compute_state_root().unwrap(), root);
    }

    #[test]
    fn test_file_backed_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let pool = populated_pool();

        {
            let store = PoolStateStore::new(FileStore::new(temp_dir.path()).unwrap());
            store.save(pool.state()).unwrap();
            store.save_aux("ledger", pool.ledger()).unwrap();
        }

        let store = PoolStateStore::new(FileStore::new(temp_dir.path()).unwrap());
        assert_eq!(store.load().unwrap().as_ref(), Some(pool.state()));
        let ledger: InMemoryLedger = store.load_aux("ledger").unwrap().unwrap();
        assert_eq!(&ledger, pool.ledger());
    }
}
