//! Storage backend implementations.
//!
//! - InMemoryStore: ephemeral storage for tests and one-shot simulations
//! - FileStore: hex-encoded JSON file, loaded at open and written on flush

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Key type for storage operations
pub type StorageKey = Vec<u8>;

/// Value type for storage operations
pub type StorageValue = Vec<u8>;

/// Trait for storage backends
pub trait StorageBackend: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>>;

    /// Set a value for a key
    fn set(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Delete a key
    fn delete(&self, key: &[u8]) -> Result<bool>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool>;

    /// List all keys with a given prefix, in key order
    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>>;

    /// Flush any pending writes to persistent storage
    fn flush(&self) -> Result<()>;

    /// Clear all data
    fn clear(&self) -> Result<()>;
}

type Table = BTreeMap<StorageKey, StorageValue>;

fn read_table(table: &RwLock<Table>) -> Result<RwLockReadGuard<'_, Table>> {
    table.read().map_err(|_| Error::Lock)
}

fn write_table(table: &RwLock<Table>) -> Result<RwLockWriteGuard<'_, Table>> {
    table.write().map_err(|_| Error::Lock)
}

fn keys_with_prefix(table: &Table, prefix: &[u8]) -> Vec<StorageKey> {
    table
        .range(prefix.to_vec()..)
        .map(|(k, _)| k)
        .take_while(|k| k.starts_with(prefix))
        .cloned()
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<Table>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> Result<usize> {
        Ok(read_table(&self.data)?.len())
    }

    /// Check if empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(read_table(&self.data)?.is_empty())
    }
}

impl StorageBackend for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        Ok(read_table(&self.data)?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        write_table(&self.data)?.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        Ok(write_table(&self.data)?.remove(key).is_some())
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(read_table(&self.data)?.contains_key(key))
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let table = read_table(&self.data)?;
        Ok(keys_with_prefix(&table, prefix))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        write_table(&self.data)?.clear();
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE-BASED STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// File-based storage backend using JSON
#[derive(Debug)]
pub struct FileStore {
    /// Base directory for storage
    base_path: PathBuf,
    /// In-memory copy of the file
    cache: RwLock<Table>,
    /// Whether the cache has unsaved changes
    dirty: RwLock<bool>,
}

impl FileStore {
    /// Name of the data file inside the base directory
    pub const DATA_FILE: &'static str = "data.json";

    /// Open (or create) a file store at the given directory
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                Error::Storage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        let store = Self {
            base_path,
            cache: RwLock::new(Table::new()),
            dirty: RwLock::new(false),
        };
        store.load_from_disk()?;

        Ok(store)
    }

    /// Path of the backing data file
    pub fn data_file_path(&self) -> PathBuf {
        self.base_path.join(Self::DATA_FILE)
    }

    fn set_dirty(&self, value: bool) -> Result<()> {
        *self.dirty.write().map_err(|_| Error::Lock)? = value;
        Ok(())
    }

    fn load_from_disk(&self) -> Result<()> {
        let path = self.data_file_path();
        if !path.exists() {
            return Ok(());
        }

        let file = File::open(&path)
            .map_err(|e| Error::Storage(format!("Failed to open data file: {}", e)))?;

        // Keys and values are hex-encoded so the file stays valid JSON
        let data: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Storage(format!("Failed to parse data file: {}", e)))?;

        let mut cache = write_table(&self.cache)?;
        for (key_hex, value_hex) in data {
            let key = hex::decode(&key_hex)
                .map_err(|e| Error::Storage(format!("Invalid key in storage: {}", e)))?;
            let value = hex::decode(&value_hex)
                .map_err(|e| Error::Storage(format!("Invalid value in storage: {}", e)))?;
            cache.insert(key, value);
        }

        Ok(())
    }

    fn save_to_disk(&self) -> Result<()> {
        let data: BTreeMap<String, String> = read_table(&self.cache)?
            .iter()
            .map(|(k, v)| (hex::encode(k), hex::encode(v)))
            .collect();

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.data_file_path())
            .map_err(|e| Error::Storage(format!("Failed to open data file for writing: {}", e)))?;

        serde_json::to_writer_pretty(BufWriter::new(file), &data)
            .map_err(|e| Error::Storage(format!("Failed to write data file: {}", e)))?;

        self.set_dirty(false)
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        Ok(read_table(&self.cache)?.get(key).cloned())
    }

    fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        write_table(&self.cache)?.insert(key.to_vec(), value.to_vec());
        self.set_dirty(true)
    }

    fn delete(&self, key: &[u8]) -> Result<bool> {
        let existed = write_table(&self.cache)?.remove(key).is_some();
        if existed {
            self.set_dirty(true)?;
        }
        Ok(existed)
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(read_table(&self.cache)?.contains_key(key))
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let table = read_table(&self.cache)?;
        Ok(keys_with_prefix(&table, prefix))
    }

    fn flush(&self) -> Result<()> {
        let dirty = *self.dirty.read().map_err(|_| Error::Lock)?;
        if dirty {
            self.save_to_disk()?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        write_table(&self.cache)?.clear();
        self.set_dirty(true)
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED STORE WRAPPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Type-safe wrapper around a storage backend (bincode values)
#[derive(Debug)]
pub struct TypedStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> TypedStore<B> {
    /// Create a new typed store
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.backend.get(key)? {
            Some(data) => {
                let value = bincode::deserialize(&data).map_err(|e| {
                    Error::Deserialization(format!("Failed to deserialize value: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Set a typed value
    pub fn set<T: Serialize>(&self, key: &[u8], value: &T) -> Result<()> {
        let data = bincode::serialize(value)
            .map_err(|e| Error::Serialization(format!("Failed to serialize value: {}", e)))?;
        self.backend.set(key, &data)
    }

    /// Delete a value
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.backend.delete(key)
    }

    /// Check if a key exists
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.backend.exists(key)
    }

    /// List keys with prefix
    pub fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        self.backend.list_prefix(prefix)
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    /// Clear all data
    pub fn clear(&self) -> Result<()> {
        self.backend.clear()
    }

    /// Get the underlying backend
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PREFIXES
// ═══════════════════════════════════════════════════════════════════════════════

/// Key prefixes for different data types
pub mod prefixes {
    /// Pool-wide rows (accumulator, metadata)
    pub const STABILITY_POOL: &[u8] = b"sp:";
    /// Deposit records, keyed by hex depositor id
    pub const DEPOSIT: &[u8] = b"dep:";
    /// Collaborator state (ledger, reward source)
    pub const AUX: &[u8] = b"aux:";
}

/// Create a key with a prefix
pub fn make_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(prefix.len() + key.len());
    result.extend_from_slice(prefix);
    result.extend_from_slice(key);
    result
}
