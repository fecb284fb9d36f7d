//! Storage module for persistent pool state.
//!
//! ## Backends
//!
//! - **InMemoryStore**: ephemeral storage for tests
//! - **FileStore**: JSON file-based persistence
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stability_pool::storage::{FileStore, PoolStateStore};
//!
//! let store = PoolStateStore::new(FileStore::new("./sp-data")?);
//! store.save(pool.state())?;
//! let state = store.load()?;
//! ```

pub mod backend;
pub mod state;

pub use backend::*;
pub use state::*;
