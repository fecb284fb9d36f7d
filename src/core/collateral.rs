//! Collateral types accepted by the pool.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::utils::validation::validate_collateral_id;

/// Symbol identifying one collateral type (e.g. `wETH`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollateralId(String);

impl CollateralId {
    /// Create a validated collateral id
    pub fn new(symbol: impl Into<String>) -> Result<Self> {
        let symbol = symbol.into();
        validate_collateral_id(&symbol)?;
        Ok(Self(symbol))
    }

    /// Symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollateralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CollateralId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

/// Registered collateral types, in registration order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralRegistry {
    ids: Vec<CollateralId>,
}

impl CollateralRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collateral type
    pub fn register(&mut self, id: CollateralId) -> Result<()> {
        if self.contains(&id) {
            return Err(Error::CollateralAlreadyRegistered(id.to_string()));
        }
        self.ids.push(id);
        Ok(())
    }

    /// Check membership
    pub fn contains(&self, id: &CollateralId) -> bool {
        self.ids.contains(id)
    }

    /// Fail with `UnknownCollateral` unless registered
    pub fn ensure_known(&self, id: &CollateralId) -> Result<()> {
        if !self.contains(id) {
            return Err(Error::UnknownCollateral(id.to_string()));
        }
        Ok(())
    }

    /// Iterate over registered ids
    pub fn iter(&self) -> impl Iterator<Item = &CollateralId> {
        self.ids.iter()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Check if no collateral is registered
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
