//! Pool configuration and parameters.
//!
//! Parameters are divided into:
//! - `PoolParams`: accounting policy fixed for the lifetime of a pool
//! - `PoolConfig`: deployment settings (data directory, collateral types)
//!   loaded from a JSON file and overlaid with `SP_*` environment variables

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::math::Decimal18;
use crate::utils::validation::{validate_collateral_id, validate_scale_factor};

// ═══════════════════════════════════════════════════════════════════════════════
// POOL PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Accounting policy parameters (set at pool creation)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    /// Rescale factor for the running product P.
    /// When P would drop to this value or below, it is multiplied by the
    /// factor and the scale counter advances.
    pub scale_factor: u128,

    /// Minimum resulting deposit after a `provide` (zero disables the floor)
    pub min_deposit: Decimal18,

    /// Maximum events kept in memory
    pub max_event_history: usize,
}

impl Default for PoolParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_deposit: Decimal18::from_raw(DEFAULT_MIN_DEPOSIT),
            max_event_history: DEFAULT_MAX_EVENT_HISTORY,
        }
    }
}

impl PoolParams {
    /// Override the rescale factor (for testing small factors)
    pub fn with_scale_factor(mut self, scale_factor: u128) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Override the minimum deposit
    pub fn with_min_deposit(mut self, min_deposit: Decimal18) -> Self {
        self.min_deposit = min_deposit;
        self
    }

    /// Override the event history bound
    pub fn with_max_event_history(mut self, max_event_history: usize) -> Self {
        self.max_event_history = max_event_history;
        self
    }

    /// Rescale factor as a fixed-point raw value
    pub fn scale_factor_decimal(&self) -> Decimal18 {
        Decimal18::from_raw(self.scale_factor)
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<()> {
        validate_scale_factor(self.scale_factor)?;

        if self.max_event_history == 0 {
            return Err(Error::InvalidParameter {
                name: "max_event_history".into(),
                reason: "must be greater than 0".into(),
            });
        }

        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// POOL CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Deployment configuration for a pool instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Accounting parameters
    pub params: PoolParams,

    /// Directory used by the file-backed state store
    pub data_dir: PathBuf,

    /// Collateral types registered at startup
    pub collaterals: Vec<String>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            params: PoolParams::default(),
            data_dir: PathBuf::from(".stability-pool"),
            collaterals: Vec::new(),
        }
    }
}

impl PoolConfig {
    /// Create a new configuration
    pub fn new(params: PoolParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Overlay `SP_*` environment variables on top of this configuration
    pub fn with_env(self) -> Result<Self> {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Overlay variables from an arbitrary lookup (used by `with_env`)
    pub fn with_vars<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("SP_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }

        if let Some(factor) = lookup("SP_SCALE_FACTOR") {
            self.params.scale_factor = factor
                .parse()
                .map_err(|_| Error::Config(format!("SP_SCALE_FACTOR: invalid value {:?}", factor)))?;
        }

        if let Some(min) = lookup("SP_MIN_DEPOSIT") {
            self.params.min_deposit = Decimal18::parse_units(&min)
                .map_err(|e| Error::Config(format!("SP_MIN_DEPOSIT: {}", e)))?;
        }

        if let Some(max) = lookup("SP_MAX_EVENT_HISTORY") {
            self.params.max_event_history = max
                .parse()
                .map_err(|_| Error::Config(format!("SP_MAX_EVENT_HISTORY: invalid value {:?}", max)))?;
        }

        if let Some(list) = lookup("SP_COLLATERALS") {
            self.collaterals = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(self)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.params
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        for (i, id) in self.collaterals.iter().enumerate() {
            validate_collateral_id(id).map_err(|e| Error::Config(e.to_string()))?;
            if self.collaterals[..i].contains(id) {
                return Err(Error::Config(format!("collateral {} listed twice", id)));
            }
        }

        Ok(())
    }
}
