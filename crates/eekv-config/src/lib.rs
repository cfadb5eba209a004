//! Configuration management for eekv
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (EEKV_* prefix, `__` between nested keys) (highest precedence)
//! 2. An explicit file (`--config`), TOML or device table
//! 3. ~/.config/eekv/config.toml (user defaults)
//! 4. /etc/eekv/eekv.toml (system config)
//! 5. Built-in defaults (lowest precedence)
//!
//! When no layer names a device, /etc/eekv.conf is read as a device table.

use anyhow::Result;
use eekv::{DEFAULT_MAX_ATTEMPTS, DeviceSpec, StoreOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod device_table;
mod error;
mod loader;
mod paths;

pub use device_table::{parse_device_table, read_device_table};
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::{LEGACY_DEVICE_TABLE, Paths, SYSTEM_CONFIG_FILE};

/// Main eekv configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EekvConfig {
    /// Replica devices, in pool order.
    pub devices: Vec<DeviceSpec>,
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Attempts allowed for one exact read or write before giving up.
    pub max_attempts: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl EekvConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration with an explicit file layered on top
    pub fn load_with_file(path: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_file(path).load()
    }

    /// Check that the configuration can build a store
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.devices.is_empty() {
            return Err(ConfigError::ValidationError(
                "no devices configured".to_string(),
            ));
        }
        if self.transfer.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "transfer.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Store options derived from this configuration
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            max_attempts: self.transfer.max_attempts,
        }
    }
}
