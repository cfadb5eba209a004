//! CLI command implementations.

pub mod clear;
pub mod completions;
pub mod config;
pub mod info;
pub mod kv;
pub mod verify;
pub mod version;

use std::path::PathBuf;

use anyhow::{Context, Result};
use eekv::{Store, StoreError};
use eekv_config::{ConfigLoader, EekvConfig};

use crate::style;

/// Options shared by every command that touches the devices.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Explicit config file layered over the standard locations.
    pub config: Option<PathBuf>,
    /// Start over with an empty store when no replica can be trusted.
    pub reset_if_corrupt: bool,
}

/// Loads the layered configuration.
pub fn load_config(options: &GlobalOptions) -> Result<EekvConfig> {
    let loader = match &options.config {
        Some(path) => ConfigLoader::new().with_file(path),
        None => ConfigLoader::new(),
    };
    loader.load().context("Failed to load configuration")
}

/// Builds a store from configuration without touching the devices.
pub fn open_store(options: &GlobalOptions) -> Result<Store> {
    let config = load_config(options)?;
    config.validate()?;
    tracing::debug!(devices = config.devices.len(), "opening store");
    Store::open_with(&config.devices, config.store_options()).context("Failed to build device pool")
}

/// Builds a store and elects its authoritative replica.
///
/// When no replica verifies, the store is reset only if the user asked for
/// it with `--reset-if-corrupt`; otherwise the error is returned untouched.
pub fn open_initialized(options: &GlobalOptions) -> Result<Store> {
    let store = open_store(options)?;
    match store.initialize() {
        Ok(()) => Ok(store),
        Err(StoreError::NoGoodReplica) if options.reset_if_corrupt => {
            style::print_warn("No device passed checksum verification; continuing with an empty store.");
            store.clear().context("Failed to reset devices")?;
            Ok(store)
        }
        Err(e @ StoreError::NoGoodReplica) => {
            style::print_hint("Run `eekv clear` or pass --reset-if-corrupt to start over with an empty store.");
            Err(anyhow::Error::new(e)
                .context("No device passed checksum verification; all data appears to be lost"))
        }
        Err(e) => Err(e).context("Failed to initialize store"),
    }
}
