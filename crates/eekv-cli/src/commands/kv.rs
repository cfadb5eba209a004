//! Key-value commands: read, set, remove, list.

use anyhow::{Context, Result};
use eekv::SetOptions;

use super::{GlobalOptions, open_initialized};
use crate::style::{self, colors::SemanticStyle};

/// Print the value stored under `key`.
pub fn read(options: &GlobalOptions, key: &str) -> Result<()> {
    let store = open_initialized(options)?;
    let value = store
        .read(key)
        .with_context(|| format!("Failed to read {key}"))?;
    println!("{value}");
    Ok(())
}

/// Store `value` under `key` on every device.
pub fn set(options: &GlobalOptions, key: &str, value: &str, set: SetOptions) -> Result<()> {
    let store = open_initialized(options)?;
    let written = store
        .set(key, value, set)
        .with_context(|| format!("Failed to set {key}"))?;

    if written == 0 {
        style::print_success(&format!("{} already set, nothing written", key.code()));
    } else {
        style::print_success(&format!("Set {} to {value}", key.code()));
    }
    Ok(())
}

/// Remove `key` from every device.
pub fn remove(options: &GlobalOptions, key: &str) -> Result<()> {
    let store = open_initialized(options)?;
    store
        .remove(key)
        .with_context(|| format!("Failed to remove {key}"))?;
    style::print_success(&format!("Removed {}", key.code()));
    Ok(())
}

/// Print every key, one per line.
pub fn list(options: &GlobalOptions) -> Result<()> {
    let store = open_initialized(options)?;
    let keys = store.list_keys().context("Failed to list keys")?;
    for key in &keys {
        println!("{key}");
    }
    if keys.is_empty() {
        style::print_hint("The store is empty.");
    }
    Ok(())
}
