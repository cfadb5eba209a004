//! The JSON object stored as the replicated payload text.

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// A flat string-keyed JSON object.
///
/// Values written through [`Document::set`] are always strings; values of
/// other types already present in the text are preserved but cannot be
/// read back through [`Document::get_str`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    entries: Map<String, Value>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses payload text. Empty text is an empty document.
    pub fn parse(text: &[u8]) -> Result<Self> {
        if text.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        let entries = serde_json::from_slice::<Map<String, Value>>(text)?;
        Ok(Self { entries })
    }

    /// Returns the string stored under `key`.
    pub fn get_str(&self, key: &str) -> Result<&str> {
        match self.entries.get(key) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(StoreError::NotAString(key.to_string())),
            None => Err(StoreError::KeyNotFound(key.to_string())),
        }
    }

    /// Stores `value` under `key`.
    ///
    /// With `no_create`, a missing key is an error and the document is left
    /// unchanged.
    pub fn set(&mut self, key: &str, value: &str, no_create: bool) -> Result<()> {
        if no_create && !self.entries.contains_key(key) {
            return Err(StoreError::KeyNotFound(key.to_string()));
        }
        self.entries
            .insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    /// Removes `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Result<Value> {
        self.entries
            .remove(key)
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the document has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compact serialized form, as stored on the devices.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.entries)?)
    }
}
