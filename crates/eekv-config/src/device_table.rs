//! The line-oriented device table.
//!
//! One device per line, `PATH BLOCK_SIZE TOTAL_SIZE`, whitespace separated.
//! Blank lines and anything after `#` are ignored:
//!
//! ```text
//! # path                  bs    size
//! /sys/bus/i2c/.../eeprom 128   8192
//! /dev/mtdblock3          256   16384
//! ```

use std::path::Path;

use eekv::DeviceSpec;

use crate::ConfigError;

/// Parses a device table. `origin` is only used in error messages.
pub fn parse_device_table(text: &str, origin: &Path) -> Result<Vec<DeviceSpec>, ConfigError> {
    let mut devices = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let invalid = |reason: String| ConfigError::DeviceTableError {
            path: origin.to_path_buf(),
            line: index + 1,
            reason,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        let [path, block_size, total_size] = fields.as_slice() else {
            return Err(invalid(format!(
                "expected `PATH BLOCK_SIZE TOTAL_SIZE`, found {} fields",
                fields.len()
            )));
        };
        let block_size = block_size
            .parse::<usize>()
            .map_err(|e| invalid(format!("block size `{block_size}`: {e}")))?;
        let total_size = total_size
            .parse::<usize>()
            .map_err(|e| invalid(format!("total size `{total_size}`: {e}")))?;

        devices.push(DeviceSpec::new(*path, block_size, total_size));
    }

    Ok(devices)
}

/// Reads and parses a device table file.
pub fn read_device_table(path: &Path) -> Result<Vec<DeviceSpec>, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    parse_device_table(&text, path)
}
