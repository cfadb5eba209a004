//! Configuration loader with multi-source merging

use crate::device_table::read_device_table;
use crate::{EekvConfig, Paths};
use anyhow::{Context, Result};
use eekv::DeviceSpec;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Device list read from a line-format table, merged like any other layer.
#[derive(Serialize)]
struct DeviceTableLayer {
    devices: Vec<DeviceSpec>,
}

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    system_file: Option<PathBuf>,
    user_file: Option<PathBuf>,
    explicit_file: Option<PathBuf>,
    legacy_table: Option<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader reading the standard locations
    pub fn new() -> Self {
        Self {
            system_file: Some(Paths::system_config_file()),
            user_file: Paths::new().user_config_file().ok(),
            explicit_file: None,
            legacy_table: Some(Paths::legacy_device_table()),
            env_prefix: "EEKV".to_string(),
        }
    }

    /// Create a loader that reads no standard location, only what it is given
    pub fn isolated() -> Self {
        Self {
            system_file: None,
            user_file: None,
            explicit_file: None,
            legacy_table: None,
            env_prefix: "EEKV".to_string(),
        }
    }

    /// Add an explicit config file, layered over the system and user files.
    ///
    /// Files ending in `.toml` are read as TOML; anything else is read as a
    /// device table.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.explicit_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the system config file location
    pub fn with_system_file(mut self, path: impl AsRef<Path>) -> Self {
        self.system_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the user config file location
    pub fn with_user_file(mut self, path: impl AsRef<Path>) -> Self {
        self.user_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Override the fallback device table location
    pub fn with_legacy_table(mut self, path: impl AsRef<Path>) -> Self {
        self.legacy_table = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix (default: "EEKV")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<EekvConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = EekvConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. System config (/etc/eekv/eekv.toml)
        // 3. User config (~/.config/eekv/config.toml)
        for file in [&self.system_file, &self.user_file].into_iter().flatten() {
            if file.exists() {
                tracing::debug!(path = %file.display(), "reading config file");
                builder = builder.add_source(
                    config::File::from(file.as_path())
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        // 4. Explicit file (--config)
        if let Some(file) = &self.explicit_file {
            tracing::debug!(path = %file.display(), "reading explicit config file");
            if is_toml(file) {
                builder = builder.add_source(
                    config::File::from(file.as_path())
                        .required(true)
                        .format(config::FileFormat::Toml),
                );
            } else {
                let devices = read_device_table(file)?;
                builder =
                    builder.add_source(config::Config::try_from(&DeviceTableLayer { devices })?);
            }
        }

        // 5. Environment variables (EEKV_TRANSFER__MAX_ATTEMPTS=...)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Build and deserialize
        let config = builder.build().context("Failed to build configuration")?;

        let mut eekv_config: EekvConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        // Fall back to the system device table when nothing named a device
        if eekv_config.devices.is_empty() {
            if let Some(table) = self.legacy_table.as_deref().filter(|p| p.exists()) {
                tracing::debug!(path = %table.display(), "reading fallback device table");
                eekv_config.devices = read_device_table(table)?;
            }
        }

        Ok(eekv_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}
