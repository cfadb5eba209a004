//! Path utilities and XDG directory discovery

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::PathBuf;

/// System-wide TOML configuration.
pub const SYSTEM_CONFIG_FILE: &str = "/etc/eekv/eekv.toml";

/// System-wide device table in the line format.
pub const LEGACY_DEVICE_TABLE: &str = "/etc/eekv.conf";

/// XDG-compliant paths for eekv
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    /// Create a new Paths instance with XDG discovery
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("com", "eekv", "eekv"),
        }
    }

    /// Get user config directory (~/.config/eekv/)
    pub fn user_config_dir(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().to_path_buf())
            .ok_or_else(|| {
                ConfigError::XdgError("Failed to determine user config directory".to_string())
            })
    }

    /// Get user config file path (~/.config/eekv/config.toml)
    pub fn user_config_file(&self) -> Result<PathBuf, ConfigError> {
        Ok(self.user_config_dir()?.join("config.toml"))
    }

    /// Get system config file path (/etc/eekv/eekv.toml)
    pub fn system_config_file() -> PathBuf {
        PathBuf::from(SYSTEM_CONFIG_FILE)
    }

    /// Get the legacy device table path (/etc/eekv.conf)
    pub fn legacy_device_table() -> PathBuf {
        PathBuf::from(LEGACY_DEVICE_TABLE)
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
