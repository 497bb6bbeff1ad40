//! Configuration management for vbox-vm-status.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::platform;
use crate::report::{OutputFormat, RenderOptions};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "vbox-vm-status";

/// Prefix of environment variables overriding configuration.
const ENV_PREFIX: &str = "VBOX_VM_STATUS_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `VBOX_VM_STATUS_`, sections
///    separated by `__`, e.g. `VBOX_VM_STATUS_VBOXMANAGE__TIMEOUT_SECS`)
/// 2. TOML config file at `~/.config/vbox-vm-status/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How to run `VBoxManage`.
    pub vboxmanage: VBoxManageConfig,
    /// How to display reports.
    pub display: DisplayConfig,
}

/// `VBoxManage` invocation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VBoxManageConfig {
    /// Path to the `VBoxManage` program.
    /// Defaults to the platform's standard install location.
    pub path: Option<PathBuf>,
    /// Seconds to wait for a single `VBoxManage` call.
    pub timeout_secs: u64,
    /// Maximum `showvminfo` calls in flight at once.
    pub max_concurrent_queries: usize,
}

/// Report display settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Default output format.
    pub format: OutputFormat,
    /// Fetch and show per-VM details by default.
    pub details: bool,
    /// Show VM UUIDs by default.
    pub show_uuid: bool,
}

impl Default for VBoxManageConfig {
    fn default() -> Self {
        Self {
            path: None, // Resolved to the platform default at runtime
            timeout_secs: 30,
            max_concurrent_queries: 4,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A config file that does not exist is not an error; defaults apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.vboxmanage.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "vboxmanage.timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.vboxmanage.max_concurrent_queries == 0 {
            return Err(Error::ConfigValidation {
                message: "vboxmanage.max_concurrent_queries must be greater than 0".to_string(),
            });
        }

        if let Some(path) = &self.vboxmanage.path {
            if path.as_os_str().is_empty() {
                return Err(Error::ConfigValidation {
                    message: "vboxmanage.path must not be empty".to_string(),
                });
            }
        }

        Ok(())
    }

    /// Get the `VBoxManage` path, resolving the platform default if not set.
    #[must_use]
    pub fn vboxmanage_path(&self) -> PathBuf {
        self.vboxmanage
            .path
            .clone()
            .unwrap_or_else(platform::default_vboxmanage_path)
    }

    /// Get the per-call timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.vboxmanage.timeout_secs)
    }

    /// Get the configured render options.
    #[must_use]
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            show_uuid: self.display.show_uuid,
            details: self.display.details,
        }
    }
}
