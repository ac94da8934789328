//! Runtime Configuration
//!
//! The slice of user configuration the plugin bridge consumes, loaded from a
//! TOML file. Every section falls back to its defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};
use vfox_lua::PreloadOptions;

use crate::cache::CacheDuration;

/// Errors loading the configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub legacy_version_file: LegacyVersionFileConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long `Available` results are kept: `0` disables, `-1` never expires
    #[serde(default)]
    pub available_hook_duration: CacheDuration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyVersionFileConfig {
    #[serde(default = "default_true")]
    pub enable: bool,
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

impl Default for LegacyVersionFileConfig {
    fn default() -> Self {
        Self {
            enable: default_true(),
            strategy: default_strategy(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_strategy() -> String {
    "specified".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Options for the Lua preload modules
    pub fn preload_options(&self) -> PreloadOptions {
        PreloadOptions {
            proxy: (self.proxy.enable && !self.proxy.url.is_empty())
                .then(|| self.proxy.url.clone()),
            root: None,
        }
    }
}

/// Context injected into every plugin the runtime creates
#[derive(Debug, Clone, Default)]
pub struct RuntimeEnv {
    pub runtime_version: String,
    pub config: Config,
}

impl RuntimeEnv {
    pub fn new(runtime_version: impl Into<String>, config: Config) -> Self {
        Self {
            runtime_version: runtime_version.into(),
            config,
        }
    }
}
