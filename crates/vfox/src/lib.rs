//! vfox - Plugin runtime bridge
//!
//! This crate provides the plugin side of the SDK version manager:
//! - Hook registry and typed hook calls into Lua plugins
//! - Availability cache persisted per plugin directory
//! - Plugin wrapper validating plugins and translating hook results
//! - Runtime configuration

// Re-export the Lua bridge
pub use vfox_lua;

pub mod cache;
pub mod config;
pub mod error;
pub mod plugin;

pub use config::{Config, RuntimeEnv};
pub use error::{PluginError, PluginResult};
pub use plugin::{Hook, Metadata, Wrapper};
