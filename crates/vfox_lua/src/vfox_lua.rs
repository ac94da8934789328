//! vfox Lua - The plugin runtime bridge
//!
//! This crate provides:
//! - A value codec between Rust records and Lua values ([`codec`])
//! - The guest runtime adapter that boots a plugin interpreter ([`vm`])
//! - Bootstrap globals injected after plugin load ([`globals`])
//! - Preloaded helper modules for plugin code ([`modules`])

extern crate self as vfox_lua;

pub mod codec;
pub mod error;
pub mod globals;
pub mod modules;
pub mod vm;

pub use mlua;

pub use codec::{marshal, unmarshal, Dynamic, HostFunction, Kind, Marshal, Unmarshal, Variadic};
pub use error::{CodecError, VmError, VmResult};
pub use globals::{Navigator, RuntimeInfo};
pub use modules::PreloadOptions;
pub use vm::LuaVm;

/// Derive macros for records, see [`vfox_macros`]
pub use vfox_macros::{Marshal, Unmarshal};

/// Product name used in user agents and module names
pub const PRODUCT: &str = "vfox";
