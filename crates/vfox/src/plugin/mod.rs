//! Plugin loading and hook calls
//!
//! - [`hooks`]: the hook registry
//! - [`model`]: hook contexts, results and SDK-facing descriptors
//! - [`lua_plugin`]: a loaded Lua plugin and its typed hook calls
//! - [`wrapper`]: the validated plugin handed to the SDK lifecycle

pub mod hooks;
pub mod lua_plugin;
pub mod model;
pub mod wrapper;

pub use hooks::{Hook, HookDescriptor, HOOKS};
pub use lua_plugin::LuaPlugin;
pub use model::{Checksum, ChecksumKind, Envs, Info, Metadata, Package, UseScope};
pub use wrapper::Wrapper;
