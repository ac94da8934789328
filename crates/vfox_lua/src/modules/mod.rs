//! Preload modules
//!
//! Registered into `package.preload`, so they load lazily on `require`:
//! - `json`: encode/decode
//! - `vfox.strings`: string helpers
//! - `http`: blocking HTTP client honoring the configured proxy
//! - `html`: parse a page and query it with CSS selectors
//! - `file`: symlinks relative to the plugin directory

pub mod file;
pub mod html;
pub mod http;
pub mod json;
pub mod strings;

use std::path::PathBuf;

use mlua::{Lua, MultiValue, Table, Value};

/// Configuration handed to the preload modules
#[derive(Debug, Clone, Default)]
pub struct PreloadOptions {
    /// Proxy URL for the `http` module, if proxying is enabled
    pub proxy: Option<String>,
    /// Directory relative `file` paths resolve against
    pub root: Option<PathBuf>,
}

pub fn preload(lua: &Lua, options: &PreloadOptions) -> mlua::Result<()> {
    let package: Table = lua.globals().get("package")?;
    let loaders: Table = package.get("preload")?;

    loaders.set(json::MODULE, lua.create_function(|lua, ()| json::module(lua))?)?;
    loaders.set(
        strings::MODULE,
        lua.create_function(|lua, ()| strings::module(lua))?,
    )?;

    let proxy = options.proxy.clone();
    loaders.set(
        http::MODULE,
        lua.create_function(move |lua, ()| http::module(lua, proxy.as_deref()))?,
    )?;

    loaders.set(html::MODULE, lua.create_function(|lua, ()| html::module(lua))?)?;
    let root = options.root.clone();
    loaders.set(
        file::MODULE,
        lua.create_function(move |lua, ()| file::module(lua, root.clone()))?,
    )?;
    Ok(())
}

/// `nil, message`
pub(crate) fn failure(lua: &Lua, message: impl std::fmt::Display) -> mlua::Result<MultiValue> {
    Ok(MultiValue::from_vec(vec![
        Value::Nil,
        Value::String(lua.create_string(message.to_string())?),
    ]))
}
