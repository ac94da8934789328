//! `vfox.strings` module

use mlua::{Lua, Table, Value};

use crate::codec::Unmarshal;

pub const MODULE: &str = "vfox.strings";

pub fn module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;

    module.set(
        "split",
        lua.create_function(|_, (s, sep): (String, String)| Ok(split(&s, &sep)))?,
    )?;
    module.set(
        "has_prefix",
        lua.create_function(|_, (s, prefix): (String, String)| Ok(s.starts_with(&prefix)))?,
    )?;
    module.set(
        "has_suffix",
        lua.create_function(|_, (s, suffix): (String, String)| Ok(s.ends_with(&suffix)))?,
    )?;
    module.set(
        "trim",
        lua.create_function(|_, (s, cutset): (String, String)| {
            Ok(s.trim_matches(|c| cutset.contains(c)).to_string())
        })?,
    )?;
    module.set(
        "trim_prefix",
        lua.create_function(|_, (s, prefix): (String, String)| {
            Ok(s.strip_prefix(prefix.as_str()).unwrap_or(&s).to_string())
        })?,
    )?;
    module.set(
        "trim_suffix",
        lua.create_function(|_, (s, suffix): (String, String)| {
            Ok(s.strip_suffix(suffix.as_str()).unwrap_or(&s).to_string())
        })?,
    )?;
    module.set(
        "trim_space",
        lua.create_function(|_, s: String| Ok(s.trim().to_string()))?,
    )?;
    module.set(
        "contains",
        lua.create_function(|_, (s, sub): (String, String)| Ok(s.contains(&sub)))?,
    )?;
    module.set(
        "join",
        lua.create_function(|_, (list, sep): (Value, String)| {
            let mut parts: Vec<String> = Vec::new();
            parts.unmarshal(&list).map_err(mlua::Error::external)?;
            Ok(parts.join(&sep))
        })?,
    )?;

    Ok(module)
}

fn split(s: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return s.chars().map(String::from).collect();
    }
    s.split(sep).map(String::from).collect()
}
