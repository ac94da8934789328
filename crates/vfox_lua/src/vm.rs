//! Guest Runtime Adapter
//!
//! One [`LuaVm`] is created per plugin and is never shared. Calls are
//! synchronous; a Lua function that never returns blocks the caller.

use std::fs;
use std::path::{Path, PathBuf};

use mlua::{Function, Lua, MultiValue, Table, Value};

use crate::codec::{Marshal, Unmarshal};
use crate::error::{VmError, VmResult};
use crate::modules::{self, PreloadOptions};

const PRELUDE: &str = include_str!("prelude.lua");

/// A Lua interpreter hosting one plugin
pub struct LuaVm {
    lua: Lua,
}

impl LuaVm {
    pub fn new() -> Self {
        Self { lua: Lua::new() }
    }

    /// Route `print` to tracing, run the bundled prelude, then register the
    /// preload modules
    pub fn prepare(&self, options: &PreloadOptions) -> VmResult<()> {
        self.route_print()?;
        self.do_string(PRELUDE, "prelude")?;
        modules::preload(&self.lua, options)?;
        Ok(())
    }

    fn route_print(&self) -> VmResult<()> {
        let print = self.lua.create_function(|lua, args: MultiValue| {
            let tostring: Function = lua.globals().get("tostring")?;
            let parts = args
                .into_iter()
                .map(|value| tostring.call::<String>(value))
                .collect::<mlua::Result<Vec<_>>>()?;
            tracing::info!(target: "vfox::plugin", "{}", parts.join("\t"));
            Ok(())
        })?;
        self.lua.globals().set("print", print)?;
        Ok(())
    }

    /// Restrict `require` to `<dir>/?.lua` for each of `dirs`, in order
    pub fn limit_package_path(&self, dirs: &[PathBuf]) -> VmResult<()> {
        let path = dirs
            .iter()
            .map(|dir| dir.join("?.lua").to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(";");

        let package: Table = self.lua.globals().get("package")?;
        package.set("path", path)?;
        package.set("cpath", "")?;
        Ok(())
    }

    pub fn do_file(&self, path: &Path) -> VmResult<()> {
        let source = fs::read_to_string(path).map_err(|source| VmError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::trace!(path = %path.display(), "loading lua file");
        self.lua
            .load(source)
            .set_name(format!("@{}", path.display()))
            .exec()?;
        Ok(())
    }

    pub fn do_string(&self, code: &str, name: &str) -> VmResult<()> {
        self.lua.load(code).set_name(name).exec()?;
        Ok(())
    }

    pub fn set_global<T: Marshal + ?Sized>(&self, name: &str, value: &T) -> VmResult<()> {
        let value = value.marshal(&self.lua)?;
        self.lua.globals().set(name, value)?;
        Ok(())
    }

    /// Decode a global into `T`; an absent global yields `T::default()`
    pub fn global<T: Unmarshal>(&self, name: &str) -> VmResult<T> {
        let value: Value = self.lua.globals().get(name)?;
        let mut dest = T::default();
        dest.unmarshal(&value)?;
        Ok(dest)
    }

    pub fn global_table(&self, name: &str) -> VmResult<Option<Table>> {
        match self.lua.globals().get::<Value>(name)? {
            Value::Table(table) => Ok(Some(table)),
            _ => Ok(None),
        }
    }

    /// Whether `obj[name]` is a function
    pub fn has_method(&self, obj: &Table, name: &str) -> bool {
        matches!(obj.get::<Value>(name), Ok(Value::Function(_)))
    }

    /// Call `obj[name](obj, arg)` and keep the first returned value
    pub fn call_method(&self, obj: &Table, name: &str, arg: Value) -> VmResult<Value> {
        let Value::Function(function) = obj.get::<Value>(name)? else {
            return Err(VmError::FunctionNotFound(name.to_string()));
        };
        Ok(function.call::<Value>((obj.clone(), arg))?)
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Release the interpreter
    pub fn close(self) {
        drop(self.lua);
    }
}

impl Default for LuaVm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_prelude_defines_print_table() {
        let vm = LuaVm::new();
        vm.prepare(&PreloadOptions::default()).unwrap();
        vm.do_string("assert(type(printTable) == 'function')", "check")
            .unwrap();
    }

    #[test]
    fn test_print_is_routed() {
        let vm = LuaVm::new();
        vm.prepare(&PreloadOptions::default()).unwrap();
        vm.do_string("print('hello', 1, nil, true)", "check").unwrap();
        vm.do_string("printTable({ a = { b = 1 } })", "check").unwrap();
    }

    #[test]
    fn test_preload_modules_are_requirable() {
        let vm = LuaVm::new();
        vm.prepare(&PreloadOptions::default()).unwrap();
        vm.do_string(
            r#"
            local json = require("json")
            local strings = require("vfox.strings")
            assert(json.encode({1, 2}) == "[1,2]")
            assert(strings.has_prefix("vfox", "vf"))
            local html = require("html")
            assert(html.parse("<p>hi</p>"):find("p"):text() == "hi")
            assert(type(require("file").symlink) == "function")
            "#,
            "check",
        )
        .unwrap();
    }

    #[test]
    fn test_limit_package_path() {
        let dir = TempDir::new().unwrap();
        let hooks = dir.path().join("hooks");
        let lib = dir.path().join("lib");
        fs::create_dir_all(&hooks).unwrap();
        fs::create_dir_all(&lib).unwrap();
        fs::write(hooks.join("util.lua"), "return { from = 'hooks' }").unwrap();
        fs::write(lib.join("util.lua"), "return { from = 'lib' }").unwrap();
        fs::write(lib.join("extra.lua"), "return { from = 'lib' }").unwrap();

        let vm = LuaVm::new();
        vm.limit_package_path(&[hooks, lib]).unwrap();
        vm.do_string(
            r#"
            assert(require("util").from == "hooks")
            assert(require("extra").from == "lib")
            assert(not pcall(require, "socket"))
            "#,
            "check",
        )
        .unwrap();
    }

    #[test]
    fn test_call_method_passes_self() {
        let vm = LuaVm::new();
        vm.do_string(
            r#"
            PLUGIN = { name = "java" }
            function PLUGIN:Greet(ctx)
                return { text = self.name .. "@" .. ctx.version }
            end
            "#,
            "plugin",
        )
        .unwrap();

        let plugin = vm.global_table("PLUGIN").unwrap().unwrap();
        assert!(vm.has_method(&plugin, "Greet"));
        assert!(!vm.has_method(&plugin, "name"));

        let ctx = vm.lua().create_table().unwrap();
        ctx.set("version", "21").unwrap();
        let Value::Table(result) = vm.call_method(&plugin, "Greet", Value::Table(ctx)).unwrap()
        else {
            panic!("expected table");
        };
        assert_eq!(result.get::<String>("text").unwrap(), "java@21");
    }

    #[test]
    fn test_call_missing_method() {
        let vm = LuaVm::new();
        vm.do_string("PLUGIN = {}", "plugin").unwrap();
        let plugin = vm.global_table("PLUGIN").unwrap().unwrap();
        let err = vm.call_method(&plugin, "Available", Value::Nil).unwrap_err();
        assert!(matches!(err, VmError::FunctionNotFound(name) if name == "Available"));
    }

    #[test]
    fn test_do_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("broken.lua");
        fs::write(&file, "error('boom')").unwrap();

        let vm = LuaVm::new();
        let err = vm.do_file(&file).unwrap_err().to_string();
        assert!(err.contains("broken.lua"));
        assert!(err.contains("boom"));

        let missing = vm.do_file(&dir.path().join("missing.lua")).unwrap_err();
        assert!(matches!(missing, VmError::Read { .. }));
    }

    #[test]
    fn test_global_round_trip() {
        let vm = LuaVm::new();
        vm.set_global("OS_TYPE", "linux").unwrap();
        let os: String = vm.global("OS_TYPE").unwrap();
        assert_eq!(os, "linux");

        let missing: Option<String> = vm.global("NOPE").unwrap();
        assert_eq!(missing, None);
    }
}
