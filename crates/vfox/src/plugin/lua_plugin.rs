//! Lua plugin
//!
//! Boots one interpreter per plugin directory and exposes one typed call per
//! hook. Two layouts are accepted:
//! - `main.lua` holding the plugin object and every hook
//! - `metadata.lua` plus `hooks/<hook>.lua`, with `lib/` for shared code

use std::path::{Path, PathBuf};

use tracing::{debug, info, trace};
use vfox_lua::globals::{self, PLUGIN};
use vfox_lua::mlua::{Table, Value};
use vfox_lua::{marshal, unmarshal, LuaVm, Marshal, Navigator, PreloadOptions, RuntimeInfo, Unmarshal, VmError};

use super::hooks::{Hook, HOOKS};
use super::model::{
    AvailableHookCtx, AvailableHookResultItem, EnvKeysHookCtx, EnvKeysHookResultItem, Metadata,
    ParseLegacyFileHookCtx, ParseLegacyFileResult, PostInstallHookCtx, PreInstallHookCtx,
    PreInstallHookResult, PreUninstallHookCtx, PreUseHookCtx, PreUseHookResult,
};
use crate::error::{PluginError, PluginResult};

const MAIN_FILE: &str = "main.lua";
const METADATA_FILE: &str = "metadata.lua";
const HOOKS_DIR: &str = "hooks";
const LIB_DIR: &str = "lib";

/// A loaded plugin: its interpreter and its plugin object
pub struct LuaPlugin {
    vm: LuaVm,
    plugin: Table,
}

impl LuaPlugin {
    /// Boot an interpreter for the plugin at `dir`
    ///
    /// Globals are injected after every plugin file has run.
    pub fn load(
        dir: &Path,
        runtime_version: &str,
        options: &PreloadOptions,
    ) -> PluginResult<(Self, Metadata)> {
        debug!(dir = %dir.display(), "loading plugin");

        let options = PreloadOptions {
            root: Some(dir.to_path_buf()),
            ..options.clone()
        };
        let vm = LuaVm::new();
        vm.prepare(&options).map_err(PluginError::Load)?;

        let main = dir.join(MAIN_FILE);
        if main.is_file() {
            vm.limit_package_path(&[dir.to_path_buf()])
                .map_err(PluginError::Load)?;
            vm.do_file(&main).map_err(PluginError::Load)?;
        } else {
            load_split_layout(&vm, dir)?;
        }

        let plugin = vm
            .global_table(PLUGIN)
            .map_err(PluginError::Load)?
            .ok_or(PluginError::PluginObjectNotFound)?;

        let mut metadata = Metadata::default();
        unmarshal(&Value::Table(plugin.clone()), &mut metadata)
            .map_err(|e| PluginError::Load(VmError::Codec(e)))?;

        let runtime = RuntimeInfo::current(runtime_version, dir);
        let navigator = Navigator::new(runtime_version, &metadata.name, &metadata.version);
        globals::inject(&vm, &runtime, &navigator).map_err(PluginError::Load)?;

        info!(name = %metadata.name, version = %metadata.version, "plugin loaded");
        Ok((Self { vm, plugin }, metadata))
    }

    /// Whether the plugin object has a function named `name`
    pub fn has_function(&self, name: &str) -> bool {
        self.vm.has_method(&self.plugin, name)
    }

    pub fn has_hook(&self, hook: Hook) -> bool {
        self.has_function(hook.name())
    }

    pub fn available(&self, ctx: &AvailableHookCtx) -> PluginResult<Vec<AvailableHookResultItem>> {
        self.invoke(Hook::Available, ctx)
    }

    pub fn pre_install(&self, ctx: &PreInstallHookCtx) -> PluginResult<PreInstallHookResult> {
        self.invoke(Hook::PreInstall, ctx)
    }

    /// An empty list counts as no result
    pub fn env_keys(&self, ctx: &EnvKeysHookCtx) -> PluginResult<Vec<EnvKeysHookResultItem>> {
        let items: Vec<EnvKeysHookResultItem> = self.invoke(Hook::EnvKeys, ctx)?;
        if items.is_empty() {
            return Err(PluginError::NoResultProvided);
        }
        Ok(items)
    }

    /// The return value, if any, is ignored
    pub fn post_install(&self, ctx: &PostInstallHookCtx) -> PluginResult<()> {
        self.run(Hook::PostInstall, ctx)
    }

    pub fn pre_use(&self, ctx: &PreUseHookCtx) -> PluginResult<PreUseHookResult> {
        self.invoke(Hook::PreUse, ctx)
    }

    pub fn parse_legacy_file(&self, ctx: &ParseLegacyFileHookCtx) -> PluginResult<ParseLegacyFileResult> {
        self.invoke(Hook::ParseLegacyFile, ctx)
    }

    pub fn pre_uninstall(&self, ctx: &PreUninstallHookCtx) -> PluginResult<()> {
        self.run(Hook::PreUninstall, ctx)
    }

    /// Release the interpreter
    pub fn close(self) {
        let Self { vm, plugin } = self;
        drop(plugin);
        vm.close();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hook calls
    // ─────────────────────────────────────────────────────────────────────────

    fn invoke<C, R>(&self, hook: Hook, ctx: &C) -> PluginResult<R>
    where
        C: Marshal,
        R: Unmarshal,
    {
        let value = self.call(hook, ctx)?;
        if value.is_nil() {
            return Err(PluginError::NoResultProvided);
        }

        let mut result = R::default();
        unmarshal(&value, &mut result).map_err(|source| PluginError::InvalidResult { hook, source })?;
        Ok(result)
    }

    fn run<C: Marshal>(&self, hook: Hook, ctx: &C) -> PluginResult<()> {
        self.call(hook, ctx).map(|_| ())
    }

    fn call<C: Marshal>(&self, hook: Hook, ctx: &C) -> PluginResult<Value> {
        let ctx = marshal(self.vm.lua(), ctx).map_err(|source| PluginError::Context { hook, source })?;

        debug!(hook = %hook, "calling hook");
        self.vm
            .call_method(&self.plugin, hook.name(), ctx)
            .map_err(|e| match e {
                VmError::FunctionNotFound(_) => PluginError::MissingHook(hook),
                source => PluginError::Execution { hook, source },
            })
    }
}

/// `metadata.lua`, then each hook file that exists
///
/// Missing hook files are skipped here; required ones fail validation.
fn load_split_layout(vm: &LuaVm, dir: &Path) -> PluginResult<()> {
    let metadata = dir.join(METADATA_FILE);
    if !metadata.is_file() {
        return Err(PluginError::MetadataNotFound);
    }

    let hooks_dir = dir.join(HOOKS_DIR);
    let search: [PathBuf; 2] = [hooks_dir.clone(), dir.join(LIB_DIR)];
    vm.limit_package_path(&search).map_err(PluginError::Load)?;
    vm.do_file(&metadata).map_err(PluginError::Load)?;

    for descriptor in &HOOKS {
        let file = hooks_dir.join(descriptor.hook.file_name());
        if !file.is_file() {
            trace!(hook = %descriptor.hook, "hook file not present");
            continue;
        }
        vm.do_file(&file).map_err(PluginError::Load)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use tempfile::TempDir;
    use vfox_lua::HostFunction;

    use super::*;
    use crate::plugin::model::InstalledPackageItem;

    const MAIN: &str = r#"
        PLUGIN = {
            name = "java",
            version = "0.1.0",
            description = "Java SDK",
            legacyFilenames = { ".java-version", ".sdkmanrc" },
        }

        -- shadowing a bootstrap global has no effect
        OS_TYPE = "plan9"

        function PLUGIN:Available(ctx)
            if ctx.args[1] == "none" then
                return nil
            end
            if ctx.args[1] == "bad" then
                return "not a list"
            end
            return {
                { version = "21.0.1", note = "lts", addition = { { name = "jmc", version = "9" } } },
                { version = OS_TYPE },
            }
        end

        function PLUGIN:PreInstall(ctx)
            return { version = ctx.version, url = "https://example.com/jdk-" .. ctx.version .. ".tgz", md5 = "abc" }
        end

        function PLUGIN:EnvKeys(ctx)
            if ctx.main.version == "empty" then
                return {}
            end
            return {
                { key = "JAVA_HOME", value = ctx.path },
                { key = "PATH", value = ctx.path .. "/bin" },
            }
        end

        function PLUGIN:PreUse(ctx)
            error("pre use failed")
        end

        function PLUGIN:ParseLegacyFile(ctx)
            local installed = ctx.getInstalledVersions()
            return { version = ctx.filename .. ":" .. installed[1] .. ":" .. ctx.strategy }
        end
    "#;

    fn main_plugin() -> (TempDir, LuaPlugin, Metadata) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.lua"), MAIN).unwrap();
        let (plugin, metadata) =
            LuaPlugin::load(dir.path(), "1.0.0", &PreloadOptions::default()).unwrap();
        (dir, plugin, metadata)
    }

    #[test]
    fn test_load_main_layout() {
        let (_dir, plugin, metadata) = main_plugin();
        assert_eq!(metadata.name, "java");
        assert_eq!(metadata.description, "Java SDK");
        assert_eq!(metadata.legacy_filenames, vec![".java-version", ".sdkmanrc"]);

        assert!(plugin.has_hook(Hook::Available));
        assert!(!plugin.has_hook(Hook::PostInstall));
        assert!(!plugin.has_function("name"));
        plugin.close();
    }

    #[test]
    fn test_globals_injected_after_load() {
        let (dir, plugin, _) = main_plugin();
        let items = plugin.available(&AvailableHookCtx::default()).unwrap();
        assert_eq!(items[1].version, globals::os_type());

        let runtime: RuntimeInfo = plugin.vm.global(globals::RUNTIME).unwrap();
        assert_eq!(runtime.version, "1.0.0");
        assert_eq!(runtime.plugin_dir_path, dir.path().to_string_lossy());

        let navigator: Navigator = plugin.vm.global(globals::NAVIGATOR).unwrap();
        assert_eq!(navigator.user_agent, "vfox/1.0.0 vfox-java/0.1.0");
    }

    #[test]
    fn test_available_result() {
        let (_dir, plugin, _) = main_plugin();
        let items = plugin.available(&AvailableHookCtx::default()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].version, "21.0.1");
        assert_eq!(items[0].note, "lts");
        assert_eq!(items[0].addition[0].name, "jmc");
        assert!(items[1].addition.is_empty());
    }

    #[test]
    fn test_nil_result_is_no_result() {
        let (_dir, plugin, _) = main_plugin();
        let ctx = AvailableHookCtx {
            args: vec!["none".into()],
        };
        assert!(plugin.available(&ctx).unwrap_err().is_no_result());
    }

    #[test]
    fn test_malformed_result_names_hook() {
        let (_dir, plugin, _) = main_plugin();
        let ctx = AvailableHookCtx {
            args: vec!["bad".into()],
        };
        let err = plugin.available(&ctx).unwrap_err();
        assert!(matches!(err, PluginError::InvalidResult { hook: Hook::Available, .. }));
        assert_eq!(
            err.to_string(),
            "[Available] failed to unmarshal the return value: cannot unmarshal string into slice"
        );
    }

    #[test]
    fn test_script_error_names_hook() {
        let (_dir, plugin, _) = main_plugin();
        let err = plugin.pre_use(&PreUseHookCtx::default()).unwrap_err();
        assert_eq!(err.hook(), Some(Hook::PreUse));
        assert!(err.to_string().starts_with("[PreUse] "));
        assert!(err.to_string().contains("pre use failed"));
    }

    #[test]
    fn test_missing_hook() {
        let (_dir, plugin, _) = main_plugin();
        let err = plugin.post_install(&PostInstallHookCtx::default()).unwrap_err();
        assert_eq!(err.to_string(), "[PostInstall] function not found");
    }

    #[test]
    fn test_env_keys_empty_is_no_result() {
        let (_dir, plugin, _) = main_plugin();
        let mut ctx = EnvKeysHookCtx {
            path: "/sdk/java".into(),
            ..Default::default()
        };
        let items = plugin.env_keys(&ctx).unwrap();
        assert_eq!(items[0].key, "JAVA_HOME");
        assert_eq!(items[1].value, "/sdk/java/bin");

        ctx.main = InstalledPackageItem {
            version: "empty".into(),
            ..Default::default()
        };
        assert!(plugin.env_keys(&ctx).unwrap_err().is_no_result());
    }

    #[test]
    fn test_parse_legacy_file_calls_back_into_host() {
        let (_dir, plugin, _) = main_plugin();
        let ctx = ParseLegacyFileHookCtx {
            filepath: "/work/.java-version".into(),
            filename: ".java-version".into(),
            get_installed_versions: HostFunction::new(|| vec!["17".to_string()]),
            strategy: "latest_installed".into(),
        };
        let result = plugin.parse_legacy_file(&ctx).unwrap();
        assert_eq!(result.version, ".java-version:17:latest_installed");
    }

    #[test]
    fn test_load_split_layout() {
        let dir = TempDir::new().unwrap();
        let hooks = dir.path().join("hooks");
        let lib = dir.path().join("lib");
        fs::create_dir_all(&hooks).unwrap();
        fs::create_dir_all(&lib).unwrap();

        fs::write(
            dir.path().join("metadata.lua"),
            r#"PLUGIN = { name = "node", version = "1.2.0" }"#,
        )
        .unwrap();
        fs::write(
            lib.join("versions.lua"),
            r#"return { latest = function() return "20.1.0" end }"#,
        )
        .unwrap();
        fs::write(
            hooks.join("available.lua"),
            r#"
            local versions = require("versions")
            function PLUGIN:Available(ctx)
                return { { version = versions.latest() } }
            end
            "#,
        )
        .unwrap();
        fs::write(
            hooks.join("pre_uninstall.lua"),
            r#"
            function PLUGIN:PreUninstall(ctx)
                assert(ctx.sdkInfo.node.path == "/sdk/node")
            end
            "#,
        )
        .unwrap();

        let (plugin, metadata) =
            LuaPlugin::load(dir.path(), "1.0.0", &PreloadOptions::default()).unwrap();
        assert_eq!(metadata.name, "node");
        assert!(plugin.has_hook(Hook::PreUninstall));
        assert!(!plugin.has_hook(Hook::PreInstall));

        let items = plugin.available(&AvailableHookCtx::default()).unwrap();
        assert_eq!(items[0].version, "20.1.0");

        let node = InstalledPackageItem {
            path: "/sdk/node".into(),
            version: "20.1.0".into(),
            name: "node".into(),
        };
        let ctx = PreUninstallHookCtx {
            main: node.clone(),
            sdk_info: BTreeMap::from([("node".to_string(), node)]),
        };
        plugin.pre_uninstall(&ctx).unwrap();
    }

    #[test]
    fn test_missing_metadata() {
        let dir = TempDir::new().unwrap();
        let err = LuaPlugin::load(dir.path(), "1.0.0", &PreloadOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "plugin invalid, metadata file not found");
    }

    #[test]
    fn test_missing_plugin_object() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.lua"), "local x = 1").unwrap();
        let err = LuaPlugin::load(dir.path(), "1.0.0", &PreloadOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, PluginError::PluginObjectNotFound));
    }

    #[test]
    fn test_syntax_error_fails_load() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.lua"), "PLUGIN = {").unwrap();
        let err = LuaPlugin::load(dir.path(), "1.0.0", &PreloadOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, PluginError::Load(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_module_resolves_against_plugin_dir() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("current")).unwrap();
        fs::write(
            dir.path().join("main.lua"),
            r#"
            require("file").symlink("current", "latest")
            PLUGIN = { name = "java", version = "0.1.0" }
            "#,
        )
        .unwrap();
        LuaPlugin::load(dir.path(), "1.0.0", &PreloadOptions::default()).unwrap();
        assert!(dir.path().join("latest").is_dir());
    }
}
