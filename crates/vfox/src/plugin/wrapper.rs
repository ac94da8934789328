//! Plugin wrapper
//!
//! The validated plugin handed to the SDK lifecycle. Hook results are
//! translated into [`Package`]s, [`Envs`] and versions; "no result" becomes
//! `None` (or an empty list for `Available`) rather than an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};
use vfox_lua::HostFunction;

use super::hooks::{Hook, HOOKS};
use super::lua_plugin::LuaPlugin;
use super::model::{
    AvailableHookCtx, EnvKeysHookCtx, Envs, Info, InstalledPackageItem, Metadata, Package,
    ParseLegacyFileHookCtx, PostInstallHookCtx, PreInstallHookCtx, PreUninstallHookCtx,
    PreUseHookCtx, UseScope,
};
use crate::cache::AvailabilityCache;
use crate::config::{LegacyVersionFileConfig, RuntimeEnv};
use crate::error::{PluginError, PluginResult};

static PLUGIN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9_\-]*$").expect("plugin name pattern is valid")
});

const PATH_KEY: &str = "PATH";

/// A loaded and validated plugin
pub struct Wrapper {
    dir: PathBuf,
    metadata: Metadata,
    plugin: LuaPlugin,
    cache: AvailabilityCache,
    legacy: LegacyVersionFileConfig,
}

impl Wrapper {
    /// Load the plugin at `dir` and validate it
    pub fn create(dir: &Path, env: &RuntimeEnv) -> PluginResult<Self> {
        if !dir.is_dir() {
            return Err(PluginError::NotFound(dir.to_path_buf()));
        }

        let (plugin, metadata) =
            LuaPlugin::load(dir, &env.runtime_version, &env.config.preload_options())?;
        if let Err(e) = validate(&plugin, &metadata) {
            plugin.close();
            return Err(e);
        }

        let cache = AvailabilityCache::new(dir, env.config.cache.available_hook_duration);
        debug!(name = %metadata.name, cache = %cache.duration(), "plugin ready");
        Ok(Self {
            dir: dir.to_path_buf(),
            metadata,
            plugin,
            cache,
            legacy: env.config.legacy_version_file.clone(),
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.plugin.has_function(name)
    }

    /// Hooks the plugin defines, in registry order
    pub fn hooks(&self) -> Vec<Hook> {
        HOOKS
            .iter()
            .map(|descriptor| descriptor.hook)
            .filter(|hook| self.plugin.has_hook(*hook))
            .collect()
    }

    /// Candidate versions, one package per candidate
    pub fn available(&self, args: &[String]) -> PluginResult<Vec<Package>> {
        let ctx = AvailableHookCtx {
            args: args.to_vec(),
        };
        let Some(items) = optional(self.cache.get_or_invoke(args, || self.plugin.available(&ctx)))?
        else {
            return Ok(Vec::new());
        };

        let packages = items
            .into_iter()
            .map(|item| {
                let main = Info {
                    name: self.metadata.name.clone(),
                    version: item.version,
                    note: item.note,
                    ..Default::default()
                };
                let additions = item
                    .addition
                    .into_iter()
                    .enumerate()
                    .map(|(i, addition)| {
                        if addition.name.is_empty() {
                            warn!(hook = %Hook::Available, "additional file {} no name provided", i + 1);
                        }
                        addition.into_info()
                    })
                    .collect();
                Package { main, additions }
            })
            .collect();
        Ok(packages)
    }

    /// The artifacts to install for `version`
    pub fn pre_install(&self, version: &str) -> PluginResult<Option<Package>> {
        let ctx = PreInstallHookCtx {
            version: version.to_string(),
        };
        let Some(result) = optional(self.plugin.pre_install(&ctx))? else {
            return Ok(None);
        };

        if result.item.version.is_empty() {
            return Err(PluginError::Contract {
                hook: Hook::PreInstall,
                message: "no version number provided".to_string(),
            });
        }
        let mut main = result.item.into_info();
        main.name = self.metadata.name.clone();

        let mut additions = Vec::with_capacity(result.addition.len());
        for (i, addition) in result.addition.into_iter().enumerate() {
            if addition.name.is_empty() {
                return Err(PluginError::Contract {
                    hook: Hook::PreInstall,
                    message: format!("additional file {} no name provided", i + 1),
                });
            }
            additions.push(addition.into_info());
        }
        Ok(Some(Package { main, additions }))
    }

    /// Environment for an installed package; `PATH` entries are collected apart
    pub fn env_keys(&self, package: &Package) -> PluginResult<Option<Envs>> {
        let (main, sdk_info) = package.installed_items();
        let ctx = EnvKeysHookCtx {
            path: main.path.clone(),
            main,
            sdk_info,
        };
        let Some(items) = optional(self.plugin.env_keys(&ctx))? else {
            return Ok(None);
        };

        let mut envs = Envs::default();
        for item in items {
            if item.key == PATH_KEY {
                envs.add_path(item.value);
            } else {
                envs.variables.insert(item.key, item.value);
            }
        }
        Ok(Some(envs))
    }

    pub fn post_install(&self, root_path: &Path, sdks: &[Info]) -> PluginResult<()> {
        if !self.plugin.has_hook(Hook::PostInstall) {
            return Ok(());
        }
        let ctx = PostInstallHookCtx {
            root_path: root_path.to_string_lossy().into_owned(),
            sdk_info: by_name(sdks.iter()),
        };
        self.plugin.post_install(&ctx)
    }

    /// The version to activate instead of `version`, if the plugin picks one
    pub fn pre_use(
        &self,
        version: &str,
        previous_version: &str,
        scope: UseScope,
        cwd: &Path,
        installed: &[Package],
    ) -> PluginResult<Option<String>> {
        if !self.plugin.has_hook(Hook::PreUse) {
            return Ok(None);
        }

        let installed_sdks = installed
            .iter()
            .map(|package| {
                let item = InstalledPackageItem::from(&package.main);
                (item.version.clone(), item)
            })
            .collect();
        let ctx = PreUseHookCtx {
            cwd: cwd.to_string_lossy().into_owned(),
            scope: scope.as_str().to_string(),
            version: version.to_string(),
            previous_version: previous_version.to_string(),
            installed_sdks,
        };
        Ok(optional(self.plugin.pre_use(&ctx))?.map(|result| result.version))
    }

    /// The version pinned by a legacy version file such as `.nvmrc`
    ///
    /// `installed_versions` is handed to the plugin as a callable.
    pub fn parse_legacy_file<F>(&self, path: &Path, installed_versions: F) -> PluginResult<Option<String>>
    where
        F: Fn() -> Vec<String> + 'static,
    {
        if !self.legacy.enable
            || self.metadata.legacy_filenames.is_empty()
            || !self.plugin.has_hook(Hook::ParseLegacyFile)
        {
            return Ok(None);
        }

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ctx = ParseLegacyFileHookCtx {
            filepath: path.to_string_lossy().into_owned(),
            filename,
            get_installed_versions: HostFunction::new(move || installed_versions()),
            strategy: self.legacy.strategy.clone(),
        };
        Ok(optional(self.plugin.parse_legacy_file(&ctx))?.map(|result| result.version))
    }

    pub fn pre_uninstall(&self, package: &Package) -> PluginResult<()> {
        if !self.plugin.has_hook(Hook::PreUninstall) {
            return Ok(());
        }
        let (main, sdk_info) = package.installed_items();
        self.plugin.pre_uninstall(&PreUninstallHookCtx { main, sdk_info })
    }

    /// Release the interpreter and persist the availability cache
    pub fn close(self) {
        debug!(name = %self.metadata.name, "closing plugin");
        self.plugin.close();
        self.cache.close();
    }
}

fn validate(plugin: &LuaPlugin, metadata: &Metadata) -> PluginResult<()> {
    if metadata.name.is_empty() {
        return Err(PluginError::MissingName);
    }
    if !PLUGIN_NAME.is_match(&metadata.name) {
        return Err(PluginError::InvalidName(metadata.name.clone()));
    }
    for descriptor in HOOKS.iter().filter(|d| d.required) {
        if !plugin.has_hook(descriptor.hook) {
            return Err(PluginError::MissingHook(descriptor.hook));
        }
    }
    Ok(())
}

/// Move the no-result sentinel into `None`
fn optional<T>(result: PluginResult<T>) -> PluginResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_no_result() => Ok(None),
        Err(e) => Err(e),
    }
}

fn by_name<'a>(infos: impl Iterator<Item = &'a Info>) -> BTreeMap<String, InstalledPackageItem> {
    infos
        .map(|info| (info.name.clone(), InstalledPackageItem::from(info)))
        .collect()
}
