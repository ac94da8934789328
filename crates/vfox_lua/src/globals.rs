//! Bootstrap globals
//!
//! Injected after all plugin code has loaded, so plugin code cannot shadow
//! them:
//! - `OS_TYPE`, `ARCH_TYPE`: platform identifiers
//! - `RUNTIME`: `{osType, archType, version, pluginDirPath}`
//! - `NAVIGATOR`: `{userAgent}`

use std::path::Path;

use crate::error::VmResult;
use crate::vm::LuaVm;
use crate::{Marshal, Unmarshal, PRODUCT};

pub const OS_TYPE: &str = "OS_TYPE";
pub const ARCH_TYPE: &str = "ARCH_TYPE";
pub const RUNTIME: &str = "RUNTIME";
pub const NAVIGATOR: &str = "NAVIGATOR";
pub const PLUGIN: &str = "PLUGIN";

/// Information about the host runtime, as seen by the plugin
#[derive(Debug, Clone, Default, PartialEq, Marshal, Unmarshal)]
pub struct RuntimeInfo {
    #[lua(rename = "osType")]
    pub os_type: String,
    #[lua(rename = "archType")]
    pub arch_type: String,
    pub version: String,
    #[lua(rename = "pluginDirPath")]
    pub plugin_dir_path: String,
}

impl RuntimeInfo {
    pub fn current(version: &str, plugin_dir: &Path) -> Self {
        Self {
            os_type: os_type().to_string(),
            arch_type: arch_type().to_string(),
            version: version.to_string(),
            plugin_dir_path: plugin_dir.to_string_lossy().into_owned(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Marshal, Unmarshal)]
pub struct Navigator {
    #[lua(rename = "userAgent")]
    pub user_agent: String,
}

impl Navigator {
    pub fn new(runtime_version: &str, plugin_name: &str, plugin_version: &str) -> Self {
        Self {
            user_agent: user_agent(runtime_version, plugin_name, plugin_version),
        }
    }
}

pub fn os_type() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

pub fn arch_type() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

/// `vfox/<runtime> vfox-<plugin>/<version>`, leaving out empty parts
pub fn user_agent(runtime_version: &str, plugin_name: &str, plugin_version: &str) -> String {
    let mut parts = Vec::with_capacity(2);
    if runtime_version.is_empty() {
        parts.push(PRODUCT.to_string());
    } else {
        parts.push(format!("{PRODUCT}/{runtime_version}"));
    }

    if !plugin_name.is_empty() {
        let prefix = format!("{PRODUCT}-");
        let name = if plugin_name.starts_with(&prefix) {
            plugin_name.to_string()
        } else {
            format!("{prefix}{plugin_name}")
        };
        if plugin_version.is_empty() {
            parts.push(name);
        } else {
            parts.push(format!("{name}/{plugin_version}"));
        }
    }

    parts.join(" ").trim().to_string()
}

/// Set the bootstrap globals on a loaded plugin
pub fn inject(vm: &LuaVm, runtime: &RuntimeInfo, navigator: &Navigator) -> VmResult<()> {
    vm.set_global(OS_TYPE, runtime.os_type.as_str())?;
    vm.set_global(ARCH_TYPE, runtime.arch_type.as_str())?;
    vm.set_global(RUNTIME, runtime)?;
    vm.set_global(NAVIGATOR, navigator)?;
    Ok(())
}
