//! Plugin model
//!
//! Hook contexts are marshaled into Lua, hook results are unmarshaled out of
//! it. `Info`/`Package` are what the SDK lifecycle sees.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use vfox_lua::{HostFunction, Marshal, Unmarshal};

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of a plugin, read from its plugin object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Unmarshal)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    pub version: String,
    pub description: String,
    #[lua(rename = "updateUrl")]
    pub update_url: String,
    #[lua(rename = "manifestUrl")]
    pub manifest_url: String,
    pub homepage: String,
    pub license: String,
    #[lua(rename = "minRuntimeVersion")]
    pub min_runtime_version: String,
    pub notes: Vec<String>,
    #[lua(rename = "legacyFilenames")]
    pub legacy_filenames: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Checksums
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Marshal, Unmarshal)]
pub struct CheckSumItem {
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub sha512: String,
    #[serde(default)]
    pub sha1: String,
    #[serde(default)]
    pub md5: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    Sha256,
    Md5,
    Sha1,
    Sha512,
    #[default]
    None,
}

impl ChecksumKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChecksumKind::Sha256 => "sha256",
            ChecksumKind::Md5 => "md5",
            ChecksumKind::Sha1 => "sha1",
            ChecksumKind::Sha512 => "sha512",
            ChecksumKind::None => "none",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Checksum {
    #[serde(rename = "type")]
    pub kind: ChecksumKind,
    pub value: String,
}

impl Checksum {
    /// The sentinel for artifacts without a checksum
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.kind == ChecksumKind::None
    }
}

impl CheckSumItem {
    /// First non-empty of sha256, md5, sha1, sha512
    pub fn checksum(&self) -> Checksum {
        let candidates = [
            (ChecksumKind::Sha256, &self.sha256),
            (ChecksumKind::Md5, &self.md5),
            (ChecksumKind::Sha1, &self.sha1),
            (ChecksumKind::Sha512, &self.sha512),
        ];
        candidates
            .into_iter()
            .find(|(_, value)| !value.is_empty())
            .map(|(kind, value)| Checksum {
                kind,
                value: value.clone(),
            })
            .unwrap_or_else(Checksum::none)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Packages
// ─────────────────────────────────────────────────────────────────────────────

/// One downloadable artifact as described by a plugin
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Marshal, Unmarshal)]
pub struct PreInstallPackageItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    /// Remote URL or local file path
    #[lua(rename = "url")]
    #[serde(default, rename = "url")]
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub note: String,
    #[lua(flatten)]
    #[serde(default)]
    pub checksum: Option<CheckSumItem>,
}

impl PreInstallPackageItem {
    pub fn into_info(self) -> Info {
        let checksum = self
            .checksum
            .as_ref()
            .map(CheckSumItem::checksum)
            .unwrap_or_else(Checksum::none);
        Info {
            name: self.name,
            version: self.version,
            path: self.path,
            headers: self.headers,
            note: self.note,
            checksum,
        }
    }
}

/// An installable artifact handed to the SDK lifecycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Info {
    pub name: String,
    pub version: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub note: String,
    pub checksum: Checksum,
}

impl Info {
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// A main artifact plus any additional ones installed alongside
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Package {
    pub main: Info,
    pub additions: Vec<Info>,
}

impl Package {
    /// Every artifact of the package as the plugin sees installed SDKs
    pub fn installed_items(&self) -> (InstalledPackageItem, BTreeMap<String, InstalledPackageItem>) {
        let main = InstalledPackageItem::from(&self.main);
        let mut sdk_info = BTreeMap::new();
        for addition in &self.additions {
            let item = InstalledPackageItem::from(addition);
            sdk_info.insert(item.name.clone(), item);
        }
        (main, sdk_info)
    }
}

/// An installed SDK as exported to plugins
#[derive(Debug, Clone, Default, PartialEq, Eq, Marshal, Unmarshal)]
pub struct InstalledPackageItem {
    pub path: String,
    pub version: String,
    pub name: String,
}

impl From<&Info> for InstalledPackageItem {
    fn from(info: &Info) -> Self {
        Self {
            path: info.path.clone(),
            version: info.version.clone(),
            name: info.name.clone(),
        }
    }
}

/// Environment produced by the `EnvKeys` hook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Envs {
    pub variables: BTreeMap<String, String>,
    /// `PATH` entries in the order the plugin listed them, without duplicates
    pub paths: Vec<String>,
}

impl Envs {
    pub fn add_path(&mut self, path: impl Into<String>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Hook contexts and results
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Marshal)]
pub struct AvailableHookCtx {
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Unmarshal)]
pub struct AvailableHookResultItem {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub addition: Vec<PreInstallPackageItem>,
}

#[derive(Debug, Clone, Default, Marshal)]
pub struct PreInstallHookCtx {
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Unmarshal)]
pub struct PreInstallHookResult {
    #[lua(flatten)]
    pub item: PreInstallPackageItem,
    pub addition: Vec<PreInstallPackageItem>,
}

/// Where a version is being activated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UseScope {
    Global,
    #[default]
    Session,
    Project,
}

impl UseScope {
    pub fn as_str(self) -> &'static str {
        match self {
            UseScope::Global => "global",
            UseScope::Session => "session",
            UseScope::Project => "project",
        }
    }
}

#[derive(Debug, Clone, Default, Marshal)]
pub struct PreUseHookCtx {
    pub cwd: String,
    pub scope: String,
    pub version: String,
    #[lua(rename = "previousVersion")]
    pub previous_version: String,
    /// Keyed by version
    #[lua(rename = "installedSdks")]
    pub installed_sdks: BTreeMap<String, InstalledPackageItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Unmarshal)]
pub struct PreUseHookResult {
    pub version: String,
}

#[derive(Debug, Clone, Default, Marshal)]
pub struct PostInstallHookCtx {
    #[lua(rename = "rootPath")]
    pub root_path: String,
    #[lua(rename = "sdkInfo")]
    pub sdk_info: BTreeMap<String, InstalledPackageItem>,
}

#[derive(Debug, Clone, Default, Marshal)]
pub struct EnvKeysHookCtx {
    pub main: InstalledPackageItem,
    pub path: String,
    #[lua(rename = "sdkInfo")]
    pub sdk_info: BTreeMap<String, InstalledPackageItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Unmarshal)]
pub struct EnvKeysHookResultItem {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Marshal)]
pub struct ParseLegacyFileHookCtx {
    pub filepath: String,
    pub filename: String,
    #[lua(rename = "getInstalledVersions")]
    pub get_installed_versions: HostFunction,
    /// `latest_installed`, `latest_available` or `specified`
    pub strategy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Unmarshal)]
pub struct ParseLegacyFileResult {
    pub version: String,
}

#[derive(Debug, Clone, Default, Marshal)]
pub struct PreUninstallHookCtx {
    pub main: InstalledPackageItem,
    #[lua(rename = "sdkInfo")]
    pub sdk_info: BTreeMap<String, InstalledPackageItem>,
}
