//! Hook registry
//!
//! The fixed, ordered set of lifecycle hooks a plugin may implement.

use std::fmt;

/// Static description of one hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookDescriptor {
    pub hook: Hook,
    /// File under `hooks/` holding the hook in the split layout
    pub filename: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Available,
    PreInstall,
    EnvKeys,
    PostInstall,
    PreUse,
    ParseLegacyFile,
    PreUninstall,
}

pub const HOOKS: [HookDescriptor; 7] = [
    HookDescriptor {
        hook: Hook::Available,
        filename: "available",
        required: true,
    },
    HookDescriptor {
        hook: Hook::PreInstall,
        filename: "pre_install",
        required: true,
    },
    HookDescriptor {
        hook: Hook::EnvKeys,
        filename: "env_keys",
        required: true,
    },
    HookDescriptor {
        hook: Hook::PostInstall,
        filename: "post_install",
        required: false,
    },
    HookDescriptor {
        hook: Hook::PreUse,
        filename: "pre_use",
        required: false,
    },
    HookDescriptor {
        hook: Hook::ParseLegacyFile,
        filename: "parse_legacy_file",
        required: false,
    },
    HookDescriptor {
        hook: Hook::PreUninstall,
        filename: "pre_uninstall",
        required: false,
    },
];

impl Hook {
    /// Name of the function on the plugin object
    pub fn name(self) -> &'static str {
        match self {
            Hook::Available => "Available",
            Hook::PreInstall => "PreInstall",
            Hook::EnvKeys => "EnvKeys",
            Hook::PostInstall => "PostInstall",
            Hook::PreUse => "PreUse",
            Hook::ParseLegacyFile => "ParseLegacyFile",
            Hook::PreUninstall => "PreUninstall",
        }
    }

    pub fn descriptor(self) -> &'static HookDescriptor {
        // HOOKS is ordered like the enum
        &HOOKS[self as usize]
    }

    pub fn is_required(self) -> bool {
        self.descriptor().required
    }

    /// `<filename>.lua`
    pub fn file_name(self) -> String {
        format!("{}.lua", self.descriptor().filename)
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
