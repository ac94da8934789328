//! Error taxonomy of the plugin bridge

use std::path::PathBuf;

use vfox_lua::{CodecError, VmError};

use crate::plugin::Hook;

/// Errors surfaced to collaborators of a plugin
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("plugin not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("plugin invalid, metadata file not found")]
    MetadataNotFound,

    #[error("plugin object not found")]
    PluginObjectNotFound,

    #[error("failed to load plugin: {0}")]
    Load(#[source] VmError),

    #[error("no plugin name provided")]
    MissingName,

    #[error("invalid plugin name [{0}]")]
    InvalidName(String),

    #[error("[{0}] function not found")]
    MissingHook(Hook),

    /// The hook ran but returned nothing; callers fall back to defaults
    #[error("no result provided")]
    NoResultProvided,

    #[error("[{hook}] failed to marshal the context: {source}")]
    Context {
        hook: Hook,
        #[source]
        source: CodecError,
    },

    #[error("[{hook}] failed to unmarshal the return value: {source}")]
    InvalidResult {
        hook: Hook,
        #[source]
        source: CodecError,
    },

    #[error("[{hook}] {source}")]
    Execution {
        hook: Hook,
        #[source]
        source: VmError,
    },

    #[error("[{hook}] {message}")]
    Contract { hook: Hook, message: String },
}

impl PluginError {
    /// Whether this is the "hook returned nothing" sentinel
    pub fn is_no_result(&self) -> bool {
        matches!(self, PluginError::NoResultProvided)
    }

    /// The hook this error is attributed to, if any
    pub fn hook(&self) -> Option<Hook> {
        match self {
            PluginError::MissingHook(hook)
            | PluginError::Context { hook, .. }
            | PluginError::InvalidResult { hook, .. }
            | PluginError::Execution { hook, .. }
            | PluginError::Contract { hook, .. } => Some(*hook),
            _ => None,
        }
    }
}

pub type PluginResult<T> = Result<T, PluginError>;
