//! Error types for the Lua bridge

use std::path::PathBuf;

use crate::codec::Kind;

// ─────────────────────────────────────────────────────────────────────────────
// Codec Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised while converting values across the Lua boundary
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("marshal: unsupported type {0}")]
    UnsupportedType(&'static str),

    #[error("unmarshal: unsupported type {0}")]
    UnsupportedValue(&'static str),

    #[error("unsupported key type {0}")]
    UnsupportedKey(&'static str),

    #[error("cannot unmarshal {found} into {expected}")]
    TypeMismatch { expected: Kind, found: &'static str },

    #[error("field {field}: {source}")]
    Field {
        field: String,
        #[source]
        source: Box<CodecError>,
    },

    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),
}

impl CodecError {
    pub(crate) fn mismatch(expected: Kind, value: &mlua::Value) -> Self {
        Self::TypeMismatch {
            expected,
            found: value.type_name(),
        }
    }

    /// Attach the name of the record field being decoded
    pub fn in_field(self, field: &str) -> Self {
        Self::Field {
            field: field.to_string(),
            source: Box::new(self),
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;

// ─────────────────────────────────────────────────────────────────────────────
// VM Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors raised by the guest runtime adapter
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    #[error("{0}")]
    Lua(#[from] mlua::Error),

    #[error("Failed to read {}: {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Function not found: {0}")]
    FunctionNotFound(String),
}

pub type VmResult<T> = Result<T, VmError>;
