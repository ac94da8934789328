//! Value Codec
//!
//! Converts Rust values into Lua values and back. Every supported shape is
//! described by a [`Kind`], and conversions are dispatched through the
//! [`Marshal`] and [`Unmarshal`] traits:
//!
//! - scalars map onto Lua booleans, strings and the single Lua number type
//! - records (see the `Marshal`/`Unmarshal` derives) map onto tables keyed by
//!   tag or field name, with flattened records promoted into the same table
//! - `Vec<T>` maps onto 1-indexed sequences, maps onto keyed tables
//! - [`Dynamic`] decodes any table without a declared shape
//! - [`HostFunction`] exposes a Rust closure as a Lua function

mod collection;
mod dynamic;
mod function;
pub mod record;
mod scalar;

use std::fmt;

use mlua::{Lua, Value};

use crate::error::CodecResult;

pub use collection::{KeyKind, MapKey};
pub use dynamic::Dynamic;
pub use function::{Fixed, HostFunction, IntoHostFunction, Returns, Signature, Varargs, Variadic};
pub use record::{FieldDescriptor, MarshalFields, StructDescriptor, UnmarshalFields};

// ─────────────────────────────────────────────────────────────────────────────
// Kind
// ─────────────────────────────────────────────────────────────────────────────

/// The closed set of shapes the codec knows how to convert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    String,
    Struct,
    Map,
    Slice,
    Callable,
    Any,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Float => "float",
            Kind::String => "string",
            Kind::Struct => "struct",
            Kind::Map => "map",
            Kind::Slice => "slice",
            Kind::Callable => "function",
            Kind::Any => "any",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// A Rust value that can be written into the Lua state
pub trait Marshal {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value>;
}

/// A Rust destination that can be filled from a Lua value
///
/// Destinations start from their `Default` and are filled in place. A `nil`
/// guest value leaves the destination untouched.
pub trait Unmarshal: Default {
    const KIND: Kind;

    fn unmarshal(&mut self, value: &Value) -> CodecResult<()>;
}

/// Convert a Rust value into a Lua value
pub fn marshal<T: Marshal + ?Sized>(lua: &Lua, value: &T) -> CodecResult<Value> {
    value.marshal(lua)
}

/// Fill `dest` from a Lua value
pub fn unmarshal<T: Unmarshal>(value: &Value, dest: &mut T) -> CodecResult<()> {
    dest.unmarshal(value)
}

// ─────────────────────────────────────────────────────────────────────────────
// Indirection
// ─────────────────────────────────────────────────────────────────────────────

impl<T: Marshal + ?Sized> Marshal for &T {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        (**self).marshal(lua)
    }
}

impl<T: Marshal + ?Sized> Marshal for Box<T> {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        (**self).marshal(lua)
    }
}

impl<T: Unmarshal> Unmarshal for Box<T> {
    const KIND: Kind = T::KIND;

    fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
        (**self).unmarshal(value)
    }
}

/// `None` marshals to `nil`, which records omit from their table
impl<T: Marshal> Marshal for Option<T> {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        match self {
            Some(inner) => inner.marshal(lua),
            None => Ok(Value::Nil),
        }
    }
}

/// Allocates the inner value only when the guest provides one
impl<T: Unmarshal> Unmarshal for Option<T> {
    const KIND: Kind = T::KIND;

    fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
        if value.is_nil() {
            return Ok(());
        }
        self.get_or_insert_with(T::default).unmarshal(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn lua_string(s: &mlua::String) -> String {
    String::from_utf8_lossy(&s.as_bytes()).into_owned()
}

/// Format a number the way Lua's `tostring` does for integral values
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else if n.is_nan() {
        "nan".to_string()
    } else if n == f64::INFINITY {
        "inf".to_string()
    } else if n == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{n}")
    }
}

/// The string form of a table key, if it has one
pub(crate) fn key_string(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(lua_string(s)),
        Value::Integer(i) => Some(i.to_string()),
        Value::Number(n) => Some(format_number(*n)),
        _ => None,
    }
}
