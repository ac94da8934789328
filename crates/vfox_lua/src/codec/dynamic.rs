//! Untyped guest values
//!
//! A table whose index 1 is non-nil decodes as a sequence, anything else as a
//! mapping. A sequence holds every value of the table: positional entries in
//! key order, then the values of named keys, with holes closed up. Numbers
//! always decode as `f64` here, unlike typed integer destinations which
//! truncate.

use std::collections::BTreeMap;

use mlua::{Lua, Table, Value};
use serde::{Deserialize, Serialize};

use super::collection::ordered_values;
use super::{key_string, lua_string, Kind, Marshal, Unmarshal};
use crate::error::{CodecError, CodecResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Dynamic {
    #[default]
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Sequence(Vec<Dynamic>),
    Mapping(BTreeMap<String, Dynamic>),
}

impl Dynamic {
    pub fn is_nil(&self) -> bool {
        matches!(self, Dynamic::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Look up a key of a mapping
    pub fn get(&self, key: &str) -> Option<&Dynamic> {
        match self {
            Dynamic::Mapping(map) => map.get(key),
            _ => None,
        }
    }

    pub fn from_lua(value: &Value) -> CodecResult<Self> {
        Ok(match value {
            Value::Nil => Dynamic::Nil,
            Value::Boolean(b) => Dynamic::Bool(*b),
            Value::Integer(i) => Dynamic::Number(*i as f64),
            Value::Number(n) => Dynamic::Number(*n),
            Value::String(s) => Dynamic::String(lua_string(s)),
            Value::Table(table) => Self::from_table(table)?,
            other => return Err(CodecError::UnsupportedValue(other.type_name())),
        })
    }

    fn from_table(table: &Table) -> CodecResult<Self> {
        if !table.raw_get::<Value>(1)?.is_nil() {
            let items = ordered_values(table)?
                .iter()
                .map(Self::from_lua)
                .collect::<CodecResult<Vec<_>>>()?;
            return Ok(Dynamic::Sequence(items));
        }

        let mut map = BTreeMap::new();
        for pair in table.clone().pairs::<Value, Value>() {
            let (key, value) = pair?;
            if let Some(key) = key_string(&key) {
                map.insert(key, Self::from_lua(&value)?);
            }
        }
        Ok(Dynamic::Mapping(map))
    }
}

impl Marshal for Dynamic {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        match self {
            Dynamic::Nil => Ok(Value::Nil),
            Dynamic::Bool(b) => Ok(Value::Boolean(*b)),
            Dynamic::Number(n) => Ok(Value::Number(*n)),
            Dynamic::String(s) => s.marshal(lua),
            Dynamic::Sequence(items) => items.marshal(lua),
            Dynamic::Mapping(map) => map.marshal(lua),
        }
    }
}

impl Unmarshal for Dynamic {
    const KIND: Kind = Kind::Any;

    fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
        *self = Self::from_lua(value)?;
        Ok(())
    }
}

impl From<&str> for Dynamic {
    fn from(value: &str) -> Self {
        Dynamic::String(value.to_string())
    }
}

impl From<f64> for Dynamic {
    fn from(value: f64) -> Self {
        Dynamic::Number(value)
    }
}

impl From<bool> for Dynamic {
    fn from(value: bool) -> Self {
        Dynamic::Bool(value)
    }
}
