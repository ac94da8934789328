//! Records
//!
//! Records are structs with named fields. The derives generate a
//! [`StructDescriptor`] for each record: its own fields (declared name plus
//! optional tag) and the descriptors of flattened records, searched in
//! declared order after the direct lookup fails.

use mlua::{Lua, Table, Value};

use super::{key_string, Kind, Marshal};
use crate::error::{CodecError, CodecResult};

/// One declared field of a record
#[derive(Debug)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub tag: Option<&'static str>,
}

/// The field lookup chain of a record
#[derive(Debug)]
pub struct StructDescriptor {
    pub name: &'static str,
    pub fields: &'static [FieldDescriptor],
    pub promoted: &'static [fn() -> &'static StructDescriptor],
}

impl StructDescriptor {
    /// Whether `key` lands on this record, directly or through a promoted one
    pub fn resolves(&self, key: &str) -> bool {
        self.fields
            .iter()
            .any(|field| field.name == key || field.tag == Some(key))
            || self.promoted.iter().any(|promoted| promoted().resolves(key))
    }
}

/// Writes the fields of a record into an existing table
pub trait MarshalFields {
    fn marshal_fields(&self, lua: &Lua, table: &Table) -> CodecResult<()>;
}

/// Assigns guest keys to the fields of a record
pub trait UnmarshalFields: Default {
    fn descriptor() -> &'static StructDescriptor;

    /// Returns `false` when the key matches no field
    fn unmarshal_field(&mut self, key: &str, value: &Value) -> CodecResult<bool>;
}

/// Set `key` unless the value marshals to `nil`
pub fn set_field<T: Marshal + ?Sized>(
    lua: &Lua,
    table: &Table,
    key: &str,
    value: &T,
) -> CodecResult<()> {
    let value = value.marshal(lua)?;
    if !value.is_nil() {
        table.raw_set(key, value)?;
    }
    Ok(())
}

pub fn marshal_record<T: MarshalFields + ?Sized>(record: &T, lua: &Lua) -> CodecResult<Value> {
    let table = lua.create_table()?;
    record.marshal_fields(lua, &table)?;
    Ok(Value::Table(table))
}

pub fn unmarshal_record<T: UnmarshalFields>(record: &mut T, value: &Value) -> CodecResult<()> {
    let table = match value {
        Value::Nil => return Ok(()),
        Value::Table(table) => table,
        other => return Err(CodecError::mismatch(Kind::Struct, other)),
    };

    for pair in table.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        let Some(key) = key_string(&key) else {
            continue;
        };
        if !record.unmarshal_field(&key, &value)? {
            tracing::trace!(record = T::descriptor().name, %key, "dropping unmatched key");
        }
    }
    Ok(())
}
