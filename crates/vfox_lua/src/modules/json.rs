//! `json` module

use std::ffi::c_void;

use mlua::{Lua, MultiValue, Table, Value};
use serde_json::{Map, Number};

use super::failure;
use crate::codec::lua_string;

pub const MODULE: &str = "json";

#[derive(Debug, thiserror::Error)]
enum JsonError {
    #[error("sparse array")]
    SparseArray,

    #[error("mixed or invalid key types")]
    MixedKeys,

    #[error("cannot encode recursive table")]
    Recursive,

    #[error("cannot encode {0}")]
    Unsupported(&'static str),

    #[error("cannot encode number {0}")]
    InvalidNumber(f64),

    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

pub fn module(lua: &Lua) -> mlua::Result<Table> {
    let module = lua.create_table()?;
    module.set(
        "encode",
        lua.create_function(|lua, value: Value| {
            let mut stack = Vec::new();
            let json = match to_json(&value, &mut stack) {
                Ok(json) => json,
                Err(e) => return failure(lua, e),
            };
            Ok(MultiValue::from_vec(vec![Value::String(
                lua.create_string(json.to_string())?,
            )]))
        })?,
    )?;
    module.set(
        "decode",
        lua.create_function(|lua, text: mlua::String| {
            match serde_json::from_slice::<serde_json::Value>(&text.as_bytes()) {
                Ok(json) => Ok(MultiValue::from_vec(vec![from_json(lua, &json)?])),
                Err(e) => failure(lua, e),
            }
        })?,
    )?;
    Ok(module)
}

fn to_json(value: &Value, stack: &mut Vec<*const c_void>) -> Result<serde_json::Value, JsonError> {
    match value {
        Value::Nil => Ok(serde_json::Value::Null),
        Value::Boolean(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Integer(i) => Ok(serde_json::Value::Number((*i).into())),
        Value::Number(n) => number(*n),
        Value::String(s) => Ok(serde_json::Value::String(lua_string(s))),
        Value::Table(table) => {
            let pointer = table.to_pointer();
            if stack.contains(&pointer) {
                return Err(JsonError::Recursive);
            }
            stack.push(pointer);
            let json = table_to_json(table, stack);
            stack.pop();
            json
        }
        other => Err(JsonError::Unsupported(other.type_name())),
    }
}

fn number(n: f64) -> Result<serde_json::Value, JsonError> {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return Ok(serde_json::Value::Number((n as i64).into()));
    }
    Number::from_f64(n)
        .map(serde_json::Value::Number)
        .ok_or(JsonError::InvalidNumber(n))
}

fn table_to_json(
    table: &Table,
    stack: &mut Vec<*const c_void>,
) -> Result<serde_json::Value, JsonError> {
    let mut positional = Vec::new();
    let mut named = Map::new();

    for pair in table.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        match key {
            Value::Integer(i) => positional.push((i, value)),
            Value::Number(n) if n.fract() == 0.0 => positional.push((n as i64, value)),
            Value::String(s) => {
                named.insert(lua_string(&s), to_json(&value, stack)?);
            }
            _ => return Err(JsonError::MixedKeys),
        }
    }

    if !named.is_empty() {
        if !positional.is_empty() {
            return Err(JsonError::MixedKeys);
        }
        return Ok(serde_json::Value::Object(named));
    }

    positional.sort_by_key(|(index, _)| *index);
    let mut items = Vec::with_capacity(positional.len());
    for (expected, (index, value)) in (1..).zip(positional) {
        if index != expected {
            return Err(JsonError::SparseArray);
        }
        items.push(to_json(&value, stack)?);
    }
    Ok(serde_json::Value::Array(items))
}

fn from_json(lua: &Lua, json: &serde_json::Value) -> mlua::Result<Value> {
    Ok(match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::String(lua.create_string(s)?),
        serde_json::Value::Array(items) => {
            let table = lua.create_table()?;
            for (index, item) in items.iter().enumerate() {
                table.raw_set(index + 1, from_json(lua, item)?)?;
            }
            Value::Table(table)
        }
        serde_json::Value::Object(map) => {
            let table = lua.create_table()?;
            for (key, item) in map {
                table.raw_set(key.as_str(), from_json(lua, item)?)?;
            }
            Value::Table(table)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(code: &str) {
        let lua = Lua::new();
        lua.globals().set("json", module(&lua).unwrap()).unwrap();
        lua.load(code).exec().unwrap();
    }

    #[test]
    fn test_encode_scalars_and_arrays() {
        run(r#"
            assert(json.encode(true) == "true")
            assert(json.encode(1) == "1")
            assert(json.encode(-10) == "-10")
            assert(json.encode(1.5) == "1.5")
            assert(json.encode(nil) == "null")
            assert(json.encode({}) == "[]")
            assert(json.encode({1, 2, 3}) == "[1,2,3]")
            assert(json.encode({name = "Tim"}) == '{"name":"Tim"}')
        "#);
    }

    #[test]
    fn test_encode_errors() {
        run(r#"
            local _, err = json.encode({1, 2, [10] = 3})
            assert(string.find(err, "sparse array"))

            local _, err = json.encode({1, 2, 3, name = "Tim"})
            assert(string.find(err, "mixed or invalid key types"))

            local _, err = json.encode({name = "Tim", [false] = 123})
            assert(string.find(err, "mixed or invalid key types"))

            local obj = { abc = 123 }
            obj.self = { obj = obj }
            assert(json.encode(obj) == nil)

            local _, err = json.encode(print)
            assert(string.find(err, "cannot encode function"))
        "#);
    }

    #[test]
    fn test_decode() {
        run(r#"
            local t = json.decode('{"metadata":[],"spec":{"containers":[{"image":"centos:7"}]}}')
            assert(type(t.metadata) == "table" and next(t.metadata) == nil)
            assert(t.spec.containers[1].image == "centos:7")
            assert(json.decode("null") == nil)
            assert(json.decode(json.encode({person = {name = "tim"}})).person.name == "tim")

            local _, err = json.decode("{")
            assert(type(err) == "string")
        "#);
    }
}
