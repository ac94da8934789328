//! Scalar conversions
//!
//! Lua 5.1 has a single double-precision number type. Every Rust number is
//! widened (or narrowed, for 64-bit integers beyond 2^53) into it, and numbers
//! coming back are truncated toward zero and wrapped to the destination width.

use std::path::PathBuf;

use mlua::{Lua, Value};

use super::{format_number, lua_string, Kind, Marshal, Unmarshal};
use crate::error::{CodecError, CodecResult};

/// A number read from the guest, before it is fitted to a destination
enum Number {
    Int(i64),
    Float(f64),
}

/// Read a guest number, applying Lua's string-to-number coercion
fn read_number(value: &Value, expected: Kind) -> CodecResult<Option<Number>> {
    match value {
        Value::Nil => Ok(None),
        Value::Integer(i) => Ok(Some(Number::Int(*i))),
        Value::Number(n) => Ok(Some(Number::Float(*n))),
        Value::String(s) => parse_number(&lua_string(s))
            .map(Some)
            .ok_or_else(|| CodecError::mismatch(expected, value)),
        other => Err(CodecError::mismatch(expected, other)),
    }
}

fn parse_number(text: &str) -> Option<Number> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(Number::Int);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::Int(i));
    }
    text.parse::<f64>().ok().map(Number::Float)
}

// ─────────────────────────────────────────────────────────────────────────────
// Numbers
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! impl_signed {
    ($($ty:ty),*) => {$(
        impl Marshal for $ty {
            fn marshal(&self, _lua: &Lua) -> CodecResult<Value> {
                Ok(Value::Number(*self as f64))
            }
        }

        impl Unmarshal for $ty {
            const KIND: Kind = Kind::Int;

            fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
                match read_number(value, Self::KIND)? {
                    Some(Number::Int(i)) => *self = i as $ty,
                    Some(Number::Float(f)) => *self = (f as i64) as $ty,
                    None => {}
                }
                Ok(())
            }
        }
    )*};
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {$(
        impl Marshal for $ty {
            fn marshal(&self, _lua: &Lua) -> CodecResult<Value> {
                Ok(Value::Number(*self as f64))
            }
        }

        impl Unmarshal for $ty {
            const KIND: Kind = Kind::Uint;

            fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
                match read_number(value, Self::KIND)? {
                    Some(Number::Int(i)) => *self = i as $ty,
                    Some(Number::Float(f)) if f >= 0.0 => *self = (f as u64) as $ty,
                    Some(Number::Float(f)) => *self = (f as i64) as $ty,
                    None => {}
                }
                Ok(())
            }
        }
    )*};
}

macro_rules! impl_float {
    ($($ty:ty),*) => {$(
        impl Marshal for $ty {
            fn marshal(&self, _lua: &Lua) -> CodecResult<Value> {
                Ok(Value::Number(*self as f64))
            }
        }

        impl Unmarshal for $ty {
            const KIND: Kind = Kind::Float;

            fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
                match read_number(value, Self::KIND)? {
                    Some(Number::Int(i)) => *self = i as $ty,
                    Some(Number::Float(f)) => *self = f as $ty,
                    None => {}
                }
                Ok(())
            }
        }
    )*};
}

impl_signed!(i8, i16, i32, i64, isize);
impl_unsigned!(u8, u16, u32, u64, usize);
impl_float!(f32, f64);

// ─────────────────────────────────────────────────────────────────────────────
// Booleans and strings
// ─────────────────────────────────────────────────────────────────────────────

impl Marshal for bool {
    fn marshal(&self, _lua: &Lua) -> CodecResult<Value> {
        Ok(Value::Boolean(*self))
    }
}

/// Lua truthiness: anything other than `nil` and `false` is true
impl Unmarshal for bool {
    const KIND: Kind = Kind::Bool;

    fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Nil => {}
            Value::Boolean(b) => *self = *b,
            _ => *self = true,
        }
        Ok(())
    }
}

impl Marshal for str {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        Ok(Value::String(lua.create_string(self)?))
    }
}

impl Marshal for String {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        self.as_str().marshal(lua)
    }
}

impl Unmarshal for String {
    const KIND: Kind = Kind::String;

    fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Nil => {}
            Value::String(s) => *self = lua_string(s),
            Value::Integer(i) => *self = i.to_string(),
            Value::Number(n) => *self = format_number(*n),
            Value::Boolean(b) => *self = b.to_string(),
            other => return Err(CodecError::mismatch(Self::KIND, other)),
        }
        Ok(())
    }
}

impl Marshal for PathBuf {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        let text = self.to_string_lossy();
        Ok(Value::String(lua.create_string(text.as_bytes())?))
    }
}

impl Unmarshal for PathBuf {
    const KIND: Kind = Kind::String;

    fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
        if value.is_nil() {
            return Ok(());
        }
        let mut path = String::new();
        path.unmarshal(value)?;
        *self = PathBuf::from(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{marshal, unmarshal};

    #[test]
    fn test_numbers_marshal_to_lua_number() {
        let lua = Lua::new();
        assert!(matches!(marshal(&lua, &7u8).unwrap(), Value::Number(n) if n == 7.0));
        assert!(matches!(marshal(&lua, &-7i64).unwrap(), Value::Number(n) if n == -7.0));
        assert!(matches!(marshal(&lua, &0.25f32).unwrap(), Value::Number(n) if n == 0.25));
    }

    #[test]
    fn test_integer_truncation() {
        let mut small: i8 = 0;
        unmarshal(&Value::Number(300.7), &mut small).unwrap();
        assert_eq!(small, 300i64 as i8);

        let mut unsigned: u8 = 0;
        unmarshal(&Value::Number(257.0), &mut unsigned).unwrap();
        assert_eq!(unsigned, 1);

        let mut negative: i32 = 0;
        unmarshal(&Value::Number(-2.9), &mut negative).unwrap();
        assert_eq!(negative, -2);
    }

    #[test]
    fn test_numeric_string_coercion() {
        let lua = Lua::new();
        let value = marshal(&lua, "42").unwrap();

        let mut int: u32 = 0;
        unmarshal(&value, &mut int).unwrap();
        assert_eq!(int, 42);

        let mut float: f64 = 0.0;
        unmarshal(&marshal(&lua, "0x10").unwrap(), &mut float).unwrap();
        assert_eq!(float, 16.0);

        let err = unmarshal(&marshal(&lua, "abc").unwrap(), &mut int).unwrap_err();
        assert!(err.to_string().contains("cannot unmarshal string into uint"));
    }

    #[test]
    fn test_number_into_string_field() {
        let mut text = String::new();
        unmarshal(&Value::Number(8.0), &mut text).unwrap();
        assert_eq!(text, "8");

        unmarshal(&Value::Integer(-3), &mut text).unwrap();
        assert_eq!(text, "-3");
    }

    #[test]
    fn test_nil_leaves_destination_untouched() {
        let mut text = "keep".to_string();
        unmarshal(&Value::Nil, &mut text).unwrap();
        assert_eq!(text, "keep");

        let mut n = 5i64;
        unmarshal(&Value::Nil, &mut n).unwrap();
        assert_eq!(n, 5);
    }

    #[test]
    fn test_bool_truthiness() {
        let mut flag = false;
        unmarshal(&Value::Number(0.0), &mut flag).unwrap();
        assert!(flag);

        unmarshal(&Value::Boolean(false), &mut flag).unwrap();
        assert!(!flag);
    }

    #[test]
    fn test_table_into_scalar_is_mismatch() {
        let lua = Lua::new();
        let table = Value::Table(lua.create_table().unwrap());
        let mut n = 0i32;
        let err = unmarshal(&table, &mut n).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TypeMismatch {
                expected: Kind::Int,
                found: "table"
            }
        ));
    }
}
