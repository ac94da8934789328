//! Sequences and maps

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use mlua::{Lua, Table, Value};

use super::{key_string, Kind, Marshal, Unmarshal};
use crate::error::{CodecError, CodecResult};

// ─────────────────────────────────────────────────────────────────────────────
// Sequences
// ─────────────────────────────────────────────────────────────────────────────

impl<T: Marshal> Marshal for [T] {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        let table = lua.create_table()?;
        for (index, item) in self.iter().enumerate() {
            let value = item.marshal(lua)?;
            if !value.is_nil() {
                table.raw_set(index + 1, value)?;
            }
        }
        Ok(Value::Table(table))
    }
}

impl<T: Marshal> Marshal for Vec<T> {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        self.as_slice().marshal(lua)
    }
}

/// The vector ends up with exactly one element per visited table entry
impl<T: Unmarshal> Unmarshal for Vec<T> {
    const KIND: Kind = Kind::Slice;

    fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
        let table = match value {
            Value::Nil => return Ok(()),
            Value::Table(table) => table,
            other => return Err(CodecError::mismatch(Self::KIND, other)),
        };

        let entries = ordered_values(table)?;
        self.clear();
        self.reserve(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            let mut item = T::default();
            item.unmarshal(entry)
                .map_err(|e| e.in_field(&(index + 1).to_string()))?;
            self.push(item);
        }
        Ok(())
    }
}

/// Table values with positional keys first (ascending), then everything else
pub(super) fn ordered_values(table: &Table) -> CodecResult<Vec<Value>> {
    let mut positional = Vec::new();
    let mut rest = Vec::new();
    for pair in table.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        match key {
            Value::Integer(i) => positional.push((i as f64, value)),
            Value::Number(n) if n.fract() == 0.0 => positional.push((n, value)),
            _ => rest.push(value),
        }
    }
    positional.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(positional
        .into_iter()
        .map(|(_, value)| value)
        .chain(rest)
        .collect())
}

// ─────────────────────────────────────────────────────────────────────────────
// Map keys
// ─────────────────────────────────────────────────────────────────────────────

/// The kinds a map key can have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    String,
    Signed,
    Unsigned,
    Bool,
}

impl KeyKind {
    fn as_str(self) -> &'static str {
        match self {
            KeyKind::String => "string",
            KeyKind::Signed => "int",
            KeyKind::Unsigned => "uint",
            KeyKind::Bool => "bool",
        }
    }
}

/// A Rust type usable as a map key on either side of the boundary
pub trait MapKey: Sized {
    const KIND: KeyKind;

    fn to_lua_key(&self, lua: &Lua) -> CodecResult<Value>;

    /// Parse the string form of a guest key; `None` drops the entry
    fn from_key(key: &str) -> Option<Self>;
}

impl MapKey for String {
    const KIND: KeyKind = KeyKind::String;

    fn to_lua_key(&self, lua: &Lua) -> CodecResult<Value> {
        Ok(Value::String(lua.create_string(self)?))
    }

    fn from_key(key: &str) -> Option<Self> {
        Some(key.to_string())
    }
}

macro_rules! impl_integer_key {
    ($kind:ident => $($ty:ty),*) => {$(
        impl MapKey for $ty {
            const KIND: KeyKind = KeyKind::$kind;

            fn to_lua_key(&self, _lua: &Lua) -> CodecResult<Value> {
                Ok(Value::Number(*self as f64))
            }

            fn from_key(key: &str) -> Option<Self> {
                key.parse().ok()
            }
        }
    )*};
}

impl_integer_key!(Signed => i8, i16, i32, i64, isize);
impl_integer_key!(Unsigned => u8, u16, u32, u64, usize);

impl MapKey for bool {
    const KIND: KeyKind = KeyKind::Bool;

    fn to_lua_key(&self, _lua: &Lua) -> CodecResult<Value> {
        Ok(Value::Boolean(*self))
    }

    fn from_key(key: &str) -> Option<Self> {
        key.parse().ok()
    }
}

fn check_key_kind<K: MapKey>() -> CodecResult<()> {
    match K::KIND {
        KeyKind::String | KeyKind::Signed | KeyKind::Unsigned => Ok(()),
        KeyKind::Bool => Err(CodecError::UnsupportedKey(K::KIND.as_str())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Maps
// ─────────────────────────────────────────────────────────────────────────────

fn marshal_entries<'a, K, V, I>(lua: &Lua, entries: I) -> CodecResult<Value>
where
    K: MapKey + 'a,
    V: Marshal + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    check_key_kind::<K>()?;
    let table = lua.create_table()?;
    for (key, value) in entries {
        let value = value.marshal(lua)?;
        if !value.is_nil() {
            table.raw_set(key.to_lua_key(lua)?, value)?;
        }
    }
    Ok(Value::Table(table))
}

fn unmarshal_entries<K, V>(value: &Value, mut insert: impl FnMut(K, V)) -> CodecResult<()>
where
    K: MapKey,
    V: Unmarshal,
{
    let table = match value {
        Value::Nil => return Ok(()),
        Value::Table(table) => table,
        other => return Err(CodecError::mismatch(Kind::Map, other)),
    };
    check_key_kind::<K>()?;

    for pair in table.clone().pairs::<Value, Value>() {
        let (key, value) = pair?;
        let Some(text) = key_string(&key) else {
            continue;
        };
        let Some(parsed) = K::from_key(&text) else {
            tracing::trace!(key = %text, "dropping unparseable map key");
            continue;
        };
        let mut item = V::default();
        item.unmarshal(&value).map_err(|e| e.in_field(&text))?;
        insert(parsed, item);
    }
    Ok(())
}

impl<K, V, S> Marshal for HashMap<K, V, S>
where
    K: MapKey,
    V: Marshal,
{
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        marshal_entries(lua, self.iter())
    }
}

impl<K, V, S> Unmarshal for HashMap<K, V, S>
where
    K: MapKey + Eq + Hash,
    V: Unmarshal,
    S: BuildHasher + Default,
{
    const KIND: Kind = Kind::Map;

    fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
        unmarshal_entries(value, |key, item| {
            self.insert(key, item);
        })
    }
}

impl<K, V> Marshal for BTreeMap<K, V>
where
    K: MapKey,
    V: Marshal,
{
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        marshal_entries(lua, self.iter())
    }
}

impl<K, V> Unmarshal for BTreeMap<K, V>
where
    K: MapKey + Ord,
    V: Unmarshal,
{
    const KIND: Kind = Kind::Map;

    fn unmarshal(&mut self, value: &Value) -> CodecResult<()> {
        unmarshal_entries(value, |key, item| {
            self.insert(key, item);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{marshal, unmarshal, Dynamic};

    fn eval(lua: &Lua, code: &str) -> Value {
        lua.load(code).eval().unwrap()
    }

    #[test]
    fn test_vec_marshals_one_indexed() {
        let lua = Lua::new();
        let value = marshal(&lua, &vec!["a".to_string(), "b".to_string()]).unwrap();
        lua.globals().set("list", value).unwrap();
        let joined: String = lua.load("return list[1] .. list[2] .. #list").eval().unwrap();
        assert_eq!(joined, "ab2");
    }

    #[test]
    fn test_vec_skips_absent_elements() {
        let lua = Lua::new();
        let value = marshal(&lua, &vec![Some(1), None, Some(3)]).unwrap();
        let Value::Table(table) = value else {
            panic!("expected table");
        };
        assert!(table.raw_get::<Value>(2).unwrap().is_nil());
        assert_eq!(table.raw_get::<i64>(3).unwrap(), 3);
    }

    #[test]
    fn test_vec_counts_visited_entries() {
        let lua = Lua::new();
        let mut out: Vec<i32> = vec![9, 9, 9, 9];
        unmarshal(&eval(&lua, "return {3, 2, 1}"), &mut out).unwrap();
        assert_eq!(out, vec![3, 2, 1]);
    }

    #[test]
    fn test_empty_table_gives_present_empty_vec() {
        let lua = Lua::new();
        let mut out: Option<Vec<String>> = None;
        unmarshal(&eval(&lua, "return {}"), &mut out).unwrap();
        assert_eq!(out, Some(vec![]));

        let mut absent: Option<Vec<String>> = None;
        unmarshal(&Value::Nil, &mut absent).unwrap();
        assert_eq!(absent, None);
    }

    #[test]
    fn test_string_keyed_map() {
        let lua = Lua::new();
        let mut out: HashMap<String, Dynamic> = HashMap::new();
        unmarshal(&eval(&lua, "return {a = 1, b = 'x', [3] = true}"), &mut out).unwrap();
        assert_eq!(out.get("a"), Some(&Dynamic::Number(1.0)));
        assert_eq!(out.get("b"), Some(&Dynamic::String("x".into())));
        assert_eq!(out.get("3"), Some(&Dynamic::Bool(true)));
    }

    #[test]
    fn test_integer_keyed_map_drops_unparseable_keys() {
        let lua = Lua::new();
        let mut out: BTreeMap<i32, String> = BTreeMap::new();
        unmarshal(
            &eval(&lua, "return {[1] = 'one', ['2'] = 'two', three = 'three', [4.5] = 'x'}"),
            &mut out,
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[&1], "one");
        assert_eq!(out[&2], "two");
    }

    #[test]
    fn test_integer_keyed_map_marshals_numeric_keys() {
        let lua = Lua::new();
        let map = BTreeMap::from([(10u16, "ten".to_string())]);
        lua.globals().set("m", marshal(&lua, &map).unwrap()).unwrap();
        let ten: String = lua.load("return m[10]").eval().unwrap();
        assert_eq!(ten, "ten");
    }

    #[test]
    fn test_bool_keys_are_rejected() {
        let lua = Lua::new();
        let map = HashMap::from([(true, 1)]);
        let err = marshal(&lua, &map).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedKey("bool")));
        assert_eq!(err.to_string(), "unsupported key type bool");

        let mut out: HashMap<bool, i32> = HashMap::new();
        assert!(unmarshal(&eval(&lua, "return {[true] = 1}"), &mut out).is_err());
    }

    #[test]
    fn test_map_from_scalar_is_mismatch() {
        let mut out: HashMap<String, String> = HashMap::new();
        let err = unmarshal(&Value::Boolean(true), &mut out).unwrap_err();
        assert!(err.to_string().contains("into map"));
    }
}
