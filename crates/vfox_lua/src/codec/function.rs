//! Host functions callable from Lua
//!
//! A [`HostFunction`] pairs the signature of a Rust closure with a thunk that
//! decodes guest arguments positionally, calls the closure, and encodes the
//! results. A trailing [`Variadic`] parameter collects every argument after
//! the fixed prefix.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::Rc;

use mlua::{Lua, MultiValue, Value};

use super::{Kind, Marshal, Unmarshal};
use crate::error::CodecResult;

/// Trailing rest-arguments of a host function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Variadic<T>(pub Vec<T>);

impl<T> Variadic<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for Variadic<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Signature
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Kind>,
    variadic: Option<Kind>,
}

impl Signature {
    pub fn fixed(params: Vec<Kind>) -> Self {
        Self {
            params,
            variadic: None,
        }
    }

    pub fn variadic(params: Vec<Kind>, rest: Kind) -> Self {
        Self {
            params,
            variadic: Some(rest),
        }
    }

    /// Number of fixed parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic.is_some()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("fn(")?;
        let mut first = true;
        for kind in &self.params {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{kind}")?;
        }
        if let Some(rest) = self.variadic {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "...{rest}")?;
        }
        f.write_str(")")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Host Function
// ─────────────────────────────────────────────────────────────────────────────

type Thunk = dyn Fn(&Lua, MultiValue) -> mlua::Result<MultiValue>;

/// A Rust closure that marshals into a Lua function
#[derive(Clone)]
pub struct HostFunction {
    signature: Rc<Signature>,
    thunk: Rc<Thunk>,
}

impl HostFunction {
    pub fn new<M, F: IntoHostFunction<M>>(f: F) -> Self {
        f.into_host_function()
    }

    fn from_thunk(
        signature: Signature,
        thunk: impl Fn(&Lua, MultiValue) -> mlua::Result<MultiValue> + 'static,
    ) -> Self {
        Self {
            signature: Rc::new(signature),
            thunk: Rc::new(thunk),
        }
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostFunction")
            .field(&self.signature.to_string())
            .finish()
    }
}

impl Marshal for HostFunction {
    fn marshal(&self, lua: &Lua) -> CodecResult<Value> {
        let thunk = Rc::clone(&self.thunk);
        let function = lua.create_function(move |lua, args: MultiValue| thunk(lua, args))?;
        Ok(Value::Function(function))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Return values
// ─────────────────────────────────────────────────────────────────────────────

/// What a host function hands back to the guest, in order
pub trait Returns {
    fn into_values(self, lua: &Lua) -> CodecResult<Vec<Value>>;
}

impl Returns for () {
    fn into_values(self, _lua: &Lua) -> CodecResult<Vec<Value>> {
        Ok(Vec::new())
    }
}

impl<T: Marshal> Returns for T {
    fn into_values(self, lua: &Lua) -> CodecResult<Vec<Value>> {
        Ok(vec![self.marshal(lua)?])
    }
}

impl<A: Marshal, B: Marshal> Returns for (A, B) {
    fn into_values(self, lua: &Lua) -> CodecResult<Vec<Value>> {
        Ok(vec![self.0.marshal(lua)?, self.1.marshal(lua)?])
    }
}

impl<A: Marshal, B: Marshal, C: Marshal> Returns for (A, B, C) {
    fn into_values(self, lua: &Lua) -> CodecResult<Vec<Value>> {
        Ok(vec![
            self.0.marshal(lua)?,
            self.1.marshal(lua)?,
            self.2.marshal(lua)?,
        ])
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion from closures
// ─────────────────────────────────────────────────────────────────────────────

/// Marker for closures with a fixed parameter list
pub struct Fixed<Args>(PhantomData<Args>);

/// Marker for closures ending in a [`Variadic`] parameter
pub struct Varargs<Args, Rest>(PhantomData<(Args, Rest)>);

/// Implemented for `Fn` closures of up to four decodable parameters,
/// optionally followed by a `Variadic<T>`
pub trait IntoHostFunction<Marker> {
    fn into_host_function(self) -> HostFunction;
}

fn decode_arg<T: Unmarshal>(value: Option<Value>, position: usize) -> Result<T, String> {
    let mut dest = T::default();
    if let Some(value) = value {
        dest.unmarshal(&value)
            .map_err(|e| format!("error unmarshaling argument {position}: {e}"))?;
    }
    Ok(dest)
}

/// `nil, message`: the conventional soft failure of a Lua function
fn soft_error(lua: &Lua, message: &str) -> mlua::Result<MultiValue> {
    Ok(MultiValue::from_vec(vec![
        Value::Nil,
        Value::String(lua.create_string(message)?),
    ]))
}

fn finish<R: Returns>(lua: &Lua, ret: R) -> mlua::Result<MultiValue> {
    match ret.into_values(lua) {
        Ok(values) => Ok(MultiValue::from_vec(values)),
        Err(e) => soft_error(lua, &format!("error marshaling result: {e}")),
    }
}

macro_rules! impl_into_host_function {
    ($($arg:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        impl<F, R, $($arg,)*> IntoHostFunction<Fixed<($($arg,)*)>> for F
        where
            F: Fn($($arg),*) -> R + 'static,
            R: Returns,
            $($arg: Unmarshal,)*
        {
            fn into_host_function(self) -> HostFunction {
                let signature = Signature::fixed(vec![$(<$arg as Unmarshal>::KIND),*]);
                let label = signature.to_string();
                let arity = signature.arity();
                HostFunction::from_thunk(signature, move |lua, args| {
                    if args.len() != arity {
                        return Err(mlua::Error::RuntimeError(format!(
                            "expected {arity} arguments for {label}, got {}",
                            args.len()
                        )));
                    }
                    let mut args = args.into_iter();
                    let mut position = 0;
                    $(
                        position += 1;
                        let $arg: $arg = match decode_arg(args.next(), position) {
                            Ok(value) => value,
                            Err(message) => return soft_error(lua, &message),
                        };
                    )*
                    finish(lua, (self)($($arg),*))
                })
            }
        }

        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        impl<F, R, $($arg,)* V> IntoHostFunction<Varargs<($($arg,)*), V>> for F
        where
            F: Fn($($arg,)* Variadic<V>) -> R + 'static,
            R: Returns,
            $($arg: Unmarshal,)*
            V: Unmarshal,
        {
            fn into_host_function(self) -> HostFunction {
                let signature = Signature::variadic(
                    vec![$(<$arg as Unmarshal>::KIND),*],
                    <V as Unmarshal>::KIND,
                );
                let label = signature.to_string();
                let arity = signature.arity();
                HostFunction::from_thunk(signature, move |lua, args| {
                    if args.len() < arity {
                        return Err(mlua::Error::RuntimeError(format!(
                            "expected at least {arity} arguments for {label}, got {}",
                            args.len()
                        )));
                    }
                    let mut args = args.into_iter();
                    let mut position = 0;
                    $(
                        position += 1;
                        let $arg: $arg = match decode_arg(args.next(), position) {
                            Ok(value) => value,
                            Err(message) => return soft_error(lua, &message),
                        };
                    )*
                    let mut rest = Vec::new();
                    for value in args {
                        position += 1;
                        match decode_arg::<V>(Some(value), position) {
                            Ok(item) => rest.push(item),
                            Err(message) => return soft_error(lua, &message),
                        }
                    }
                    finish(lua, (self)($($arg,)* Variadic(rest)))
                })
            }
        }
    };
}

impl_into_host_function!();
impl_into_host_function!(A1);
impl_into_host_function!(A1, A2);
impl_into_host_function!(A1, A2, A3);
impl_into_host_function!(A1, A2, A3, A4);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::marshal;

    fn install(lua: &Lua, name: &str, function: HostFunction) {
        lua.globals()
            .set(name, marshal(lua, &function).unwrap())
            .unwrap();
    }

    #[test]
    fn test_signature_display() {
        let sum = HostFunction::new(|prefix: String, nums: Variadic<i64>| {
            format!("{prefix}{}", nums.iter().sum::<i64>())
        });
        assert_eq!(sum.signature().to_string(), "fn(string, ...int)");
        assert!(sum.signature().is_variadic());

        let add = HostFunction::new(|a: f64, b: f64| a + b);
        assert_eq!(add.signature().to_string(), "fn(float, float)");
    }

    #[test]
    fn test_variadic_sum() {
        let lua = Lua::new();
        install(
            &lua,
            "f",
            HostFunction::new(|prefix: String, nums: Variadic<i64>| {
                format!("{prefix}{}", nums.iter().sum::<i64>())
            }),
        );
        let out: String = lua.load("return f('x', 1, 2, 3)").eval().unwrap();
        assert_eq!(out, "x6");

        let out: String = lua.load("return f('y')").eval().unwrap();
        assert_eq!(out, "y0");
    }

    #[test]
    fn test_variadic_arity_error() {
        let lua = Lua::new();
        install(
            &lua,
            "f",
            HostFunction::new(|_prefix: String, nums: Variadic<i64>| nums.len() as i64),
        );
        let err = lua.load("return f()").exec().unwrap_err();
        assert!(
            err.to_string()
                .contains("expected at least 1 arguments for fn(string, ...int), got 0")
        );
    }

    #[test]
    fn test_fixed_arity_error() {
        let lua = Lua::new();
        install(&lua, "add", HostFunction::new(|a: i64, b: i64| a + b));
        let sum: i64 = lua.load("return add(2, 3)").eval().unwrap();
        assert_eq!(sum, 5);

        let err = lua.load("return add(1)").exec().unwrap_err();
        assert!(err.to_string().contains("expected 2 arguments for fn(int, int), got 1"));
    }

    #[test]
    fn test_argument_decode_failure_is_soft() {
        let lua = Lua::new();
        install(&lua, "add", HostFunction::new(|a: i64, b: i64| a + b));
        let (value, err): (Option<i64>, String) =
            lua.load("return add(1, {})").eval().unwrap();
        assert_eq!(value, None);
        assert!(err.starts_with("error unmarshaling argument 2:"));
    }

    #[test]
    fn test_multiple_returns_and_unit() {
        let lua = Lua::new();
        install(
            &lua,
            "pair",
            HostFunction::new(|| ("ok".to_string(), vec![1, 2, 3])),
        );
        install(&lua, "noop", HostFunction::new(|_x: String| ()));

        let (status, len): (String, i64) =
            lua.load("local s, l = pair(); return s, #l").eval().unwrap();
        assert_eq!(status, "ok");
        assert_eq!(len, 3);

        let count: i64 = lua.load("return select('#', noop('a'))").eval().unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_closure_state_is_shared() {
        use std::cell::Cell;

        let lua = Lua::new();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        install(
            &lua,
            "tick",
            HostFunction::new(move || {
                counter.set(counter.get() + 1);
                counter.get()
            }),
        );
        lua.load("tick(); tick()").exec().unwrap();
        assert_eq!(calls.get(), 2);
    }
}
