//! Dynamic Values
//!
//! The engine observes state expressed as dynamic, JSON-like values. Compound
//! values (objects and arrays) are shared handles: cloning a [`Value`] clones
//! the handle, not the contents, so every clone sees the same state and the
//! same observer.
//!
//! # Equality
//!
//! `Value` equality is the "same value" rule used to suppress redundant
//! notifications:
//!
//! - primitives compare by value, and `NaN` equals `NaN`;
//! - objects and arrays compare by identity.

mod array;
mod object;

use std::fmt;
use std::sync::Arc;

pub use array::{ArrayMethods, ArrayRef, Comparator};
pub(crate) use array::{native, WeakArrayRef};
pub(crate) use object::WeakObjectRef;
pub use object::{Getter, ObjectKind, ObjectRef, PropertyDescriptor, PropertyKind, Setter};

use crate::observer::Observer;

/// A dynamic value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Object(ObjectRef),
    Array(ArrayRef),
}

impl Value {
    /// Build fresh, unobserved values from JSON.
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s.into()),
            serde_json::Value::Array(items) => {
                Value::Array(ArrayRef::from_vec(items.into_iter().map(Value::from_json).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(ObjectRef::from_pairs(
                map.into_iter().map(|(k, v)| (k, Value::from_json(v))),
            )),
        }
    }

    /// Snapshot the current state as JSON without tracking any reads.
    ///
    /// `undefined` and non-finite numbers become `null`. Only enumerable keys
    /// are included. Self-referencing structures are not supported.
    pub fn to_json(&self) -> serde_json::Value {
        crate::reactive::ReactiveContext::untracked(|| self.to_json_inner())
    }

    fn to_json_inner(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.to_string()),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.to_vec().iter().map(Value::to_json_inner).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.keys()
                    .into_iter()
                    .map(|key| {
                        let value = obj.get(&key).to_json_inner();
                        (key, value)
                    })
                    .collect(),
            ),
        }
    }

    /// Whether this is an object or array, i.e. something that can carry an
    /// observer.
    pub fn is_compound(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Array(_))
    }

    /// Whether this is `undefined` or `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The observer attached to this value, if it has been observed.
    pub fn observer(&self) -> Option<Arc<Observer>> {
        match self {
            Value::Object(obj) => obj.observer(),
            Value::Array(arr) => arr.observer(),
            _ => None,
        }
    }

    /// The "same value" comparison used by reactive setters.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Array(_) => "array",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(obj) => fmt::Debug::fmt(obj, f),
            Value::Array(arr) => fmt::Debug::fmt(arr, f),
        }
    }
}

/// Renders values the way the host stringifies them. Array sorting without
/// a comparator orders by this rendering.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_nan() => f.write_str("NaN"),
            Value::Number(n) if n.is_infinite() => {
                f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" })
            }
            Value::Number(n) if *n == 0.0 => f.write_str("0"),
            Value::Number(n) => write_number(f, *n),
            Value::String(s) => f.write_str(s),
            Value::Object(_) => f.write_str("[object Object]"),
            Value::Array(arr) => {
                for (i, item) in arr.to_vec().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_nullish() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// Finite, non-zero numbers. Magnitudes of `1e21` and above, or below
/// `1e-6`, use exponent notation with an explicit sign (`1e+21`, `1.5e-7`).
fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    let magnitude = n.abs();
    if magnitude < 1e21 && magnitude >= 1e-6 {
        return write!(f, "{n}");
    }
    let rendered = format!("{n:e}");
    match rendered.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => write!(f, "{mantissa}e+{exp}"),
        _ => f.write_str(&rendered),
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(json)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<ArrayRef> for Value {
    fn from(arr: ArrayRef) -> Self {
        Value::Array(arr)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(ArrayRef::from_vec(items))
    }
}

/// A property key: an array index or a named property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(String),
}

/// Largest valid array index. Array lengths stay below `2^32 - 1`.
pub const MAX_ARRAY_INDEX: usize = 4_294_967_294;

impl Key {
    /// The key as a valid array index, if it is one.
    ///
    /// Names that spell a non-negative integer count as indices. Anything
    /// above [`MAX_ARRAY_INDEX`] does not.
    pub fn as_index(&self) -> Option<usize> {
        let index = match self {
            Key::Index(i) => Some(*i),
            Key::Name(name) => {
                let digits = !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit());
                let canonical = name == "0" || !name.starts_with('0');
                if digits && canonical {
                    name.parse().ok()
                } else {
                    None
                }
            }
        };
        index.filter(|&i| i <= MAX_ARRAY_INDEX)
    }

    /// The key as an object property name.
    pub fn to_name(&self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Name(name) => name.clone(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

/// Short description of a value for diagnostics.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        Value::Object(_) | Value::Array(_) => value.type_name().to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nan_is_same_as_nan() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Number(1.0), Value::Number(f64::NAN));
    }

    #[test]
    fn compound_values_compare_by_identity() {
        let a = Value::from(json!({ "x": 1 }));
        let b = Value::from(json!({ "x": 1 }));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn json_conversion_preserves_structure() {
        let source = json!({ "a": 1, "b": [true, null, "s"], "c": { "d": 2.5 } });
        let value = Value::from(source.clone());
        assert_eq!(value.to_json(), source);
    }

    #[test]
    fn display_matches_host_rendering() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(0.5).to_string(), "0.5");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::Number(1e21).to_string(), "1e+21");
        assert_eq!(Value::Number(-2.5e30).to_string(), "-2.5e+30");
        assert_eq!(Value::Number(1.5e-7).to_string(), "1.5e-7");
        assert_eq!(Value::Number(0.000001).to_string(), "0.000001");
        assert_eq!(Value::Number(123456789012345680000.0).to_string(), "123456789012345680000");
        assert_eq!(Value::from(json!([1, null, "x"])).to_string(), "1,,x");
        assert_eq!(Value::from(json!({})).to_string(), "[object Object]");
    }

    #[test]
    fn index_keys() {
        assert_eq!(Key::from(3).as_index(), Some(3));
        assert_eq!(Key::from("12").as_index(), Some(12));
        assert_eq!(Key::from("0").as_index(), Some(0));
        assert_eq!(Key::from("01").as_index(), None);
        assert_eq!(Key::from("-1").as_index(), None);
        assert_eq!(Key::from("1.5").as_index(), None);
        assert_eq!(Key::from("name").as_index(), None);
        assert_eq!(Key::from("4294967294").as_index(), Some(MAX_ARRAY_INDEX));
        assert_eq!(Key::from("4294967295").as_index(), None);
        assert_eq!(Key::from("18446744073709551615").as_index(), None);
        assert_eq!(Key::from(usize::MAX).as_index(), None);
        assert_eq!(Key::from(7).to_name(), "7");
    }
}
