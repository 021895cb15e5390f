//! The application value model carried over the stream.

/// A dynamically typed MessagePack value.
///
/// Integers are split by sign the same way the wire format splits them:
/// non-negative numbers decode as `UInt`, negative numbers as `Int`.
/// Use [`Value::as_i64`] / [`Value::as_u64`] to read either variant.
///
/// Maps keep insertion order and preserve duplicate keys, since the
/// wire format allows both.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    UInt(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// Application-defined extension type and its raw payload.
    Ext(i8, Vec<u8>),
}

impl Value {
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer value if it fits in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::UInt(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Returns the integer value if it is non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(n) => Some(*n),
            Value::Int(n) => u64::try_from(*n).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F32(f) => Some(f64::from(*f)),
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bin(&self) -> Option<&[u8]> {
        match self {
            Value::Bin(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up the first entry whose key is the given string.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::UInt(n as u64)
            }
        })*
    };
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                if n < 0 {
                    Value::Int(n as i64)
                } else {
                    Value::UInt(n as u64)
                }
            }
        })*
    };
}

from_unsigned!(u8, u16, u32, u64, usize);
from_signed!(i8, i16, i32, i64, isize);

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::F32(f)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::F64(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bin(b)
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bin(b.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Vec<(Value, Value)>> for Value {
    fn from(entries: Vec<(Value, Value)>) -> Self {
        Value::Map(entries)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Nil, Into::into)
    }
}

#[cfg(feature = "json")]
mod json {
    use super::Value;
    use crate::error::{Error, Result};

    impl From<serde_json::Value> for Value {
        fn from(json: serde_json::Value) -> Self {
            match json {
                serde_json::Value::Null => Value::Nil,
                serde_json::Value::Bool(b) => Value::Bool(b),
                serde_json::Value::Number(n) => {
                    if let Some(u) = n.as_u64() {
                        Value::UInt(u)
                    } else if let Some(i) = n.as_i64() {
                        Value::Int(i)
                    } else {
                        Value::F64(n.as_f64().unwrap_or(f64::NAN))
                    }
                }
                serde_json::Value::String(s) => Value::Str(s),
                serde_json::Value::Array(items) => {
                    Value::Array(items.into_iter().map(Value::from).collect())
                }
                serde_json::Value::Object(map) => Value::Map(
                    map.into_iter()
                        .map(|(k, v)| (Value::Str(k), Value::from(v)))
                        .collect(),
                ),
            }
        }
    }

    impl TryFrom<Value> for serde_json::Value {
        type Error = Error;

        fn try_from(value: Value) -> Result<Self> {
            Ok(match value {
                Value::Nil => serde_json::Value::Null,
                Value::Bool(b) => serde_json::Value::Bool(b),
                Value::Int(n) => n.into(),
                Value::UInt(n) => n.into(),
                Value::F32(f) => float(f64::from(f))?,
                Value::F64(f) => float(f)?,
                Value::Str(s) => serde_json::Value::String(s),
                Value::Array(items) => serde_json::Value::Array(
                    items
                        .into_iter()
                        .map(serde_json::Value::try_from)
                        .collect::<Result<_>>()?,
                ),
                Value::Map(entries) => {
                    let mut map = serde_json::Map::with_capacity(entries.len());
                    for (k, v) in entries {
                        let Value::Str(key) = k else {
                            return Err(Error::encode("JSON object keys must be strings"));
                        };
                        map.insert(key, serde_json::Value::try_from(v)?);
                    }
                    serde_json::Value::Object(map)
                }
                Value::Bin(_) => return Err(Error::encode("binary has no JSON form")),
                Value::Ext(..) => return Err(Error::encode("extension types have no JSON form")),
            })
        }
    }

    fn float(f: f64) -> Result<serde_json::Value> {
        serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .ok_or_else(|| Error::encode("non-finite float has no JSON form"))
    }
}
