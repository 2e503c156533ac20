//! Loosely typed field values used by the aggregated vehicle state

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field name → value for one message type.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A single decoded field value.
///
/// Integers of every wire width collapse into `Int`, floats into `Float` and
/// `char[]` arrays into `Text`. Serialized untagged so snapshots read like
/// plain dictionaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! int_field {
    ($($ty:ty),*) => {
        $(impl From<$ty> for FieldValue {
            fn from(v: $ty) -> Self {
                FieldValue::Int(i64::from(v))
            }
        })*
    };
}

int_field!(u8, u16, u32, i8, i16, i32, i64);

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        FieldValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(f64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions() {
        assert_eq!(FieldValue::from(89u8), FieldValue::Int(89));
        assert_eq!(FieldValue::from(-3i16).as_i64(), Some(-3));
        assert_eq!(FieldValue::from(u64::MAX), FieldValue::Int(i64::MAX));
        assert_eq!(FieldValue::from(1.5f32).as_f64(), Some(1.5));
        assert_eq!(FieldValue::from(7u32).as_f64(), Some(7.0));
        assert_eq!(FieldValue::from("PreArm: check").as_str(), Some("PreArm: check"));
        assert_eq!(FieldValue::from("x").as_i64(), None);
    }

    #[test]
    fn serializes_untagged() {
        let mut map = FieldMap::new();
        map.insert("custom_mode".into(), 4u32.into());
        map.insert("roll".into(), 0.5f32.into());
        map.insert("text".into(), "hello".into());
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"custom_mode":4,"roll":0.5,"text":"hello"}"#);
    }
}
