// shared value types for records and designs
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type RecordId = String;
pub type AttributeKey = String;
pub type LinkType = String;

/// A single attribute value as accepted by the registration service.
///
/// Equality and ordering are total (floats compare by `f64::total_cmp`), so primitives
/// can live in ordered sets. Across variants the order is bool < int < uint < float < string.
/// `UInt` only holds integers above `i64::MAX`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Primitive {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
}

impl Primitive {
    fn rank(&self) -> u8 {
        match self {
            Primitive::Bool(_) => 0,
            Primitive::Int(_) => 1,
            Primitive::UInt(_) => 2,
            Primitive::Float(_) => 3,
            Primitive::String(_) => 4,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Primitive::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Converts a JSON scalar. `null` maps to `Ok(None)`, arrays and objects are rejected.
    pub fn from_json(value: &Value) -> Result<Option<Primitive>, ShapeError> {
        match value {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(Primitive::Bool(*b))),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Some(Primitive::Int(i)))
                } else if let Some(u) = n.as_u64() {
                    Ok(Some(Primitive::UInt(u)))
                } else {
                    n.as_f64()
                        .map(|f| Some(Primitive::Float(f)))
                        .ok_or_else(|| ShapeError::Number(n.to_string()))
                }
            }
            Value::String(s) => Ok(Some(Primitive::String(s.clone()))),
            Value::Array(_) => Err(ShapeError::NestedSequence),
            Value::Object(_) => Err(ShapeError::Object),
        }
    }
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Primitive {}

impl PartialOrd for Primitive {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Primitive {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Primitive::Bool(a), Primitive::Bool(b)) => a.cmp(b),
            (Primitive::Int(a), Primitive::Int(b)) => a.cmp(b),
            (Primitive::UInt(a), Primitive::UInt(b)) => a.cmp(b),
            (Primitive::Float(a), Primitive::Float(b)) => a.total_cmp(b),
            (Primitive::String(a), Primitive::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Primitive {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Primitive::Bool(b) => b.hash(state),
            Primitive::Int(i) => i.hash(state),
            Primitive::UInt(u) => u.hash(state),
            Primitive::Float(f) => f.to_bits().hash(state),
            Primitive::String(s) => s.hash(state),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Bool(b) => write!(f, "{b}"),
            Primitive::Int(i) => write!(f, "{i}"),
            Primitive::UInt(u) => write!(f, "{u}"),
            Primitive::Float(x) => write!(f, "{x}"),
            Primitive::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Primitive::String(value.to_string())
    }
}

impl From<String> for Primitive {
    fn from(value: String) -> Self {
        Primitive::String(value)
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Primitive::Bool(value)
    }
}

impl From<i64> for Primitive {
    fn from(value: i64) -> Self {
        Primitive::Int(value)
    }
}

impl From<i32> for Primitive {
    fn from(value: i32) -> Self {
        Primitive::Int(value as i64)
    }
}

impl From<u64> for Primitive {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or(Primitive::UInt(value), Primitive::Int)
    }
}

impl From<f64> for Primitive {
    fn from(value: f64) -> Self {
        Primitive::Float(value)
    }
}

/// What an extractor hands to a record: nothing, one primitive, or a flat sequence of
/// optional primitives. Only one level of nesting is representable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Absent,
    One(Primitive),
    Many(Vec<Option<Primitive>>),
}

impl AttributeValue {
    /// Maps a JSON value onto the accepted shapes.
    ///
    /// `null` is absent, scalars are single values, arrays of scalars/nulls are
    /// sequences. Nested arrays and objects are unsupported.
    pub fn from_json(value: &Value) -> Result<AttributeValue, ShapeError> {
        match value {
            Value::Array(items) => {
                let many = items
                    .iter()
                    .map(Primitive::from_json)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(AttributeValue::Many(many))
            }
            other => Ok(match Primitive::from_json(other)? {
                Some(p) => AttributeValue::One(p),
                None => AttributeValue::Absent,
            }),
        }
    }
}

macro_rules! single_attribute_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    AttributeValue::One(value.into())
                }
            }
        )*
    };
}

single_attribute_value!(Primitive, &str, String, bool, i64, i32, u64, f64);

impl<T: Into<Primitive>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => AttributeValue::One(v.into()),
            None => AttributeValue::Absent,
        }
    }
}

macro_rules! many_attribute_value {
    ($($ty:ty),*) => {
        $(
            impl From<Vec<$ty>> for AttributeValue {
                fn from(values: Vec<$ty>) -> Self {
                    AttributeValue::Many(values.into_iter().map(|v| Some(v.into())).collect())
                }
            }
        )*
    };
}

many_attribute_value!(Primitive, &str, String, i64, f64);

impl From<Vec<Option<Primitive>>> for AttributeValue {
    fn from(values: Vec<Option<Primitive>>) -> Self {
        AttributeValue::Many(values)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("nested sequences are not supported as attribute values")]
    NestedSequence,
    #[error("JSON objects are not supported as attribute values")]
    Object,
    #[error("number {0} is not representable as an attribute value")]
    Number(String),
}

/// Why an extractor could not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// Raised on purpose by `stop_with_fail`. Always fatal for the run.
    #[error("Design stopped. {0}")]
    Aborted(String),
    #[error("nothing found at {query}")]
    Unresolved { query: String },
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("{0}")]
    Failed(String),
}

impl ExtractError {
    pub fn is_abort(&self) -> bool {
        matches!(self, ExtractError::Aborted(_))
    }
}
