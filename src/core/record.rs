// record accumulator + wire form for the registration service
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::{AttributeKey, AttributeValue, Primitive, RecordId, ShapeError};

/// Collects the attributes of a single record and serializes it for the
/// registration service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PidRecord {
    id: RecordId,
    pid: String,
    tuples: BTreeSet<(AttributeKey, Primitive)>,
}

/// One `{key, value}` pair of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireAttribute {
    pub key: String,
    pub value: Primitive,
}

/// `{ record: [{key, value}, ...], pid }` as consumed by the registration boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireRecord {
    pub record: Vec<WireAttribute>,
    pub pid: String,
}

impl PidRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_id(&mut self, id: impl Into<RecordId>) -> &mut Self {
        self.id = id.into();
        self
    }

    pub fn set_persistent_id(&mut self, pid: impl Into<String>) -> &mut Self {
        self.pid = pid.into();
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The explicit persistent identifier, `None` when unset.
    pub fn persistent_id(&self) -> Option<&str> {
        if self.pid.is_empty() { None } else { Some(&self.pid) }
    }

    /// The identifier consumers should use: the persistent id, or the local id as a
    /// provisional one.
    pub fn effective_pid(&self) -> &str {
        self.persistent_id().unwrap_or(&self.id)
    }

    /// Adds `value` under `key`.
    ///
    /// Absent values are ignored, sequences add each present element as its own tuple,
    /// identical tuples collapse.
    pub fn add_attribute(&mut self, key: &str, value: impl Into<AttributeValue>) -> &mut Self {
        match value.into() {
            AttributeValue::Absent => {}
            AttributeValue::One(p) => {
                self.tuples.insert((key.to_string(), p));
            }
            AttributeValue::Many(items) => {
                for p in items.into_iter().flatten() {
                    self.tuples.insert((key.to_string(), p));
                }
            }
        }
        self
    }

    /// Same as [`PidRecord::add_attribute`] for a raw JSON value.
    pub fn add_json_attribute(&mut self, key: &str, value: &Value) -> Result<&mut Self, ShapeError> {
        let value = AttributeValue::from_json(value)?;
        Ok(self.add_attribute(key, value))
    }

    //join predicate for backlink inference
    pub fn contains(&self, key: &str, value: &Primitive) -> bool {
        self.tuples.contains(&(key.to_string(), value.clone()))
    }

    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Primitive> + 'a {
        self.tuples
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &Primitive)> + '_ {
        self.tuples.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn serialize(&self) -> WireRecord {
        WireRecord {
            record: self
                .tuples
                .iter()
                .map(|(key, value)| WireAttribute {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
            pid: self.effective_pid().to_string(),
        }
    }
}
