// src/models/record.rs
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Opaque external identifier of a record. Never interpreted by the scorer,
/// only carried through so results can be attributed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{}", id),
            RecordId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        RecordId::Int(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Text(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId::Text(id)
    }
}

/// A record is a flat mapping from field name to its string value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: HashMap<String, String>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Raw value as stored, including empty strings.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Value used for comparisons. Absent keys and blank values both count as missing.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.get(field).filter(|v| !v.trim().is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Two records to be compared. Records are shared, so pairing the same record
/// with many candidates does not copy it.
#[derive(Debug, Clone)]
pub struct RecordPair {
    pub left: Arc<Record>,
    pub right: Arc<Record>,
}

impl RecordPair {
    pub fn new(left: impl Into<Arc<Record>>, right: impl Into<Arc<Record>>) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
        }
    }
}

/// A record pair together with the external ids of both sides.
#[derive(Debug, Clone)]
pub struct IdentifiedPair {
    pub id_a: RecordId,
    pub id_b: RecordId,
    pub pair: RecordPair,
}

impl IdentifiedPair {
    pub fn new(
        id_a: impl Into<RecordId>,
        left: impl Into<Arc<Record>>,
        id_b: impl Into<RecordId>,
        right: impl Into<Arc<Record>>,
    ) -> Self {
        Self {
            id_a: id_a.into(),
            id_b: id_b.into(),
            pair: RecordPair::new(left, right),
        }
    }
}
