//! Schema-less materialization of provider JSON.
//!
//! Every resource (player, clan, war log, ...) is turned into the same
//! [`GenericRecord`] tree; typed facades in [`crate::models`] read fields from it
//! by name. Missing fields read as `None`, since the provider omits fields that do
//! not apply (a clanless player has no `clan`).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Number, Value};

use crate::{errors::Error, Result};

/// Provider timestamp layout, e.g. `20240105T083000.000Z`.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.fZ";

#[derive(Clone, Debug, PartialEq)]
pub enum Field {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    List(Vec<Field>),
    Record(GenericRecord),
}

impl Field {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Field::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Field::Number(n) => n.as_u64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Field::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Field::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&GenericRecord> {
        match self {
            Field::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Field]> {
        match self {
            Field::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Convert back into plain JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Field::Null => Value::Null,
            Field::Bool(b) => Value::Bool(*b),
            Field::Number(n) => Value::Number(n.clone()),
            Field::String(s) => Value::String(s.clone()),
            Field::List(items) => Value::Array(items.iter().map(Field::to_json).collect()),
            Field::Record(r) => r.to_json(),
        }
    }
}

/// Field map of one JSON object, with nested objects materialized recursively.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenericRecord {
    fields: BTreeMap<String, Field>,
}

impl GenericRecord {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            fields: map.into_iter().map(|(k, v)| (k, materialize(v))).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Field::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Field::as_i64)
    }

    pub fn get_u64(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Field::as_u64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Field::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Field::as_bool)
    }

    pub fn get_record(&self, name: &str) -> Option<&GenericRecord> {
        self.get(name).and_then(Field::as_record)
    }

    pub fn get_list(&self, name: &str) -> Option<&[Field]> {
        self.get(name).and_then(Field::as_list)
    }

    /// Record elements of a list field; scalar elements are skipped.
    pub fn get_records(&self, name: &str) -> impl Iterator<Item = &GenericRecord> {
        self.get_list(name)
            .unwrap_or_default()
            .iter()
            .filter_map(Field::as_record)
    }

    /// Parse a provider timestamp field. Absent or malformed values read as `None`.
    pub fn get_timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        let raw = self.get_str(name)?;
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .ok()
            .map(|dt| dt.and_utc())
    }

    /// Like [`GenericRecord::get`], but absence is an [`Error::ApiProtocol`].
    ///
    /// For fields the protocol guarantees (a war log always has `items`).
    pub fn require(&self, name: &str) -> Result<&Field> {
        self.get(name)
            .ok_or_else(|| Error::protocol(format!("expected field {name:?} is missing"), None))
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

/// Recursively materialize a JSON value.
pub fn materialize(value: Value) -> Field {
    match value {
        Value::Null => Field::Null,
        Value::Bool(b) => Field::Bool(b),
        Value::Number(n) => Field::Number(n),
        Value::String(s) => Field::String(s),
        Value::Array(items) => Field::List(items.into_iter().map(materialize).collect()),
        Value::Object(map) => Field::Record(GenericRecord::from_map(map)),
    }
}

/// Materialize a response body that must be a JSON object.
pub fn materialize_record(value: Value) -> Result<GenericRecord> {
    match value {
        Value::Object(map) => Ok(GenericRecord::from_map(map)),
        other => Err(Error::protocol(
            "expected a JSON object at the top level",
            Some(other),
        )),
    }
}
