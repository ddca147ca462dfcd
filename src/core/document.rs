use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{DbError, Result};

pub const KEY_ATTRIBUTE: &str = "_key";
pub const ID_ATTRIBUTE: &str = "_id";
pub const REV_ATTRIBUTE: &str = "_rev";

/// System attributes are maintained by the store itself and are never taken
/// from user payloads.
pub fn is_system_attribute(name: &str) -> bool {
    matches!(name, KEY_ATTRIBUTE | ID_ATTRIBUTE | REV_ATTRIBUTE)
}

/// Mint a fresh, opaque revision token.
pub fn new_revision() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// A schemaless document: a JSON object with the system attributes `_key`,
/// `_id` and `_rev`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build a document from an arbitrary JSON value. Anything but an object
    /// is rejected.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DbError::ExecutionError(format!(
                "expected a document object, got {other}"
            ))),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.0.get(attribute)
    }

    /// Read a nested value along a dot-separated attribute path. Path `a.b`
    /// means `self["a"]["b"]`.
    pub fn get_path(&self, path: &[String]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    pub fn insert(&mut self, attribute: impl Into<String>, value: Value) {
        self.0.insert(attribute.into(), value);
    }

    pub fn remove(&mut self, attribute: &str) -> Option<Value> {
        self.0.remove(attribute)
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.0.contains_key(attribute)
    }

    pub fn key(&self) -> Option<&str> {
        self.0.get(KEY_ATTRIBUTE).and_then(Value::as_str)
    }

    pub fn revision(&self) -> Option<&str> {
        self.0.get(REV_ATTRIBUTE).and_then(Value::as_str)
    }

    /// Stamp the system attributes for a document stored under `key` in
    /// `collection`, assigning a fresh revision.
    pub fn stamp_identity(&mut self, collection: &str, key: &str) {
        self.0
            .insert(KEY_ATTRIBUTE.to_string(), Value::String(key.to_string()));
        self.0.insert(
            ID_ATTRIBUTE.to_string(),
            Value::String(format!("{collection}/{key}")),
        );
        self.0
            .insert(REV_ATTRIBUTE.to_string(), Value::String(new_revision()));
    }

    /// Merge `patch` into this document, top level, skipping system
    /// attributes. Present attributes overwrite, absent ones are kept.
    pub fn merge(&mut self, patch: &Document) {
        for (attribute, value) in patch.0.iter() {
            if is_system_attribute(attribute) {
                continue;
            }
            self.0.insert(attribute.clone(), value.clone());
        }
    }

    /// Strip system attributes, e.g. before using a selector object as a
    /// replace payload.
    pub fn without_system_attributes(&self) -> Document {
        let map = self
            .0
            .iter()
            .filter(|(attribute, _)| !is_system_attribute(attribute))
            .map(|(attribute, value)| (attribute.clone(), value.clone()))
            .collect();
        Document(map)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
