use std::fmt;
use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Document, KEY_ATTRIBUTE};

/// One horizontal partition of a collection. Shards are numbered from zero
/// within their collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(pub u32);

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// A dot-separated attribute path, e.g. `a.b` addressing `doc.a.b`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributePath(Vec<String>);

impl AttributePath {
    pub fn parse(path: &str) -> Self {
        Self(path.split('.').map(str::to_string).collect())
    }

    pub fn key() -> Self {
        Self(vec![KEY_ATTRIBUTE.to_string()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_key(&self) -> bool {
        self.0.len() == 1 && self.0[0] == KEY_ATTRIBUTE
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for AttributePath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// Creation-time options for a collection.
#[derive(Debug, Clone)]
pub struct CollectionOptions {
    pub number_of_shards: u32,
    pub shard_keys: Vec<AttributePath>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            shard_keys: Vec::new(),
        }
    }
}

impl CollectionOptions {
    pub fn with_shards(number_of_shards: u32) -> Self {
        Self {
            number_of_shards,
            shard_keys: Vec::new(),
        }
    }

    pub fn shard_keys(mut self, keys: &[&str]) -> Self {
        self.shard_keys = keys.iter().map(|k| AttributePath::parse(k)).collect();
        self
    }
}

/// Immutable shard topology of one collection: name, shard count and the
/// ordered shard-key attribute paths. Collections without custom shard keys
/// are partitioned by `_key`.
#[derive(Debug, Clone)]
pub struct CollectionInfo {
    name: String,
    number_of_shards: u32,
    shard_keys: Vec<AttributePath>,
}

impl CollectionInfo {
    pub fn new(name: impl Into<String>, options: CollectionOptions) -> Self {
        let shard_keys = if options.shard_keys.is_empty() {
            vec![AttributePath::key()]
        } else {
            options.shard_keys
        };
        Self {
            name: name.into(),
            number_of_shards: options.number_of_shards.max(1),
            shard_keys,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number_of_shards(&self) -> u32 {
        self.number_of_shards
    }

    pub fn shard_keys(&self) -> &[AttributePath] {
        &self.shard_keys
    }

    /// True when the collection is partitioned by `_key` alone. This is the
    /// common case and enables the strongest plan rewrites.
    pub fn uses_default_shard_key(&self) -> bool {
        self.shard_keys.len() == 1 && self.shard_keys[0].is_key()
    }

    pub fn shards(&self) -> impl Iterator<Item = ShardId> {
        (0..self.number_of_shards).map(ShardId)
    }

    /// Shard responsible for a finished document, as used at creation time.
    /// Shard-key attributes absent from the document hash as `null`, so every
    /// well-formed document has a defined home shard.
    pub fn shard_for_document(&self, document: &Document) -> ShardId {
        let tuple: Vec<&Value> = self
            .shard_keys
            .iter()
            .map(|path| document.get_path(path.segments()).unwrap_or(&Value::Null))
            .collect();
        self.shard_for_tuple(&tuple)
    }

    /// Shard a selector routes to, or `None` when any shard-key attribute is
    /// missing from the selector (routing undetermined: the stored document
    /// may carry any value there).
    pub fn shard_for_selector(&self, selector: &Document) -> Option<ShardId> {
        let tuple: Vec<&Value> = self
            .shard_keys
            .iter()
            .map(|path| selector.get_path(path.segments()))
            .collect::<Option<Vec<_>>>()?;
        Some(self.shard_for_tuple(&tuple))
    }

    /// Shard computed from statically-known shard-key values, in shard-key
    /// order. Used by the plan rewrite that pins an operation to one shard.
    pub fn shard_for_values(&self, values: &[Value]) -> Option<ShardId> {
        if values.len() != self.shard_keys.len() {
            return None;
        }
        let tuple: Vec<&Value> = values.iter().collect();
        Some(self.shard_for_tuple(&tuple))
    }

    // The hash must be deterministic and identical at creation and routing
    // time, otherwise storage and routing disagree.
    fn shard_for_tuple(&self, tuple: &[&Value]) -> ShardId {
        let mut hasher = crc32fast::Hasher::new();
        for value in tuple {
            // Canonical serialization; serde_json emits a stable form.
            let serialized =
                serde_json::to_string(value).unwrap_or_else(|_| String::from("null"));
            hasher.write(serialized.as_bytes());
            hasher.write_u8(0);
        }
        ShardId(hasher.finalize() % self.number_of_shards)
    }
}
