use std::collections::BTreeMap;

use crate::core::Document;

/// Document storage of one shard, keyed by `_key`. Iteration order is key
/// order, which keeps scans deterministic.
#[derive(Debug, Clone, Default)]
pub struct ShardStore {
    documents: BTreeMap<String, Document>,
}

impl ShardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Document> {
        self.documents.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.documents.contains_key(key)
    }

    pub fn insert(&mut self, key: String, document: Document) {
        self.documents.insert(key, document);
    }

    pub fn remove(&mut self, key: &str) -> Option<Document> {
        self.documents.remove(key)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }
}
