use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cluster::{
    CollectionInfo, CollectionOptions, ShardBatch, ShardId, ShardOutcome, ShardTransport,
};
use crate::core::{DbError, Document, Result};
use crate::executor::shard::apply_batch;
use crate::storage::shard::ShardStore;

/// One collection's shards plus its key allocator.
struct CollectionShards {
    info: CollectionInfo,
    shards: Vec<RwLock<ShardStore>>,
    key_seq: AtomicU64,
}

impl CollectionShards {
    fn new(info: CollectionInfo) -> Self {
        let shards = (0..info.number_of_shards())
            .map(|_| RwLock::new(ShardStore::new()))
            .collect();
        Self {
            info,
            shards,
            key_seq: AtomicU64::new(0),
        }
    }

    fn shard(&self, shard: ShardId) -> Result<&RwLock<ShardStore>> {
        self.shards
            .get(shard.0 as usize)
            .ok_or_else(|| DbError::UnknownShard(shard.to_string()))
    }
}

/// All shards of all collections, hosted in one process. Stands in for the
/// cluster behind the `ShardTransport` seam; the planner and executor cannot
/// tell the difference.
#[derive(Default)]
pub struct InMemoryCluster {
    collections: RwLock<HashMap<String, Arc<CollectionShards>>>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_collection(&self, name: &str, options: CollectionOptions) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(DbError::CollectionExists(name.to_string()));
        }
        let info = CollectionInfo::new(name, options);
        debug!(
            collection = name,
            shards = info.number_of_shards(),
            "collection created"
        );
        collections.insert(name.to_string(), Arc::new(CollectionShards::new(info)));
        Ok(())
    }

    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DbError::CollectionNotFound(name.to_string()))
    }

    async fn collection(&self, name: &str) -> Result<Arc<CollectionShards>> {
        let collections = self.collections.read().await;
        collections
            .get(name)
            .cloned()
            .ok_or_else(|| DbError::CollectionNotFound(name.to_string()))
    }

    /// Store one document directly, routed by its shard-key values. Used for
    /// seeding outside the statement pipeline.
    pub async fn insert_document(&self, collection: &str, value: Value) -> Result<Document> {
        let target = self.collection(collection).await?;
        let mut document = Document::from_value(value)?;
        let key = match document.key() {
            Some(key) => key.to_string(),
            None => self.generate_key(collection).await?,
        };
        document.stamp_identity(collection, &key);

        let shard = target.info.shard_for_document(&document);
        let mut store = target.shard(shard)?.write().await;
        if store.contains(&key) {
            return Err(DbError::UniqueConstraintViolated(key));
        }
        store.insert(key, document.clone());
        Ok(document)
    }

    pub async fn count(&self, collection: &str) -> Result<usize> {
        let target = self.collection(collection).await?;
        let mut total = 0;
        for shard in &target.shards {
            total += shard.read().await.len();
        }
        Ok(total)
    }

    /// All documents of a collection, shard by shard.
    pub async fn documents(&self, collection: &str) -> Result<Vec<Document>> {
        let target = self.collection(collection).await?;
        let mut all = Vec::new();
        for shard in &target.shards {
            all.extend(shard.read().await.documents().cloned());
        }
        Ok(all)
    }
}

#[async_trait]
impl ShardTransport for InMemoryCluster {
    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo> {
        Ok(self.collection(collection).await?.info.clone())
    }

    async fn enumerate(&self, collection: &str, shard: ShardId) -> Result<Vec<Document>> {
        let target = self.collection(collection).await?;
        let store = target.shard(shard)?.read().await;
        Ok(store.documents().cloned().collect())
    }

    async fn generate_key(&self, collection: &str) -> Result<String> {
        let target = self.collection(collection).await?;
        let n = target.key_seq.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!("{n}"))
    }

    async fn apply_modification(
        &self,
        collection: &str,
        shard: ShardId,
        batch: ShardBatch,
    ) -> Result<ShardOutcome> {
        let target = self.collection(collection).await?;
        let mut store = target.shard(shard)?.write().await;

        // Run against a scratch copy and commit on success only, so a failed
        // batch leaves this shard untouched.
        let mut scratch = store.clone();
        let outcome = apply_batch(&mut scratch, &target.info, &batch)?;
        *store = scratch;
        Ok(outcome)
    }
}
