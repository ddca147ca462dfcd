use async_trait::async_trait;

use crate::cluster::topology::{CollectionInfo, ShardId};
use crate::core::{Document, Result};
use crate::statement::{OperationKind, ReturnMode, StatementOptions};

/// One per-document write, fully resolved against its candidate row.
#[derive(Debug, Clone)]
pub struct PreparedWrite {
    /// For INSERT: the finished document. Otherwise: the selector document
    /// (at least `_key`, possibly pattern attributes and `_rev`).
    pub selector: Document,
    /// Resolved payload; absent for REMOVE and INSERT.
    pub payload: Option<Document>,
    /// True when this write is a scatter copy: the row's shard could not be
    /// determined, so it was sent to every shard and a missing document here
    /// is expected rather than an error.
    pub broadcast: bool,
}

/// A batch of writes dispatched to one shard.
#[derive(Debug, Clone)]
pub struct ShardBatch {
    pub operation: OperationKind,
    pub writes: Vec<PreparedWrite>,
    pub options: StatementOptions,
    pub return_mode: ReturnMode,
    /// Whether selectors act as match patterns against stored documents.
    pub pattern_matching: bool,
    /// True for statements without an enumeration source; shard-key
    /// violations there always abort the statement.
    pub single_document: bool,
}

/// What one shard reports back for its batch.
#[derive(Debug, Clone, Default)]
pub struct ShardOutcome {
    pub executed: u64,
    pub ignored: u64,
    pub returned: Vec<serde_json::Value>,
}

/// The per-shard RPC boundary towards the nodes hosting the shards. The
/// planner and executor only ever talk to shards through this trait; tests
/// and the embedded store use the in-memory implementation.
#[async_trait]
pub trait ShardTransport: Send + Sync {
    /// Shard-topology lookup: collection name to shard configuration.
    async fn collection_info(&self, collection: &str) -> Result<CollectionInfo>;

    /// Scan one shard of a collection.
    async fn enumerate(&self, collection: &str, shard: ShardId) -> Result<Vec<Document>>;

    /// Allocate a fresh document key. A single atomic allocation per
    /// document; collisions with existing keys are the caller's error.
    async fn generate_key(&self, collection: &str) -> Result<String>;

    /// Apply a batch of modifications on one shard. Per-shard atomicity: on
    /// error the shard's state is unchanged; other shards are unaffected
    /// either way.
    async fn apply_modification(
        &self,
        collection: &str,
        shard: ShardId,
        batch: ShardBatch,
    ) -> Result<ShardOutcome>;
}
