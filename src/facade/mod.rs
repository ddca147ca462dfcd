use std::sync::Arc;

use serde_json::Value;

use crate::cluster::CollectionOptions;
use crate::core::{Document, Result};
use crate::executor::{ModificationOutcome, StatementExecutor};
use crate::planner::{ModificationPlan, PlanBuilder, PlanExplanation, RewritePass};
use crate::statement::{ModifyStatement, StatementNormalizer};
use crate::storage::InMemoryCluster;

/// An embedded sharded document store: collection management plus the full
/// modification pipeline (normalize, plan, rewrite, execute) over the
/// in-memory cluster.
pub struct Database {
    cluster: Arc<InMemoryCluster>,
    normalizer: StatementNormalizer,
    builder: PlanBuilder,
    rewriter: RewritePass,
}

impl Database {
    pub fn new() -> Self {
        Self {
            cluster: Arc::new(InMemoryCluster::new()),
            normalizer: StatementNormalizer::new(),
            builder: PlanBuilder::new(),
            rewriter: RewritePass::new(),
        }
    }

    pub async fn create_collection(&self, name: &str, options: CollectionOptions) -> Result<()> {
        self.cluster.create_collection(name, options).await
    }

    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        self.cluster.drop_collection(name).await
    }

    /// Direct document write, bypassing the statement pipeline. Routed by the
    /// collection's shard keys like any other document.
    pub async fn insert_document(&self, collection: &str, value: Value) -> Result<Document> {
        self.cluster.insert_document(collection, value).await
    }

    pub async fn count(&self, collection: &str) -> Result<usize> {
        self.cluster.count(collection).await
    }

    pub async fn documents(&self, collection: &str) -> Result<Vec<Document>> {
        self.cluster.documents(collection).await
    }

    /// The rewritten plan a statement would execute as.
    pub async fn plan(&self, statement: ModifyStatement) -> Result<ModificationPlan> {
        use crate::cluster::ShardTransport;

        let normalized = self.normalizer.normalize(statement)?;
        let info = self.cluster.collection_info(&normalized.collection).await?;
        let mut plan = self.builder.build(normalized, &info)?;
        self.rewriter.apply(&mut plan, &info)?;
        Ok(plan)
    }

    /// Node types and applied rewrite rules, for assertions and diagnostics.
    pub async fn explain(&self, statement: ModifyStatement) -> Result<PlanExplanation> {
        Ok(self.plan(statement).await?.explain())
    }

    /// Run one statement end to end.
    ///
    /// # Examples
    ///
    /// ```
    /// use docshard::{CollectionOptions, Database, Expr, ModifyStatement};
    /// use serde_json::json;
    ///
    /// # tokio_test::block_on(async {
    /// let db = Database::new();
    /// db.create_collection("c", CollectionOptions::with_shards(3))
    ///     .await
    ///     .unwrap();
    ///
    /// let stmt = ModifyStatement::insert("c", Expr::object([("value", Expr::row())]))
    ///     .for_range(1, 10);
    /// let outcome = db.execute(stmt).await.unwrap();
    /// assert_eq!(outcome.stats.writes_executed, 10);
    /// # });
    /// ```
    pub async fn execute(&self, statement: ModifyStatement) -> Result<ModificationOutcome> {
        let plan = self.plan(statement).await?;
        let executor = StatementExecutor::new(Arc::clone(&self.cluster));
        executor.execute(&plan).await
    }
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}
