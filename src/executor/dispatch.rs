use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::Value;
use tracing::debug;

use crate::cluster::{
    CollectionInfo, PreparedWrite, ShardBatch, ShardId, ShardTransport,
};
use crate::core::{DbError, Document, ID_ATTRIBUTE, KEY_ATTRIBUTE, REV_ATTRIBUTE, Result};
use crate::executor::stats::{ModificationOutcome, WriteStats};
use crate::planner::{ModificationPlan, RoutingMode};
use crate::statement::{EnumerationSource, NormalizedStatement, OperationKind, ReturnMode};

/// One candidate row together with the shard it was enumerated from, when it
/// came out of a collection scan.
struct CandidateRow {
    origin: Option<ShardId>,
    value: Value,
}

/// Drives one modification plan: gathers candidate rows, resolves them into
/// per-document writes, routes the writes per the plan's routing mode and
/// folds the per-shard outcomes into a single result.
pub struct StatementExecutor<T: ShardTransport> {
    transport: Arc<T>,
}

impl<T: ShardTransport> StatementExecutor<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    pub async fn execute(&self, plan: &ModificationPlan) -> Result<ModificationOutcome> {
        let statement = &plan.statement;
        let info = self.transport.collection_info(&statement.collection).await?;

        let rows = self.gather_rows(statement).await?;
        let candidates = rows.len();
        let batches = self.route(plan, &info, rows).await?;

        let shard_results = try_join_all(batches.into_iter().map(|(shard, batch)| {
            let transport = Arc::clone(&self.transport);
            let collection = statement.collection.clone();
            async move { transport.apply_modification(&collection, shard, batch).await }
        }))
        .await?;

        let mut stats = WriteStats::default();
        let mut returned = Vec::new();
        for outcome in &shard_results {
            stats.absorb(outcome);
            returned.extend(outcome.returned.iter().cloned());
        }
        debug!(
            operation = statement.operation.name(),
            collection = %statement.collection,
            candidates,
            executed = stats.writes_executed,
            ignored = stats.writes_ignored,
            "statement executed"
        );

        // A nested statement contributes its projection as one value to the
        // surrounding query.
        if statement.in_subquery && statement.return_mode != ReturnMode::None {
            returned = vec![Value::Array(returned)];
        }
        Ok(ModificationOutcome { returned, stats })
    }

    async fn gather_rows(&self, statement: &NormalizedStatement) -> Result<Vec<CandidateRow>> {
        match &statement.source {
            // The statement itself is the only candidate.
            EnumerationSource::None => Ok(vec![CandidateRow {
                origin: None,
                value: Value::Null,
            }]),
            EnumerationSource::Sequence { from, to } => Ok((*from..=*to)
                .map(|i| CandidateRow {
                    origin: None,
                    value: Value::from(i),
                })
                .collect()),
            EnumerationSource::Collection { name, filter } => {
                let info = self.transport.collection_info(name).await?;
                let mut rows = Vec::new();
                for shard in info.shards() {
                    for document in self.transport.enumerate(name, shard).await? {
                        let value = document.into_value();
                        if let Some(predicate) = filter {
                            if !matches!(predicate.evaluate(&value)?, Value::Bool(true)) {
                                continue;
                            }
                        }
                        rows.push(CandidateRow {
                            origin: Some(shard),
                            value,
                        });
                    }
                }
                Ok(rows)
            }
        }
    }

    /// Resolve every candidate row into a prepared write and assign it to its
    /// target shard(s).
    async fn route(
        &self,
        plan: &ModificationPlan,
        info: &CollectionInfo,
        rows: Vec<CandidateRow>,
    ) -> Result<BTreeMap<ShardId, ShardBatch>> {
        let statement = &plan.statement;
        let routing = plan.routing();
        let mut per_shard: BTreeMap<ShardId, Vec<PreparedWrite>> = BTreeMap::new();

        for row in rows {
            let (selector, payload) = self.prepare_write(statement, info, &row.value).await?;
            let write = PreparedWrite {
                selector,
                payload,
                broadcast: false,
            };

            match routing {
                RoutingMode::Restricted(shard) => {
                    per_shard.entry(shard).or_default().push(write);
                }
                RoutingMode::ShardLocal => {
                    let shard = row.origin.ok_or_else(|| {
                        DbError::ExecutionError(
                            "shard-local routing without an enumerated origin".into(),
                        )
                    })?;
                    per_shard.entry(shard).or_default().push(write);
                }
                RoutingMode::Distribute => {
                    let target = if statement.operation == OperationKind::Insert {
                        Some(info.shard_for_document(&write.selector))
                    } else {
                        info.shard_for_selector(&write.selector)
                    };
                    match target {
                        Some(shard) => per_shard.entry(shard).or_default().push(write),
                        // Undetermined shard: scatter a copy everywhere. The
                        // owning shard applies it, every other copy misses.
                        None => {
                            debug!(
                                collection = %statement.collection,
                                "selector misses shard-key attributes, scattering"
                            );
                            for shard in info.shards() {
                                let mut copy = write.clone();
                                copy.broadcast = true;
                                per_shard.entry(shard).or_default().push(copy);
                            }
                        }
                    }
                }
            }
        }

        let single_document = statement.is_single_document();
        Ok(per_shard
            .into_iter()
            .map(|(shard, writes)| {
                (
                    shard,
                    ShardBatch {
                        operation: statement.operation,
                        writes,
                        options: statement.options,
                        return_mode: statement.return_mode,
                        pattern_matching: statement.pattern_matching,
                        single_document,
                    },
                )
            })
            .collect())
    }

    async fn prepare_write(
        &self,
        statement: &NormalizedStatement,
        info: &CollectionInfo,
        row: &Value,
    ) -> Result<(Document, Option<Document>)> {
        let selector_value = statement.selector.evaluate(row)?;

        let selector = if statement.operation == OperationKind::Insert {
            let mut document = Document::from_value(selector_value)?;
            // User payloads never dictate `_id` or `_rev`; a string `_key` is
            // honored, otherwise one is allocated here.
            document.remove(ID_ATTRIBUTE);
            document.remove(REV_ATTRIBUTE);
            match document.remove(KEY_ATTRIBUTE) {
                Some(Value::String(key)) => document.insert(KEY_ATTRIBUTE, Value::String(key)),
                Some(other) => return Err(DbError::DocumentKeyBad(other.to_string())),
                None => {
                    let key = self.transport.generate_key(info.name()).await?;
                    document.insert(KEY_ATTRIBUTE, Value::String(key));
                }
            }
            document
        } else {
            let document = coerce_selector(selector_value)?;
            if document.key().is_none() {
                // Statically the expression looked key-bearing; this row
                // resolved it to something unusable.
                return Err(DbError::DocumentKeyMissing);
            }
            document
        };

        let payload = match &statement.payload {
            Some(expr) => Some(Document::from_value(expr.evaluate(row)?)?),
            None => None,
        };
        Ok((selector, payload))
    }
}

/// A key expression may evaluate to a bare key string or a selector object.
fn coerce_selector(value: Value) -> Result<Document> {
    match value {
        Value::String(key) => {
            let mut document = Document::new();
            document.insert(KEY_ATTRIBUTE, Value::String(key));
            Ok(document)
        }
        Value::Object(_) => Document::from_value(value),
        other => Err(DbError::ExecutionError(format!(
            "key expression must yield a string or object, got {other}"
        ))),
    }
}
