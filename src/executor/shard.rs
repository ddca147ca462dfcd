use serde_json::Value;

use crate::cluster::{CollectionInfo, PreparedWrite, ShardBatch, ShardOutcome};
use crate::core::{DbError, Document, Result, is_system_attribute};
use crate::statement::{OperationKind, ReturnMode};
use crate::storage::ShardStore;

/// Applies one shard's batch, one candidate row at a time, in enumeration
/// order. The caller provides per-shard atomicity: this function runs against
/// a scratch copy that is only committed when it returns `Ok`.
pub fn apply_batch(
    store: &mut ShardStore,
    info: &CollectionInfo,
    batch: &ShardBatch,
) -> Result<ShardOutcome> {
    let mut outcome = ShardOutcome::default();
    for write in &batch.writes {
        match batch.operation {
            OperationKind::Insert => apply_insert(store, info, batch, write, &mut outcome)?,
            OperationKind::Update | OperationKind::Replace | OperationKind::Remove => {
                apply_targeted(store, info, batch, write, &mut outcome)?
            }
        }
    }
    Ok(outcome)
}

fn apply_insert(
    store: &mut ShardStore,
    info: &CollectionInfo,
    batch: &ShardBatch,
    write: &PreparedWrite,
    outcome: &mut ShardOutcome,
) -> Result<()> {
    let mut document = write.selector.clone();
    let key = document
        .key()
        .map(str::to_string)
        .ok_or(DbError::DocumentKeyMissing)?;

    if store.contains(&key) {
        return settle(batch, false, DbError::UniqueConstraintViolated(key), outcome);
    }

    document.stamp_identity(info.name(), &key);
    if batch.return_mode == ReturnMode::New {
        outcome.returned.push(document.clone().into_value());
    }
    store.insert(key, document);
    outcome.executed += 1;
    Ok(())
}

fn apply_targeted(
    store: &mut ShardStore,
    info: &CollectionInfo,
    batch: &ShardBatch,
    write: &PreparedWrite,
    outcome: &mut ShardOutcome,
) -> Result<()> {
    let selector = &write.selector;
    let key = selector
        .key()
        .map(str::to_string)
        .ok_or(DbError::DocumentKeyMissing)?;

    let Some(stored) = store.get(&key).cloned() else {
        return settle(batch, write.broadcast, DbError::DocumentNotFound(key), outcome);
    };

    // Shard-key guard: a key expression must not disagree with the stored
    // document about any shard-key attribute. Checked before the pattern,
    // and never tolerated for single-document statements.
    for path in info.shard_keys() {
        if path.is_key() {
            continue;
        }
        if let Some(declared) = selector.get_path(path.segments()) {
            let current = stored.get_path(path.segments()).unwrap_or(&Value::Null);
            if declared != current {
                return settle(
                    batch,
                    write.broadcast,
                    DbError::MustNotChangeShardingAttributes(path.to_string()),
                    outcome,
                );
            }
        }
    }

    // The key expression doubles as a match pattern: every declared
    // attribute other than the system ones must equal the stored value.
    if batch.pattern_matching {
        for (attribute, declared) in selector.as_map() {
            if is_system_attribute(attribute) {
                continue;
            }
            let current = stored.get(attribute).unwrap_or(&Value::Null);
            if declared != current {
                return settle(
                    batch,
                    write.broadcast,
                    DbError::DocumentNotFound(key.clone()),
                    outcome,
                );
            }
        }
    }

    if !batch.options.ignore_revs {
        if let Some(declared_rev) = selector.revision() {
            if Some(declared_rev) != stored.revision() {
                return settle(
                    batch,
                    write.broadcast,
                    DbError::RevisionConflict(key.clone()),
                    outcome,
                );
            }
        }
    }

    let new_document = match batch.operation {
        OperationKind::Remove => {
            store.remove(&key);
            None
        }
        OperationKind::Update => {
            let payload = write.payload.as_ref().ok_or_else(|| {
                DbError::ExecutionError("UPDATE without a payload".into())
            })?;
            let mut updated = stored.clone();
            updated.merge(payload);
            check_payload_keeps_shard_keys(info, &stored, &updated)?;
            updated.stamp_identity(info.name(), &key);
            store.insert(key.clone(), updated.clone());
            Some(updated)
        }
        OperationKind::Replace => {
            let payload = write.payload.as_ref().ok_or_else(|| {
                DbError::ExecutionError("REPLACE without a payload".into())
            })?;
            let mut replacement = payload.without_system_attributes();
            check_payload_keeps_shard_keys(info, &stored, &replacement)?;
            replacement.stamp_identity(info.name(), &key);
            store.insert(key.clone(), replacement.clone());
            Some(replacement)
        }
        OperationKind::Insert => unreachable!("insert handled separately"),
    };

    outcome.executed += 1;
    match batch.return_mode {
        ReturnMode::Old => outcome.returned.push(stored.into_value()),
        ReturnMode::New => {
            if let Some(document) = new_document {
                outcome.returned.push(document.into_value());
            }
        }
        ReturnMode::None => {}
    }
    Ok(())
}

/// A payload that changes a shard-key attribute is an illegal operation, not
/// a missing row: it aborts the statement in every routing mode.
fn check_payload_keeps_shard_keys(
    info: &CollectionInfo,
    stored: &Document,
    new_document: &Document,
) -> Result<()> {
    for path in info.shard_keys() {
        if path.is_key() {
            continue;
        }
        let before = stored.get_path(path.segments()).unwrap_or(&Value::Null);
        let after = new_document
            .get_path(path.segments())
            .unwrap_or(&Value::Null);
        if before != after {
            return Err(DbError::MustNotChangeShardingAttributes(path.to_string()));
        }
    }
    Ok(())
}

/// Dispositions one per-document failure: counted as ignored, or aborting
/// the batch. Scatter copies tolerate missing-document failures on their own
/// (a non-owning shard legitimately lacks the row); everything else needs
/// `ignore_errors`. A shard-key mismatch is per-document only under
/// enumeration, and a payload-induced shard-key change never reaches here.
fn settle(
    batch: &ShardBatch,
    broadcast: bool,
    failure: DbError,
    outcome: &mut ShardOutcome,
) -> Result<()> {
    let tolerated = if failure.is_document_not_found() {
        broadcast || batch.options.ignore_errors
    } else if matches!(failure, DbError::MustNotChangeShardingAttributes(_)) {
        !batch.single_document && batch.options.ignore_errors
    } else {
        failure.is_ignorable() && batch.options.ignore_errors
    };

    if tolerated {
        outcome.ignored += 1;
        Ok(())
    } else {
        Err(failure)
    }
}
