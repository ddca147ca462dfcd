use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Collection '{0}' already exists")]
    CollectionExists(String),

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Document key is missing")]
    DocumentKeyMissing,

    #[error("Illegal document key: {0}")]
    DocumentKeyBad(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Revision conflict for document '{0}'")]
    RevisionConflict(String),

    #[error("Must not change the value of shard key attribute '{0}'")]
    MustNotChangeShardingAttributes(String),

    #[error("Unique constraint violated: document '{0}' already exists")]
    UniqueConstraintViolated(String),

    #[error("Unknown shard id: {0}")]
    UnknownShard(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),
}

impl DbError {
    /// A "missing row" failure: the per-document kind that `ignoreErrors`
    /// may tolerate. Revision conflicts are classified the same way for
    /// statistics purposes.
    pub fn is_document_not_found(&self) -> bool {
        matches!(
            self,
            DbError::DocumentNotFound(_) | DbError::RevisionConflict(_)
        )
    }

    /// Per-document failures that a tolerant statement turns into
    /// `writes_ignored` instead of aborting.
    pub fn is_ignorable(&self) -> bool {
        self.is_document_not_found() || matches!(self, DbError::UniqueConstraintViolated(_))
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_conflict_counts_as_missing_document() {
        assert!(DbError::DocumentNotFound("k".into()).is_document_not_found());
        assert!(DbError::RevisionConflict("k".into()).is_document_not_found());
        assert!(!DbError::UniqueConstraintViolated("k".into()).is_document_not_found());
    }

    #[test]
    fn test_ignorable_classification() {
        assert!(DbError::DocumentNotFound("k".into()).is_ignorable());
        assert!(DbError::UniqueConstraintViolated("k".into()).is_ignorable());
        assert!(!DbError::MustNotChangeShardingAttributes("id".into()).is_ignorable());
        assert!(!DbError::DocumentKeyMissing.is_ignorable());
        assert!(!DbError::DocumentKeyBad("42".into()).is_ignorable());
    }
}
