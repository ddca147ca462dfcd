use serde_json::Value;

use crate::core::{DbError, KEY_ATTRIBUTE, Result};
use crate::statement::ast::{
    EnumerationSource, Expr, ModifyStatement, OperationKind, ReturnMode, StatementOptions,
};

/// A statement after normalization: the key-expression and payload sources
/// are separated, defaults are resolved and statically-detectable shape
/// defects have been rejected.
#[derive(Debug, Clone)]
pub struct NormalizedStatement {
    pub operation: OperationKind,
    pub collection: String,
    /// Evaluates per candidate row to the routing/selection input: the
    /// finished document for INSERT, the selector for everything else.
    pub selector: Expr,
    /// Evaluates to the document payload; absent for REMOVE.
    pub payload: Option<Expr>,
    /// Whether the selector also acts as a match pattern against the stored
    /// document. False when the key expression doubles as the payload.
    pub pattern_matching: bool,
    pub source: EnumerationSource,
    pub options: StatementOptions,
    pub return_mode: ReturnMode,
    pub in_subquery: bool,
}

impl NormalizedStatement {
    /// Single-document statements have no enumeration: the target is known
    /// before the collection is touched.
    pub fn is_single_document(&self) -> bool {
        self.source.is_none()
    }
}

/// Canonicalizes INSERT/UPDATE/REPLACE/REMOVE statements into key-expression
/// plus payload form.
pub struct StatementNormalizer;

impl StatementNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, statement: ModifyStatement) -> Result<NormalizedStatement> {
        self.check_return_mode(&statement)?;

        let (selector, payload, pattern_matching) = match statement.operation {
            OperationKind::Insert => (statement.target, None, false),
            OperationKind::Remove => {
                self.check_key_derivable(&statement.target)?;
                (statement.target, None, true)
            }
            OperationKind::Update | OperationKind::Replace => {
                self.check_key_derivable(&statement.target)?;
                match statement.payload {
                    // Separate WITH payload: the key expression is a pattern.
                    Some(payload) => (statement.target, Some(payload), true),
                    // The key expression doubles as the payload and selects
                    // by _key only.
                    None => (statement.target.clone(), Some(statement.target), false),
                }
            }
        };

        Ok(NormalizedStatement {
            operation: statement.operation,
            collection: statement.collection,
            selector,
            payload,
            pattern_matching,
            source: statement.source,
            options: statement.options,
            return_mode: statement.return_mode,
            in_subquery: statement.in_subquery,
        })
    }

    fn check_return_mode(&self, statement: &ModifyStatement) -> Result<()> {
        match (statement.operation, statement.return_mode) {
            (OperationKind::Insert, ReturnMode::Old) => Err(DbError::UnsupportedOperation(
                "INSERT cannot RETURN OLD".into(),
            )),
            (OperationKind::Remove, ReturnMode::New) => Err(DbError::UnsupportedOperation(
                "REMOVE cannot RETURN NEW".into(),
            )),
            _ => Ok(()),
        }
    }

    /// A key expression that provably cannot yield a `_key` is a
    /// statement-level shape defect, rejected before planning.
    fn check_key_derivable(&self, key_expr: &Expr) -> Result<()> {
        let derivable = match key_expr {
            // Strings and row references resolve to a key at runtime.
            Expr::Row | Expr::RowPath(_) | Expr::Concat(_) => true,
            Expr::Literal(Value::String(_)) => true,
            Expr::Literal(Value::Object(map)) => map.contains_key(KEY_ATTRIBUTE),
            Expr::Object(fields) => fields.iter().any(|(name, _)| name == KEY_ATTRIBUTE),
            _ => false,
        };
        if derivable {
            Ok(())
        } else {
            Err(DbError::DocumentKeyMissing)
        }
    }
}

impl Default for StatementNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
