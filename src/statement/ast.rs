use serde_json::{Map, Value};

use crate::cluster::AttributePath;
use crate::core::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Insert,
    Update,
    Replace,
    Remove,
}

impl OperationKind {
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Insert => "INSERT",
            OperationKind::Update => "UPDATE",
            OperationKind::Replace => "REPLACE",
            OperationKind::Remove => "REMOVE",
        }
    }
}

/// Projection of the modified documents back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnMode {
    #[default]
    None,
    Old,
    New,
}

#[derive(Debug, Clone, Copy)]
pub struct StatementOptions {
    /// Tolerate per-document failures, counting them as ignored writes.
    pub ignore_errors: bool,
    /// When false, a `_rev` in the key expression must match the stored
    /// revision.
    pub ignore_revs: bool,
}

impl Default for StatementOptions {
    fn default() -> Self {
        Self {
            ignore_errors: false,
            ignore_revs: true,
        }
    }
}

/// Where candidate rows come from.
#[derive(Debug, Clone)]
pub enum EnumerationSource {
    /// No enumeration: the statement targets a single, pre-known document.
    None,
    /// Full scan of a collection, optionally filtered.
    Collection {
        name: String,
        filter: Option<Expr>,
    },
    /// Generated integer sequence, inclusive on both ends.
    Sequence { from: i64, to: i64 },
}

impl EnumerationSource {
    pub fn is_none(&self) -> bool {
        matches!(self, EnumerationSource::None)
    }

    /// Name of the enumerated collection, when there is one.
    pub fn collection(&self) -> Option<&str> {
        match self {
            EnumerationSource::Collection { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// The expression seam consumed from the surrounding query engine. Only the
/// shapes the modification planner must analyze are modeled; everything else
/// arrives as an opaque `Concat` style computation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// The enumerated row itself.
    Row,
    /// An attribute path into the enumerated row.
    RowPath(AttributePath),
    /// Object construction with per-field expressions.
    Object(Vec<(String, Expr)>),
    /// String concatenation of the stringified operands.
    Concat(Vec<Expr>),
    /// Equality comparison, used by enumeration filters.
    Eq(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn literal(value: Value) -> Self {
        Expr::Literal(value)
    }

    pub fn row() -> Self {
        Expr::Row
    }

    pub fn path(path: &str) -> Self {
        Expr::RowPath(AttributePath::parse(path))
    }

    pub fn object<const N: usize>(fields: [(&str, Expr); N]) -> Self {
        Expr::Object(
            fields
                .into_iter()
                .map(|(name, expr)| (name.to_string(), expr))
                .collect(),
        )
    }

    pub fn concat<const N: usize>(parts: [Expr; N]) -> Self {
        Expr::Concat(parts.into_iter().collect())
    }

    pub fn eq(left: Expr, right: Expr) -> Self {
        Expr::Eq(Box::new(left), Box::new(right))
    }

    /// True when evaluation cannot observe the enumerated row.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Literal(_) => true,
            Expr::Row | Expr::RowPath(_) => false,
            Expr::Object(fields) => fields.iter().all(|(_, e)| e.is_constant()),
            Expr::Concat(parts) => parts.iter().all(Expr::is_constant),
            Expr::Eq(left, right) => left.is_constant() && right.is_constant(),
        }
    }

    /// Evaluate against one candidate row. Missing row attributes evaluate
    /// to `null`.
    pub fn evaluate(&self, row: &Value) -> Result<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Row => Ok(row.clone()),
            Expr::RowPath(path) => Ok(lookup_path(row, path.segments())),
            Expr::Object(fields) => {
                let mut map = Map::new();
                for (name, expr) in fields {
                    map.insert(name.clone(), expr.evaluate(row)?);
                }
                Ok(Value::Object(map))
            }
            Expr::Concat(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&stringify(&part.evaluate(row)?));
                }
                Ok(Value::String(out))
            }
            Expr::Eq(left, right) => {
                Ok(Value::Bool(left.evaluate(row)? == right.evaluate(row)?))
            }
        }
    }
}

fn lookup_path(row: &Value, segments: &[String]) -> Value {
    let mut current = row;
    for segment in segments {
        match current.as_object().and_then(|map| map.get(segment)) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A declarative modification statement before normalization, as handed over
/// by the query engine: operation, target expression, optional payload and
/// enumeration source.
#[derive(Debug, Clone)]
pub struct ModifyStatement {
    pub operation: OperationKind,
    pub collection: String,
    /// Key expression for UPDATE/REPLACE/REMOVE; document payload for INSERT.
    pub target: Expr,
    /// The WITH clause of UPDATE/REPLACE.
    pub payload: Option<Expr>,
    pub source: EnumerationSource,
    pub options: StatementOptions,
    pub return_mode: ReturnMode,
    pub in_subquery: bool,
}

impl ModifyStatement {
    fn new(operation: OperationKind, collection: &str, target: Expr) -> Self {
        Self {
            operation,
            collection: collection.to_string(),
            target,
            payload: None,
            source: EnumerationSource::None,
            options: StatementOptions::default(),
            return_mode: ReturnMode::None,
            in_subquery: false,
        }
    }

    pub fn insert(collection: &str, document: Expr) -> Self {
        Self::new(OperationKind::Insert, collection, document)
    }

    pub fn update(collection: &str, key_expr: Expr) -> Self {
        Self::new(OperationKind::Update, collection, key_expr)
    }

    pub fn replace(collection: &str, key_expr: Expr) -> Self {
        Self::new(OperationKind::Replace, collection, key_expr)
    }

    pub fn remove(collection: &str, key_expr: Expr) -> Self {
        Self::new(OperationKind::Remove, collection, key_expr)
    }

    pub fn with(mut self, payload: Expr) -> Self {
        self.payload = Some(payload);
        self
    }

    /// FOR row IN <collection> ...
    pub fn for_collection(mut self, name: &str) -> Self {
        self.source = EnumerationSource::Collection {
            name: name.to_string(),
            filter: None,
        };
        self
    }

    /// FOR i IN <from>..<to> ...
    pub fn for_range(mut self, from: i64, to: i64) -> Self {
        self.source = EnumerationSource::Sequence { from, to };
        self
    }

    pub fn filter(mut self, predicate: Expr) -> Self {
        if let EnumerationSource::Collection { filter, .. } = &mut self.source {
            *filter = Some(predicate);
        }
        self
    }

    pub fn ignore_errors(mut self, value: bool) -> Self {
        self.options.ignore_errors = value;
        self
    }

    pub fn ignore_revs(mut self, value: bool) -> Self {
        self.options.ignore_revs = value;
        self
    }

    pub fn returning(mut self, mode: ReturnMode) -> Self {
        self.return_mode = mode;
        self
    }

    pub fn in_subquery(mut self) -> Self {
        self.in_subquery = true;
        self
    }
}
