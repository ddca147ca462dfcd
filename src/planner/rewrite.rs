use serde_json::Value;
use tracing::debug;

use crate::cluster::{AttributePath, CollectionInfo};
use crate::core::Result;
use crate::planner::plan::{ModificationPlan, RoutingMode};
use crate::statement::{Expr, OperationKind};

pub const RULE_RESTRICT_TO_SINGLE_SHARD: &str = "restrict-to-single-shard";
pub const RULE_UNDISTRIBUTE_AFTER_ENUMERATE: &str = "undistribute-modify-after-enumerate";

/// How one shard-key attribute of the routing input is produced. Rewrite
/// eligibility dispatches on this tag.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyDerivation {
    /// Statically known value, independent of the enumerated row.
    Constant(Value),
    /// Read unmodified from the enumerated row at this path.
    FromRow(AttributePath),
    /// Provably absent from the routing input.
    Missing,
    /// Not analyzable (computed expression).
    Opaque,
}

/// Applies the eligibility-gated plan rewrites, in order. Rules only change
/// the routing mechanism, never the multiset of candidate rows reaching the
/// operation node.
pub struct RewritePass;

impl RewritePass {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, plan: &mut ModificationPlan, info: &CollectionInfo) -> Result<()> {
        if !plan.has_distribute() || plan.routing() != RoutingMode::Distribute {
            // Single-shard collections and already-pinned plans need no
            // routing rewrites.
            return Ok(());
        }

        if self.try_restrict_to_single_shard(plan, info) {
            return Ok(());
        }
        self.try_undistribute_after_enumerate(plan, info);
        Ok(())
    }

    /// Rule 1: the document(s) to modify are known before touching the
    /// collection. Fires when every shard-key attribute of the routing input
    /// is a compile-time constant; the Distribute node is replaced by an
    /// operation pinned to the shard those constants hash to.
    fn try_restrict_to_single_shard(
        &self,
        plan: &mut ModificationPlan,
        info: &CollectionInfo,
    ) -> bool {
        let selector = plan.statement.selector.clone();
        let mut values = Vec::with_capacity(info.shard_keys().len());
        for path in info.shard_keys() {
            match derive_attribute(&selector, path) {
                KeyDerivation::Constant(value) => values.push(value),
                _ => return false,
            }
        }

        let Some(shard) = info.shard_for_values(&values) else {
            return false;
        };
        debug!(
            collection = info.name(),
            %shard,
            "restricting modification to a single shard"
        );
        plan.restrict_to_shard(shard, RULE_RESTRICT_TO_SINGLE_SHARD);
        true
    }

    /// Rule 2: the statement enumerates the very collection it modifies and
    /// every shard-key attribute of the key expression is drawn unmodified
    /// from the enumerated row. The enumerating shard already is the correct
    /// target shard, so re-routing is redundant and Distribute is elided.
    ///
    /// Conservative by design: a shard-key attribute fixed to a literal (the
    /// row's true shard and the literal's implied shard may diverge) or
    /// missing from the key expression keeps the Distribute node.
    fn try_undistribute_after_enumerate(&self, plan: &mut ModificationPlan, info: &CollectionInfo) {
        if plan.operation() == OperationKind::Insert {
            return;
        }
        let statement = &plan.statement;
        if statement.source.collection() != Some(statement.collection.as_str()) {
            return;
        }

        let selector = statement.selector.clone();
        for path in info.shard_keys() {
            match derive_attribute(&selector, path) {
                KeyDerivation::FromRow(row_path) if row_path == *path => {}
                _ => return,
            }
        }
        // The selector must locate each document by the row's own key.
        match derive_attribute(&selector, &AttributePath::key()) {
            KeyDerivation::FromRow(row_path) if row_path.is_key() => {}
            _ => return,
        }

        debug!(collection = info.name(), "eliding distribute after enumeration");
        plan.elide_distribute(RULE_UNDISTRIBUTE_AFTER_ENUMERATE);
    }
}

impl Default for RewritePass {
    fn default() -> Self {
        Self::new()
    }
}

/// Statically derive how the routing input produces the attribute at `path`.
///
/// Scalar-shaped key expressions (a bare string or `row._key` style
/// reference) stand for `{ _key: <expr> }`.
pub fn derive_attribute(selector: &Expr, path: &AttributePath) -> KeyDerivation {
    match selector {
        Expr::RowPath(row_path) => {
            if path.is_key() {
                KeyDerivation::FromRow(row_path.clone())
            } else {
                KeyDerivation::Missing
            }
        }
        Expr::Literal(Value::String(key)) => {
            if path.is_key() {
                KeyDerivation::Constant(Value::String(key.clone()))
            } else {
                KeyDerivation::Missing
            }
        }
        Expr::Concat(_) if selector.is_constant() => {
            if path.is_key() {
                evaluate_constant(selector)
            } else {
                KeyDerivation::Missing
            }
        }
        Expr::Concat(_) => {
            if path.is_key() {
                KeyDerivation::Opaque
            } else {
                KeyDerivation::Missing
            }
        }
        _ => derive_in_document(selector, path.segments()),
    }
}

fn derive_in_document(expr: &Expr, segments: &[String]) -> KeyDerivation {
    match expr {
        Expr::Row => KeyDerivation::FromRow(AttributePath::parse(&segments.join("."))),
        Expr::RowPath(row_path) => {
            let mut combined = row_path.segments().to_vec();
            combined.extend_from_slice(segments);
            KeyDerivation::FromRow(AttributePath::parse(&combined.join(".")))
        }
        Expr::Literal(value) => match lookup(value, segments) {
            Some(found) => KeyDerivation::Constant(found.clone()),
            None => KeyDerivation::Missing,
        },
        Expr::Object(fields) => {
            let Some((first, rest)) = segments.split_first() else {
                return if expr.is_constant() {
                    evaluate_constant(expr)
                } else {
                    KeyDerivation::Opaque
                };
            };
            match fields.iter().find(|(name, _)| name == first) {
                None => KeyDerivation::Missing,
                Some((_, field_expr)) => {
                    if rest.is_empty() {
                        classify_leaf(field_expr)
                    } else {
                        derive_in_document(field_expr, rest)
                    }
                }
            }
        }
        _ => KeyDerivation::Opaque,
    }
}

fn classify_leaf(expr: &Expr) -> KeyDerivation {
    match expr {
        Expr::Literal(value) => KeyDerivation::Constant(value.clone()),
        Expr::RowPath(row_path) => KeyDerivation::FromRow(row_path.clone()),
        _ if expr.is_constant() => evaluate_constant(expr),
        _ => KeyDerivation::Opaque,
    }
}

fn evaluate_constant(expr: &Expr) -> KeyDerivation {
    match expr.evaluate(&Value::Null) {
        Ok(value) => KeyDerivation::Constant(value),
        Err(_) => KeyDerivation::Opaque,
    }
}

fn lookup<'a>(value: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::CollectionOptions;
    use crate::planner::PlanBuilder;
    use crate::statement::{ModifyStatement, StatementNormalizer};
    use serde_json::json;

    fn rewrite(statement: ModifyStatement, info: &CollectionInfo) -> ModificationPlan {
        let normalized = StatementNormalizer::new().normalize(statement).unwrap();
        let mut plan = PlanBuilder::new().build(normalized, info).unwrap();
        RewritePass::new().apply(&mut plan, info).unwrap();
        plan
    }

    fn sharded(keys: &[&str]) -> CollectionInfo {
        CollectionInfo::new("c", CollectionOptions::with_shards(5).shard_keys(keys))
    }

    #[test]
    fn test_constant_key_restricts_to_single_shard() {
        let info = sharded(&["id"]);
        let stmt = ModifyStatement::update(
            "c",
            Expr::literal(json!({ "_key": "k1", "id": "test" })),
        )
        .with(Expr::literal(json!({ "value": 2 })));
        let plan = rewrite(stmt, &info);

        assert!(!plan.has_distribute());
        assert!(plan.explain().has_rule(RULE_RESTRICT_TO_SINGLE_SHARD));
        assert!(matches!(plan.routing(), RoutingMode::Restricted(_)));
    }

    #[test]
    fn test_row_derived_key_elides_distribute() {
        let info = sharded(&["id"]);
        let stmt = ModifyStatement::remove(
            "c",
            Expr::object([("_key", Expr::path("_key")), ("id", Expr::path("id"))]),
        )
        .for_collection("c");
        let plan = rewrite(stmt, &info);

        assert!(!plan.has_distribute());
        assert!(plan.explain().has_rule(RULE_UNDISTRIBUTE_AFTER_ENUMERATE));
        assert_eq!(plan.routing(), RoutingMode::ShardLocal);
    }

    #[test]
    fn test_whole_row_selector_elides_distribute() {
        let info = sharded(&["id"]);
        let stmt = ModifyStatement::remove("c", Expr::row()).for_collection("c");
        let plan = rewrite(stmt, &info);

        assert!(!plan.has_distribute());
        assert_eq!(plan.routing(), RoutingMode::ShardLocal);
    }

    #[test]
    fn test_literal_shard_key_wins_over_elision() {
        // { _key: d._key, id: 42 }: the shard keys are all constants, so the
        // restriction rule fires even though _key is row-derived.
        let info = sharded(&["id"]);
        let stmt = ModifyStatement::remove(
            "c",
            Expr::object([("_key", Expr::path("_key")), ("id", Expr::literal(json!(42)))]),
        )
        .for_collection("c");
        let plan = rewrite(stmt, &info);

        assert!(!plan.has_distribute());
        assert!(plan.explain().has_rule(RULE_RESTRICT_TO_SINGLE_SHARD));
        assert!(!plan.explain().has_rule(RULE_UNDISTRIBUTE_AFTER_ENUMERATE));
    }

    #[test]
    fn test_missing_shard_key_keeps_distribute() {
        let info = sharded(&["id1", "id2"]);
        let stmt = ModifyStatement::remove(
            "c",
            Expr::object([("_key", Expr::path("_key")), ("id1", Expr::path("id1"))]),
        )
        .for_collection("c");
        let plan = rewrite(stmt, &info);

        assert!(plan.has_distribute());
        assert!(plan.applied_rules.is_empty());
    }

    #[test]
    fn test_mixed_row_and_literal_keeps_distribute() {
        let info = sharded(&["id1", "id2"]);
        let stmt = ModifyStatement::remove(
            "c",
            Expr::object([
                ("_key", Expr::path("_key")),
                ("id1", Expr::path("id1")),
                ("id2", Expr::literal(json!(2))),
            ]),
        )
        .for_collection("c");
        let plan = rewrite(stmt, &info);

        assert!(plan.has_distribute());
        assert!(plan.applied_rules.is_empty());
    }

    #[test]
    fn test_opaque_insert_key_keeps_distribute() {
        let info = CollectionInfo::new("c", CollectionOptions::with_shards(5));
        let stmt = ModifyStatement::insert(
            "c",
            Expr::object([
                ("value", Expr::row()),
                ("_key", Expr::concat([Expr::literal(json!("test")), Expr::row()])),
            ]),
        )
        .for_range(1, 100);
        let plan = rewrite(stmt, &info);

        assert!(plan.has_distribute());
        assert!(plan.applied_rules.is_empty());
    }

    #[test]
    fn test_nested_shard_key_path_derivation() {
        let selector = Expr::object([("a", Expr::object([("b", Expr::literal(json!("x")))]))]);
        assert_eq!(
            derive_attribute(&selector, &AttributePath::parse("a.b")),
            KeyDerivation::Constant(json!("x"))
        );

        let from_row = Expr::object([("a", Expr::path("a"))]);
        assert_eq!(
            derive_attribute(&from_row, &AttributePath::parse("a.b")),
            KeyDerivation::FromRow(AttributePath::parse("a.b"))
        );
    }

    #[test]
    fn test_scalar_selector_stands_for_key() {
        let selector = Expr::path("_key");
        assert_eq!(
            derive_attribute(&selector, &AttributePath::key()),
            KeyDerivation::FromRow(AttributePath::key())
        );
        assert_eq!(
            derive_attribute(&selector, &AttributePath::parse("id")),
            KeyDerivation::Missing
        );
    }
}
