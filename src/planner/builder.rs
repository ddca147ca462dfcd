use crate::cluster::{CollectionInfo, ShardId};
use crate::core::Result;
use crate::planner::plan::{
    CalculateNode, DistributeNode, EnumerateNode, ModificationPlan, ModifyNode, PlanNode,
    ReturnNode,
};
use crate::statement::{NormalizedStatement, OperationKind, ReturnMode};

/// Builds the baseline distributed plan:
/// Enumerate -> Calculate -> Distribute -> {op} -> Return.
///
/// Single-shard collections never need a Distribute node; their operations
/// are pinned to the only shard from the start.
pub struct PlanBuilder;

impl PlanBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        statement: NormalizedStatement,
        info: &CollectionInfo,
    ) -> Result<ModificationPlan> {
        let mut nodes = Vec::new();

        if !statement.source.is_none() {
            nodes.push(PlanNode::Enumerate(EnumerateNode {
                source: statement.source.clone(),
            }));
        }

        nodes.push(PlanNode::Calculate(CalculateNode {
            selector: statement.selector.clone(),
            payload: statement.payload.clone(),
        }));

        let single_shard = info.number_of_shards() == 1;
        if !single_shard {
            nodes.push(PlanNode::Distribute(DistributeNode {
                collection: statement.collection.clone(),
            }));
        }

        let mut modify = ModifyNode::new(&statement.collection);
        if single_shard {
            modify.restricted_to = Some(ShardId(0));
        }
        nodes.push(match statement.operation {
            OperationKind::Insert => PlanNode::Insert(modify),
            OperationKind::Update => PlanNode::Update(modify),
            OperationKind::Replace => PlanNode::Replace(modify),
            OperationKind::Remove => PlanNode::Remove(modify),
        });

        if statement.return_mode != ReturnMode::None {
            nodes.push(PlanNode::Return(ReturnNode {
                mode: statement.return_mode,
            }));
        }

        Ok(ModificationPlan {
            nodes,
            applied_rules: Vec::new(),
            statement,
        })
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::CollectionOptions;
    use crate::statement::{Expr, ModifyStatement, StatementNormalizer};
    use serde_json::json;

    fn plan_for(statement: ModifyStatement, info: &CollectionInfo) -> ModificationPlan {
        let normalized = StatementNormalizer::new().normalize(statement).unwrap();
        PlanBuilder::new().build(normalized, info).unwrap()
    }

    #[test]
    fn test_baseline_has_distribute() {
        let info = CollectionInfo::new("c", CollectionOptions::with_shards(5));
        let stmt = ModifyStatement::remove("c", Expr::path("_key")).for_collection("c");
        let plan = plan_for(stmt, &info);

        let explanation = plan.explain();
        assert_eq!(
            explanation.nodes,
            vec!["EnumerateNode", "CalculateNode", "DistributeNode", "RemoveNode"]
        );
    }

    #[test]
    fn test_single_shard_collection_omits_distribute() {
        let info = CollectionInfo::new("c", CollectionOptions::with_shards(1));
        let stmt = ModifyStatement::insert("c", Expr::literal(json!({ "value": 1 })));
        let plan = plan_for(stmt, &info);

        assert!(!plan.has_distribute());
        assert_eq!(plan.modify_node().restricted_to, Some(ShardId(0)));
    }

    #[test]
    fn test_return_node_present_only_with_projection() {
        let info = CollectionInfo::new("c", CollectionOptions::with_shards(5));
        let stmt = ModifyStatement::insert("c", Expr::literal(json!({})))
            .returning(ReturnMode::New);
        let plan = plan_for(stmt, &info);
        assert!(plan.explain().has_node("ReturnNode"));

        let stmt = ModifyStatement::insert("c", Expr::literal(json!({})));
        let plan = plan_for(stmt, &info);
        assert!(!plan.explain().has_node("ReturnNode"));
    }
}
