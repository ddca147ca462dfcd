use crate::cluster::ShardId;
use crate::statement::{EnumerationSource, Expr, NormalizedStatement, OperationKind, ReturnMode};

/// One node of a modification plan. Plans are small arenas executed in index
/// order; rewrites replace the node sequence as a whole instead of patching
/// a shared graph.
#[derive(Debug, Clone)]
pub enum PlanNode {
    /// Source of candidate rows.
    Enumerate(EnumerateNode),
    /// Derives the selector / payload documents from each row.
    Calculate(CalculateNode),
    /// Routes each candidate row to the shard computed from its routing
    /// input.
    Distribute(DistributeNode),
    Insert(ModifyNode),
    Update(ModifyNode),
    Replace(ModifyNode),
    Remove(ModifyNode),
    /// OLD/NEW projection back to the caller.
    Return(ReturnNode),
}

impl PlanNode {
    pub fn type_name(&self) -> &'static str {
        match self {
            PlanNode::Enumerate(_) => "EnumerateNode",
            PlanNode::Calculate(_) => "CalculateNode",
            PlanNode::Distribute(_) => "DistributeNode",
            PlanNode::Insert(_) => "InsertNode",
            PlanNode::Update(_) => "UpdateNode",
            PlanNode::Replace(_) => "ReplaceNode",
            PlanNode::Remove(_) => "RemoveNode",
            PlanNode::Return(_) => "ReturnNode",
        }
    }

    pub fn as_modify(&self) -> Option<&ModifyNode> {
        match self {
            PlanNode::Insert(node)
            | PlanNode::Update(node)
            | PlanNode::Replace(node)
            | PlanNode::Remove(node) => Some(node),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumerateNode {
    pub source: EnumerationSource,
}

#[derive(Debug, Clone)]
pub struct CalculateNode {
    pub selector: Expr,
    pub payload: Option<Expr>,
}

#[derive(Debug, Clone)]
pub struct DistributeNode {
    pub collection: String,
}

#[derive(Debug, Clone)]
pub struct ModifyNode {
    pub collection: String,
    /// Set by the single-shard restriction rewrite (and for one-shard
    /// collections): every candidate row goes to exactly this shard.
    pub restricted_to: Option<ShardId>,
    /// Set by the distribute-elision rewrite: each row is applied on the
    /// shard that enumerated it.
    pub shard_local: bool,
}

impl ModifyNode {
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            restricted_to: None,
            shard_local: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReturnNode {
    pub mode: ReturnMode,
}

/// How candidate rows reach their target shard(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// Per-row routing through the Distribute node. Rows whose shard cannot
    /// be determined from the selector fall back to a scatter to all shards.
    Distribute,
    /// The whole statement is pinned to one shard.
    Restricted(ShardId),
    /// Distribute was elided: the enumerating shard is the target shard.
    ShardLocal,
}

/// Introspection output for testing and EXPLAIN.
#[derive(Debug, Clone)]
pub struct PlanExplanation {
    pub nodes: Vec<String>,
    pub applied_rules: Vec<String>,
}

impl PlanExplanation {
    pub fn has_node(&self, type_name: &str) -> bool {
        self.nodes.iter().any(|n| n == type_name)
    }

    pub fn has_rule(&self, rule: &str) -> bool {
        self.applied_rules.iter().any(|r| r == rule)
    }
}

/// A complete plan for one modification statement: built once, rewritten by
/// zero or more rules, executed once and discarded.
#[derive(Debug, Clone)]
pub struct ModificationPlan {
    pub nodes: Vec<PlanNode>,
    pub applied_rules: Vec<String>,
    pub statement: NormalizedStatement,
}

impl ModificationPlan {
    pub fn operation(&self) -> OperationKind {
        self.statement.operation
    }

    pub fn has_distribute(&self) -> bool {
        self.nodes
            .iter()
            .any(|node| matches!(node, PlanNode::Distribute(_)))
    }

    pub fn modify_node(&self) -> &ModifyNode {
        self.nodes
            .iter()
            .find_map(PlanNode::as_modify)
            .expect("modification plan without a modify node")
    }

    fn modify_node_mut(&mut self) -> &mut ModifyNode {
        self.nodes
            .iter_mut()
            .find_map(|node| match node {
                PlanNode::Insert(n)
                | PlanNode::Update(n)
                | PlanNode::Replace(n)
                | PlanNode::Remove(n) => Some(n),
                _ => None,
            })
            .expect("modification plan without a modify node")
    }

    pub fn routing(&self) -> RoutingMode {
        let modify = self.modify_node();
        if let Some(shard) = modify.restricted_to {
            RoutingMode::Restricted(shard)
        } else if modify.shard_local {
            RoutingMode::ShardLocal
        } else {
            RoutingMode::Distribute
        }
    }

    /// Drop the Distribute node and pin the operation to `shard`.
    pub fn restrict_to_shard(&mut self, shard: ShardId, rule: &str) {
        self.nodes
            .retain(|node| !matches!(node, PlanNode::Distribute(_)));
        self.modify_node_mut().restricted_to = Some(shard);
        self.applied_rules.push(rule.to_string());
    }

    /// Drop the Distribute node; each row is applied where it was enumerated.
    pub fn elide_distribute(&mut self, rule: &str) {
        self.nodes
            .retain(|node| !matches!(node, PlanNode::Distribute(_)));
        self.modify_node_mut().shard_local = true;
        self.applied_rules.push(rule.to_string());
    }

    pub fn explain(&self) -> PlanExplanation {
        PlanExplanation {
            nodes: self.nodes.iter().map(|n| n.type_name().to_string()).collect(),
            applied_rules: self.applied_rules.clone(),
        }
    }
}
