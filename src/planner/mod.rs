pub mod builder;
pub mod plan;
pub mod rewrite;

pub use builder::PlanBuilder;
pub use plan::{
    ModificationPlan, ModifyNode, PlanExplanation, PlanNode, RoutingMode,
};
pub use rewrite::RewritePass;
