pub mod ast;
pub mod normalize;

pub use ast::{
    EnumerationSource, Expr, ModifyStatement, OperationKind, ReturnMode, StatementOptions,
};
pub use normalize::{NormalizedStatement, StatementNormalizer};
