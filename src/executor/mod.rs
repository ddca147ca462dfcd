pub mod dispatch;
pub mod shard;
pub mod stats;

pub use dispatch::StatementExecutor;
pub use stats::{ModificationOutcome, WriteStats};
