use serde::Serialize;
use serde_json::Value;

use crate::cluster::ShardOutcome;

/// Auditable per-statement write counts. Plan rewrites change routing only,
/// so these are identical for every rewrite variant of the same statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    /// Successful per-document operations.
    #[serde(rename = "writesExecuted")]
    pub writes_executed: u64,
    /// Failed-but-tolerated per-document operations.
    #[serde(rename = "writesIgnored")]
    pub writes_ignored: u64,
}

impl WriteStats {
    pub fn new(writes_executed: u64, writes_ignored: u64) -> Self {
        Self {
            writes_executed,
            writes_ignored,
        }
    }

    /// Fold one shard's result in. Commutative and associative: shard
    /// completion order never changes the totals.
    pub fn absorb(&mut self, outcome: &ShardOutcome) {
        self.writes_executed += outcome.executed;
        self.writes_ignored += outcome.ignored;
    }
}

/// The statement result handed back to the caller: OLD/NEW projections (in
/// shard-arrival order, unordered across shards) plus the write counts.
/// Internal bookkeeping (scan counts, timing) is already discarded.
#[derive(Debug, Clone, Default)]
pub struct ModificationOutcome {
    pub returned: Vec<Value>,
    pub stats: WriteStats,
}
