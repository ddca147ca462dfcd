//! An embedded, sharded, in-memory document store centered on its
//! data-modification pipeline: INSERT/UPDATE/REPLACE/REMOVE statements are
//! normalized, planned, rewritten by routing-only optimization rules and
//! executed per document across the collection's shards.
//!
//! ```
//! use docshard::{CollectionOptions, Database, Expr, ModifyStatement};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let db = Database::new();
//! db.create_collection("users", CollectionOptions::with_shards(5))
//!     .await
//!     .unwrap();
//!
//! let outcome = db
//!     .execute(ModifyStatement::insert(
//!         "users",
//!         Expr::literal(json!({ "_key": "alice", "age": 31 })),
//!     ))
//!     .await
//!     .unwrap();
//! assert_eq!(outcome.stats.writes_executed, 1);
//!
//! let removed = db
//!     .execute(ModifyStatement::remove("users", Expr::path("_key")).for_collection("users"))
//!     .await
//!     .unwrap();
//! assert_eq!(removed.stats.writes_executed, 1);
//! # });
//! ```

pub mod cluster;
pub mod core;
pub mod executor;
pub mod facade;
pub mod planner;
pub mod statement;
pub mod storage;

pub use cluster::{
    AttributePath, CollectionInfo, CollectionOptions, ShardId, ShardTransport,
};
pub use crate::core::{DbError, Document, Result};
pub use executor::{ModificationOutcome, StatementExecutor, WriteStats};
pub use facade::Database;
pub use planner::{ModificationPlan, PlanExplanation, RoutingMode};
pub use statement::{Expr, ModifyStatement, ReturnMode, StatementOptions};
pub use storage::InMemoryCluster;
