pub mod cluster;
pub mod shard;

pub use cluster::InMemoryCluster;
pub use shard::ShardStore;
