pub mod topology;
pub mod transport;

pub use topology::{AttributePath, CollectionInfo, CollectionOptions, ShardId};
pub use transport::{PreparedWrite, ShardBatch, ShardOutcome, ShardTransport};
