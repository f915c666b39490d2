pub mod block_indexer;
pub mod retry;

pub use block_indexer::{BlockIndexer, IndexerError};
pub use retry::RetryPolicy;
