use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::engine::{Block, BlockHeight, Transaction};

#[cfg(test)]
pub mod memory;
pub mod models;
pub mod schema;
pub mod store;

pub use store::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("cursor mismatch: committing height {expected} but stored cursor is {found}")]
    CursorMismatch { expected: BlockHeight, found: BlockHeight },
    #[error("value {0} does not fit the database column")]
    Overflow(u64),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("commit did not finish within {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Invariant violations; retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::CursorMismatch { .. } | StoreError::Overflow(_))
    }
}

/// A stored cursor of `height` (not yet committed) or `height + 1` (already
/// committed) allows committing `height`; anything else is a gap or rewind.
pub fn check_cursor(stored: Option<BlockHeight>, height: BlockHeight) -> Result<(), StoreError> {
    match stored {
        None => Ok(()),
        Some(next) if next == height || Some(next) == height.checked_add(1) => Ok(()),
        Some(found) => Err(StoreError::CursorMismatch {
            expected: height,
            found,
        }),
    }
}

/// Persistent index of blocks and engine transactions.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Next height to index, if any height was ever committed.
    async fn get_cursor(&self) -> Result<Option<BlockHeight>, StoreError>;

    async fn set_cursor(&self, next: BlockHeight) -> Result<(), StoreError>;

    async fn upsert_block(&self, block: &Block) -> Result<(), StoreError>;

    async fn upsert_transaction(
        &self,
        height: BlockHeight,
        index: usize,
        transaction: &Transaction,
    ) -> Result<(), StoreError>;

    /// Writes a block and its transactions in order, drops rows left over from an
    /// earlier commit of the same height, then advances the cursor. Atomic.
    async fn commit_block(&self, block: &Block) -> Result<(), StoreError>;
}
