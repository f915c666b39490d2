use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tokio_retry::RetryIf;
use tracing::{debug, error, info, warn};

use super::retry::RetryPolicy;
use crate::db::{IndexStore, StoreError};
use crate::engine::{Block, BlockHeight, Engine, EngineError};
use crate::metrics::{record_block_indexed, record_fetch_retry, record_persist_retry};

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("failed to fetch block {height}: {source}")]
    Fetch {
        height: BlockHeight,
        #[source]
        source: EngineError,
    },
    #[error("failed to persist block {height}: {source}")]
    Persist {
        height: BlockHeight,
        #[source]
        source: StoreError,
    },
    #[error("failed to read the indexer cursor: {0}")]
    Cursor(#[source] StoreError),
    #[error("engine returned block {got} when asked for {expected}")]
    HeightMismatch { expected: BlockHeight, got: BlockHeight },
}

/// Walks the chain one height at a time: fetch, persist, advance.
pub struct BlockIndexer {
    engine: Arc<dyn Engine>,
    store: Arc<dyn IndexStore>,
    policy: RetryPolicy,
    start_height: BlockHeight,
}

impl BlockIndexer {
    pub fn new(
        engine: Arc<dyn Engine>,
        store: Arc<dyn IndexStore>,
        policy: RetryPolicy,
        start_height: BlockHeight,
    ) -> Self {
        Self {
            engine,
            store,
            policy,
            start_height,
        }
    }

    /// The persisted cursor, or the configured start height on a fresh index.
    pub async fn start_cursor(&self) -> Result<BlockHeight, IndexerError> {
        let stored = self.store.get_cursor().await.map_err(IndexerError::Cursor)?;
        Ok(stored.unwrap_or(self.start_height))
    }

    /// Waits for `height` and retries transient failures; any other engine error is fatal.
    pub async fn fetch_block(&self, height: BlockHeight) -> Result<Block, IndexerError> {
        let mut backoff = self.policy.backoff();
        loop {
            match timeout(self.policy.call_timeout, self.engine.get_block(height)).await {
                Ok(Ok(Some(block))) => return Ok(block),
                Ok(Ok(None)) => {
                    debug!("Block {} not produced yet; polling again", height);
                    backoff = self.policy.backoff();
                    sleep(self.policy.poll_interval).await;
                    continue;
                }
                Ok(Err(e)) if !e.is_transient() => {
                    return Err(IndexerError::Fetch { height, source: e });
                }
                Ok(Err(e)) => warn!("Failed to fetch block {}: {}", height, e),
                Err(_) => warn!(
                    "Fetching block {} timed out after {:?}",
                    height, self.policy.call_timeout
                ),
            }
            record_fetch_retry();
            let delay = backoff.next().unwrap_or(self.policy.max_backoff);
            sleep(delay).await;
        }
    }

    /// Commits the block with bounded retries. Invariant violations are not retried.
    pub async fn persist(&self, block: &Block) -> Result<(), IndexerError> {
        let retries = self
            .policy
            .backoff()
            .take(self.policy.max_persist_attempts.saturating_sub(1));
        let store = &self.store;
        let limit = self.policy.persist_timeout;

        RetryIf::spawn(
            retries,
            || async move {
                let result = match timeout(limit, store.commit_block(block)).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::Timeout(limit)),
                };
                if let Err(e) = &result {
                    warn!("Persisting block {} failed: {}", block.height, e);
                    if !e.is_fatal() {
                        record_persist_retry();
                    }
                }
                result
            },
            |e: &StoreError| !e.is_fatal(),
        )
        .await
        .map_err(|source| IndexerError::Persist {
            height: block.height,
            source,
        })
    }

    /// Indexes exactly `cursor` and returns the next cursor.
    pub async fn step(&self, cursor: BlockHeight) -> Result<BlockHeight, IndexerError> {
        let started = Instant::now();
        let block = self.fetch_block(cursor).await?;
        self.commit(cursor, block, started).await
    }

    async fn commit(
        &self,
        cursor: BlockHeight,
        block: Block,
        started: Instant,
    ) -> Result<BlockHeight, IndexerError> {
        if block.height != cursor {
            return Err(IndexerError::HeightMismatch {
                expected: cursor,
                got: block.height,
            });
        }
        self.persist(&block).await?;

        if block.transactions.is_empty() {
            debug!("Indexed block {} (empty)", cursor);
        } else {
            info!(
                "📦 Indexed block {} ({} transactions)",
                cursor,
                block.transactions.len()
            );
        }
        record_block_indexed(cursor, block.transactions.len(), started.elapsed());
        Ok(cursor + 1)
    }

    /// Runs until `shutdown` flips to true or a fatal error occurs. A commit in
    /// progress is always finished before shutting down.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<BlockHeight, IndexerError> {
        let mut cursor = self.start_cursor().await?;
        info!("🚀 Indexer starting at height {}", cursor);

        loop {
            if *shutdown.borrow() {
                break;
            }
            let started = Instant::now();
            let fetched = tokio::select! {
                fetched = self.fetch_block(cursor) => fetched,
                _ = shutdown.changed() => break,
            };
            let outcome = match fetched {
                Ok(block) => self.commit(cursor, block, started).await,
                Err(e) => Err(e),
            };
            cursor = match outcome {
                Ok(next) => next,
                Err(e) => {
                    error!("❌ Indexer stopped at height {}: {}", cursor, e);
                    return Err(e);
                }
            };
        }

        info!("🛑 Indexer stopped; next height {}", cursor);
        Ok(cursor)
    }
}
