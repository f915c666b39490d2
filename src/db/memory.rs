use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{check_cursor, IndexStore, StoreError};
use crate::engine::{Block, BlockHeight, Transaction};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Block(BlockHeight),
    Transaction(BlockHeight, usize),
    Cursor(BlockHeight),
}

#[derive(Debug, Default)]
struct MemoryState {
    cursor: Option<BlockHeight>,
    blocks: BTreeMap<BlockHeight, Block>,
    transactions: BTreeMap<(BlockHeight, usize), Transaction>,
    events: Vec<StoreEvent>,
    failing_commits: usize,
    stalled_commits: usize,
    commit_attempts: usize,
}

/// In-memory `IndexStore` with failure injection and a write log.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cursor(next: BlockHeight) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().cursor = Some(next);
        store
    }

    /// The next `n` commits fail with a retryable backend error.
    pub fn fail_next_commits(&self, n: usize) {
        self.state.lock().unwrap().failing_commits = n;
    }

    /// The next `n` commits never complete.
    pub fn stall_next_commits(&self, n: usize) {
        self.state.lock().unwrap().stalled_commits = n;
    }

    pub fn cursor(&self) -> Option<BlockHeight> {
        self.state.lock().unwrap().cursor
    }

    pub fn block_heights(&self) -> Vec<BlockHeight> {
        self.state.lock().unwrap().blocks.keys().copied().collect()
    }

    pub fn transaction_keys(&self) -> Vec<(BlockHeight, usize)> {
        self.state.lock().unwrap().transactions.keys().copied().collect()
    }

    pub fn transaction(&self, height: BlockHeight, index: usize) -> Option<Transaction> {
        self.state.lock().unwrap().transactions.get(&(height, index)).cloned()
    }

    pub fn events(&self) -> Vec<StoreEvent> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn commit_attempts(&self) -> usize {
        self.state.lock().unwrap().commit_attempts
    }
}

impl MemoryState {
    fn upsert_block(&mut self, block: &Block) {
        let mut stored = block.clone();
        stored.transactions.clear();
        self.blocks.insert(block.height, stored);
        self.events.push(StoreEvent::Block(block.height));
    }

    fn upsert_transaction(&mut self, height: BlockHeight, index: usize, tx: &Transaction) {
        self.transactions.insert((height, index), tx.clone());
        self.events.push(StoreEvent::Transaction(height, index));
    }

    fn prune_transactions(&mut self, height: BlockHeight, len: usize) {
        self.transactions
            .retain(|&(h, index), _| h != height || index < len);
    }

    fn set_cursor(&mut self, next: BlockHeight) {
        self.cursor = Some(next);
        self.events.push(StoreEvent::Cursor(next));
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn get_cursor(&self) -> Result<Option<BlockHeight>, StoreError> {
        Ok(self.cursor())
    }

    async fn set_cursor(&self, next: BlockHeight) -> Result<(), StoreError> {
        self.state.lock().unwrap().set_cursor(next);
        Ok(())
    }

    async fn upsert_block(&self, block: &Block) -> Result<(), StoreError> {
        self.state.lock().unwrap().upsert_block(block);
        Ok(())
    }

    async fn upsert_transaction(
        &self,
        height: BlockHeight,
        index: usize,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .unwrap()
            .upsert_transaction(height, index, transaction);
        Ok(())
    }

    // Applied under one lock so a failed commit leaves no partial writes.
    async fn commit_block(&self, block: &Block) -> Result<(), StoreError> {
        let stalled = {
            let mut state = self.state.lock().unwrap();
            state.commit_attempts += 1;
            let stalled = state.stalled_commits > 0;
            if stalled {
                state.stalled_commits -= 1;
            }
            stalled
        };
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock().unwrap();
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        check_cursor(state.cursor, block.height)?;
        let next = block
            .height
            .checked_add(1)
            .ok_or(StoreError::Overflow(block.height))?;

        state.upsert_block(block);
        for (index, tx) in block.transactions.iter().enumerate() {
            state.upsert_transaction(block.height, index, tx);
        }
        state.prune_transactions(block.height, block.transactions.len());
        state.set_cursor(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::sample_block;

    #[tokio::test]
    async fn recommit_with_fewer_transactions_drops_stale_rows() {
        let store = MemoryStore::new();
        store.commit_block(&sample_block(4, 3)).await.unwrap();
        assert_eq!(store.transaction_keys(), vec![(4, 0), (4, 1), (4, 2)]);

        store.commit_block(&sample_block(4, 1)).await.unwrap();
        assert_eq!(store.transaction_keys(), vec![(4, 0)]);
        assert_eq!(store.cursor(), Some(5));
    }

    #[tokio::test]
    async fn recommit_leaves_other_heights_alone() {
        let store = MemoryStore::new();
        store.commit_block(&sample_block(4, 2)).await.unwrap();
        store.commit_block(&sample_block(5, 2)).await.unwrap();

        // height 5 is committed, so cursor 6 still admits a rewrite of 5 only
        store.commit_block(&sample_block(5, 0)).await.unwrap();
        assert_eq!(store.transaction_keys(), vec![(4, 0), (4, 1)]);
        assert_eq!(store.block_heights(), vec![4, 5]);
    }
}
