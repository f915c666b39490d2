use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

pub mod args;
pub mod client;
pub mod near;
pub mod networks;
pub mod provider;

pub use client::NearRpcClient;
pub use near::NearEngine;
pub use networks::{network_config, NetworkConfig, NETWORKS};
pub use provider::{NearProvider, ReadOnlyProvider};

pub type BlockHeight = u64;

/// A block as seen by the indexer. Heights the chain skipped carry no hash
/// and no transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub height: BlockHeight,
    pub hash: Option<String>,
    pub parent_hash: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn skipped(height: BlockHeight) -> Self {
        Self {
            height,
            hash: None,
            parent_hash: None,
            timestamp: None,
            transactions: Vec::new(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.hash.is_none()
    }
}

/// An engine transaction, in execution order within its block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// keccak256 of the EVM payload.
    pub hash: B256,
    pub near_hash: String,
    pub signer_id: String,
    pub method: String,
    pub input: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewCall {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("engine call timed out after {0:?}")]
    Timeout(Duration),
    #[error("NEAR RPC error: {0}")]
    Rpc(String),
    #[error("unknown block")]
    UnknownBlock,
    #[error("malformed engine response: {0}")]
    Decode(String),
    #[error("execution reverted")]
    Reverted(Vec<u8>),
    #[error("{0}")]
    Execution(String),
    #[error("transaction {index} not found in block {height}")]
    TransactionNotFound { height: BlockHeight, index: usize },
    #[error("relayer is in read-only mode: no signer account configured")]
    ReadOnly,
    #[error("signer error: {0}")]
    Signer(String),
}

impl EngineError {
    /// Errors worth retrying: the engine may answer differently next time.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Transport(_)
                | EngineError::Timeout(_)
                | EngineError::Rpc(_)
                | EngineError::UnknownBlock
        )
    }
}

/// Read access to the EVM engine contract and the chain hosting it.
#[async_trait]
pub trait Engine: Send + Sync {
    fn network(&self) -> &'static NetworkConfig;

    fn contract_id(&self) -> &str;

    async fn latest_height(&self) -> Result<BlockHeight, EngineError>;

    /// `Ok(None)` means the chain has not produced `height` yet.
    async fn get_block(&self, height: BlockHeight) -> Result<Option<Block>, EngineError>;

    async fn get_transaction(
        &self,
        height: BlockHeight,
        index: usize,
    ) -> Result<Transaction, EngineError> {
        let block = self
            .get_block(height)
            .await?
            .ok_or(EngineError::TransactionNotFound { height, index })?;
        block
            .transactions
            .into_iter()
            .nth(index)
            .ok_or(EngineError::TransactionNotFound { height, index })
    }

    async fn get_balance(&self, address: Address) -> Result<U256, EngineError>;

    async fn get_nonce(&self, address: Address) -> Result<U256, EngineError>;

    async fn get_code(&self, address: Address) -> Result<Vec<u8>, EngineError>;

    async fn get_storage_at(&self, address: Address, key: B256) -> Result<B256, EngineError>;

    async fn view(&self, call: ViewCall) -> Result<Vec<u8>, EngineError>;
}

/// Signs and submits NEAR function calls on behalf of the relayer account.
#[async_trait]
pub trait Provider: Send + Sync {
    fn account_id(&self) -> Option<&str>;

    async fn function_call(
        &self,
        contract_id: &str,
        method: &str,
        args: Vec<u8>,
        gas: u64,
        deposit: u128,
    ) -> Result<serde_json::Value, EngineError>;
}
