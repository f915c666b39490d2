use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use borsh::BorshDeserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::args::{GetStorageAtArgs, TransactionStatus, ViewCallArgs};
use super::{
    Block, BlockHeight, Engine, EngineError, NearRpcClient, NetworkConfig, Transaction, ViewCall,
};
use crate::utils::convert_near_timestamp;

/// Contract methods whose calls carry an EVM payload worth indexing.
const ENGINE_METHODS: &[&str] = &["submit", "call", "deploy_code", "meta_call"];

/// Engine facade backed by a NEAR node's JSON-RPC interface.
pub struct NearEngine {
    rpc: NearRpcClient,
    network: &'static NetworkConfig,
    contract_id: String,
}

impl NearEngine {
    pub fn new(rpc: NearRpcClient, network: &'static NetworkConfig, contract_id: String) -> Self {
        Self {
            rpc,
            network,
            contract_id,
        }
    }

    pub fn rpc(&self) -> &NearRpcClient {
        &self.rpc
    }

    async fn call_view(&self, method: &str, args: Vec<u8>) -> Result<Vec<u8>, EngineError> {
        let result = self
            .rpc
            .call(
                "query",
                json!({
                    "request_type": "call_function",
                    "finality": "final",
                    "account_id": self.contract_id,
                    "method_name": method,
                    "args_base64": BASE64.encode(args),
                }),
            )
            .await?;

        if let Some(err) = result.get("error").and_then(Value::as_str) {
            return Err(EngineError::Execution(err.to_string()));
        }

        let bytes = result
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| EngineError::Decode(format!("{} returned no result bytes", method)))?;
        bytes
            .iter()
            .map(|b| {
                b.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| EngineError::Decode(format!("{} returned a non-byte", method)))
            })
            .collect()
    }

    async fn fetch_chunk_transactions(
        &self,
        chunk_hash: &str,
    ) -> Result<Vec<Transaction>, EngineError> {
        let chunk = self
            .rpc
            .call("chunk", json!({ "chunk_id": chunk_hash }))
            .await?;
        let txs = chunk
            .get("transactions")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut found = Vec::new();
        for tx in &txs {
            if tx.get("receiver_id").and_then(Value::as_str) != Some(self.contract_id.as_str()) {
                continue;
            }
            let near_hash = str_field(tx, "hash")?;
            let signer_id = str_field(tx, "signer_id")?;
            let actions = tx
                .get("actions")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            for action in &actions {
                let Some(call) = action.get("FunctionCall") else {
                    continue;
                };
                let method = str_field(call, "method_name")?;
                if !ENGINE_METHODS.contains(&method.as_str()) {
                    continue;
                }
                let input = BASE64
                    .decode(call.get("args").and_then(Value::as_str).unwrap_or_default())
                    .map_err(|e| EngineError::Decode(format!("transaction {}: {}", near_hash, e)))?;
                found.push(Transaction {
                    hash: keccak256(&input),
                    near_hash: near_hash.clone(),
                    signer_id: signer_id.clone(),
                    method,
                    input,
                });
            }
        }
        Ok(found)
    }
}

fn str_field(value: &Value, key: &str) -> Result<String, EngineError> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| EngineError::Decode(format!("missing field `{}`", key)))
}

fn word(bytes: &[u8], what: &str) -> Result<[u8; 32], EngineError> {
    bytes
        .try_into()
        .map_err(|_| EngineError::Decode(format!("{} is {} bytes, expected 32", what, bytes.len())))
}

#[async_trait]
impl Engine for NearEngine {
    fn network(&self) -> &'static NetworkConfig {
        self.network
    }

    fn contract_id(&self) -> &str {
        &self.contract_id
    }

    async fn latest_height(&self) -> Result<BlockHeight, EngineError> {
        let block = self.rpc.call("block", json!({ "finality": "final" })).await?;
        block
            .pointer("/header/height")
            .and_then(Value::as_u64)
            .ok_or_else(|| EngineError::Decode("block header has no height".to_string()))
    }

    async fn get_block(&self, height: BlockHeight) -> Result<Option<Block>, EngineError> {
        let block = match self.rpc.call("block", json!({ "block_id": height })).await {
            Ok(block) => block,
            Err(EngineError::UnknownBlock) => {
                // NEAR skips heights; anything below the final head will never appear.
                let head = self.latest_height().await?;
                if height < head {
                    debug!("Height {} was skipped by the chain", height);
                    return Ok(Some(Block::skipped(height)));
                }
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let header = block
            .get("header")
            .ok_or_else(|| EngineError::Decode(format!("block {} has no header", height)))?;
        let timestamp = header
            .get("timestamp")
            .and_then(Value::as_u64)
            .map(convert_near_timestamp);

        let mut transactions = Vec::new();
        let chunks = block
            .get("chunks")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        for chunk in &chunks {
            if chunk.get("height_included").and_then(Value::as_u64) != Some(height) {
                continue;
            }
            let chunk_hash = str_field(chunk, "chunk_hash")?;
            match self.fetch_chunk_transactions(&chunk_hash).await {
                Ok(mut txs) => transactions.append(&mut txs),
                Err(e) => {
                    warn!("Failed to fetch chunk {} of block {}: {}", chunk_hash, height, e);
                    return Err(e);
                }
            }
        }

        Ok(Some(Block {
            height,
            hash: Some(str_field(header, "hash")?),
            parent_hash: header
                .get("prev_hash")
                .and_then(Value::as_str)
                .map(str::to_string),
            timestamp,
            transactions,
        }))
    }

    async fn get_balance(&self, address: Address) -> Result<U256, EngineError> {
        let bytes = self.call_view("get_balance", address.to_vec()).await?;
        Ok(U256::from_be_bytes(word(&bytes, "balance")?))
    }

    async fn get_nonce(&self, address: Address) -> Result<U256, EngineError> {
        let bytes = self.call_view("get_nonce", address.to_vec()).await?;
        Ok(U256::from_be_bytes(word(&bytes, "nonce")?))
    }

    async fn get_code(&self, address: Address) -> Result<Vec<u8>, EngineError> {
        self.call_view("get_code", address.to_vec()).await
    }

    async fn get_storage_at(&self, address: Address, key: B256) -> Result<B256, EngineError> {
        let args = GetStorageAtArgs {
            address: address.into_array(),
            key: key.0,
        };
        let args = borsh::to_vec(&args).map_err(|e| EngineError::Decode(e.to_string()))?;
        let bytes = self.call_view("get_storage_at", args).await?;
        Ok(B256::from(word(&bytes, "storage value")?))
    }

    async fn view(&self, call: ViewCall) -> Result<Vec<u8>, EngineError> {
        let args = ViewCallArgs {
            sender: call.from.into_array(),
            address: call.to.into_array(),
            amount: call.value.to_be_bytes(),
            input: call.data,
        };
        let args = borsh::to_vec(&args).map_err(|e| EngineError::Decode(e.to_string()))?;
        let bytes = self.call_view("view", args).await?;
        let status = TransactionStatus::try_from_slice(&bytes)
            .map_err(|e| EngineError::Decode(format!("view status: {}", e)))?;
        match status {
            TransactionStatus::Succeed(output) => Ok(output),
            TransactionStatus::Revert(output) => Err(EngineError::Reverted(output)),
            TransactionStatus::OutOfGas => Err(EngineError::Execution("out of gas".into())),
            TransactionStatus::OutOfFund => Err(EngineError::Execution("out of fund".into())),
            TransactionStatus::OutOfOffset => Err(EngineError::Execution("out of offset".into())),
            TransactionStatus::CallTooDeep => Err(EngineError::Execution("call too deep".into())),
        }
    }
}
