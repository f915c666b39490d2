use alloy_primitives::{keccak256, Address, U256};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use tracing::{debug, info};

use super::context::ServerContext;
use super::error::{RpcError, RpcResult};
use super::params::{hex_data, hex_quantity, BlockTag, Params};
use crate::engine::{Block, BlockHeight, Transaction, ViewCall};
use crate::utils::{decode_hex, encode_hex, near_hash_to_hex};

pub const PROTOCOL_VERSION: &str = "0x41";
pub const GAS_PRICE: &str = "0x0";
pub const ESTIMATED_GAS: &str = "0x6691b7";
/// Gas attached to `submit` calls (300 Tgas).
pub const SUBMIT_GAS: u64 = 300_000_000_000_000;

const ZERO_HASH: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

pub async fn web3_client_version(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(json!(format!("Aurora-Relayer/{}", env!("CARGO_PKG_VERSION"))))
}

pub async fn web3_sha3(_ctx: ServerContext, params: Params) -> RpcResult {
    let data = params.bytes(0)?;
    Ok(hex_data(keccak256(data)))
}

pub async fn net_version(ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(json!(ctx.network.chain_id.to_string()))
}

pub async fn net_listening(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(json!(true))
}

pub async fn net_peer_count(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(hex_quantity(0u64))
}

pub async fn eth_chain_id(ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(hex_quantity(ctx.network.chain_id))
}

pub async fn eth_protocol_version(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(json!(PROTOCOL_VERSION))
}

pub async fn eth_syncing(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(json!(false))
}

pub async fn eth_mining(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(json!(false))
}

pub async fn eth_hashrate(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(hex_quantity(0u64))
}

pub async fn eth_gas_price(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(json!(GAS_PRICE))
}

pub async fn eth_accounts(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(json!([]))
}

pub async fn eth_coinbase(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(json!(Address::ZERO.to_string()))
}

pub async fn eth_block_number(ctx: ServerContext, _params: Params) -> RpcResult {
    let height = ctx.engine.latest_height().await?;
    Ok(hex_quantity(height))
}

// State reads always go against the final head; the block tag is validated only.

pub async fn eth_get_balance(ctx: ServerContext, params: Params) -> RpcResult {
    let address = params.address(0)?;
    params.block_tag(1)?;
    let balance = ctx.engine.get_balance(address).await?;
    Ok(hex_quantity(balance))
}

pub async fn eth_get_transaction_count(ctx: ServerContext, params: Params) -> RpcResult {
    let address = params.address(0)?;
    params.block_tag(1)?;
    let nonce = ctx.engine.get_nonce(address).await?;
    Ok(hex_quantity(nonce))
}

pub async fn eth_get_code(ctx: ServerContext, params: Params) -> RpcResult {
    let address = params.address(0)?;
    params.block_tag(1)?;
    let code = ctx.engine.get_code(address).await?;
    Ok(hex_data(code))
}

pub async fn eth_get_storage_at(ctx: ServerContext, params: Params) -> RpcResult {
    let address = params.address(0)?;
    let key = params.b256(1)?;
    params.block_tag(2)?;
    let value = ctx.engine.get_storage_at(address, key).await?;
    Ok(hex_data(value))
}

#[derive(Debug, Deserialize)]
struct CallRequest {
    from: Option<String>,
    to: Option<String>,
    value: Option<String>,
    data: Option<String>,
    input: Option<String>,
}

impl CallRequest {
    fn into_view_call(self) -> Result<ViewCall, RpcError> {
        let address = |raw: &str| {
            Address::from_str(raw).map_err(|_| RpcError::invalid_params(format!("invalid address `{}`", raw)))
        };
        let to = self
            .to
            .as_deref()
            .ok_or_else(|| RpcError::invalid_params("call is missing `to`"))
            .and_then(address)?;
        let from = self.from.as_deref().map(address).transpose()?.unwrap_or(Address::ZERO);
        let value = match self.value.as_deref() {
            Some(raw) => {
                let digits = raw.strip_prefix("0x").unwrap_or(raw);
                U256::from_str_radix(digits, 16)
                    .map_err(|_| RpcError::invalid_params(format!("invalid value `{}`", raw)))?
            }
            None => U256::ZERO,
        };
        let data = match self.input.as_deref().or(self.data.as_deref()) {
            Some(raw) => decode_hex(raw).map_err(|_| RpcError::invalid_params("invalid call data"))?,
            None => Vec::new(),
        };
        Ok(ViewCall { from, to, value, data })
    }
}

pub async fn eth_call(ctx: ServerContext, params: Params) -> RpcResult {
    let call: CallRequest = params.required(0)?;
    params.block_tag(1)?;
    let output = ctx.engine.view(call.into_view_call()?).await?;
    Ok(hex_data(output))
}

pub async fn eth_estimate_gas(_ctx: ServerContext, _params: Params) -> RpcResult {
    Ok(json!(ESTIMATED_GAS))
}

async fn resolve_height(ctx: &ServerContext, tag: BlockTag) -> Result<BlockHeight, RpcError> {
    match tag {
        BlockTag::Number(height) => Ok(height),
        BlockTag::Earliest => Ok(0),
        BlockTag::Latest | BlockTag::Pending | BlockTag::Safe | BlockTag::Finalized => {
            Ok(ctx.engine.latest_height().await?)
        }
    }
}

async fn fetch_block(ctx: &ServerContext, tag: BlockTag) -> Result<Option<Block>, RpcError> {
    let height = resolve_height(ctx, tag).await?;
    let block = ctx.engine.get_block(height).await?;
    Ok(block.filter(|b| !b.is_skipped()))
}

fn hex_hash(near_hash: Option<&str>) -> String {
    near_hash
        .and_then(near_hash_to_hex)
        .unwrap_or_else(|| ZERO_HASH.to_string())
}

fn transaction_json(block: &Block, index: usize, tx: &Transaction) -> Value {
    json!({
        "hash": encode_hex(tx.hash),
        "blockHash": hex_hash(block.hash.as_deref()),
        "blockNumber": hex_quantity(block.height),
        "transactionIndex": hex_quantity(index as u64),
        "input": encode_hex(&tx.input),
        "nearTransactionHash": hex_hash(Some(tx.near_hash.as_str())),
        "nearSigner": tx.signer_id,
        "nearMethod": tx.method,
    })
}

fn block_json(block: &Block, full_transactions: bool) -> Value {
    let transactions: Vec<Value> = block
        .transactions
        .iter()
        .enumerate()
        .map(|(index, tx)| {
            if full_transactions {
                transaction_json(block, index, tx)
            } else {
                hex_data(tx.hash)
            }
        })
        .collect();
    let timestamp = block.timestamp.map(|t| t.timestamp().max(0) as u64).unwrap_or(0);

    json!({
        "number": hex_quantity(block.height),
        "hash": hex_hash(block.hash.as_deref()),
        "parentHash": hex_hash(block.parent_hash.as_deref()),
        "nonce": "0x0000000000000000",
        "sha3Uncles": ZERO_HASH,
        "logsBloom": encode_hex([0u8; 256]),
        "transactionsRoot": ZERO_HASH,
        "stateRoot": ZERO_HASH,
        "receiptsRoot": ZERO_HASH,
        "miner": Address::ZERO.to_string(),
        "difficulty": "0x0",
        "totalDifficulty": "0x0",
        "extraData": "0x",
        "size": "0x0",
        "gasLimit": "0x0",
        "gasUsed": "0x0",
        "timestamp": hex_quantity(timestamp),
        "transactions": transactions,
        "uncles": [],
    })
}

pub async fn eth_get_block_by_number(ctx: ServerContext, params: Params) -> RpcResult {
    let tag = params.block_tag(0)?;
    let full = params.optional::<bool>(1)?.unwrap_or(false);
    Ok(fetch_block(&ctx, tag)
        .await?
        .map(|block| block_json(&block, full))
        .unwrap_or(Value::Null))
}

pub async fn eth_get_block_transaction_count_by_number(ctx: ServerContext, params: Params) -> RpcResult {
    let tag = params.block_tag(0)?;
    Ok(fetch_block(&ctx, tag)
        .await?
        .map(|block| hex_quantity(block.transactions.len() as u64))
        .unwrap_or(Value::Null))
}

pub async fn eth_get_transaction_by_block_number_and_index(ctx: ServerContext, params: Params) -> RpcResult {
    let tag = params.block_tag(0)?;
    let index = usize::try_from(params.quantity(1)?)
        .map_err(|_| RpcError::invalid_params("transaction index out of range"))?;
    let block = match fetch_block(&ctx, tag).await? {
        Some(block) => block,
        None => return Ok(Value::Null),
    };
    Ok(block
        .transactions
        .get(index)
        .map(|tx| transaction_json(&block, index, tx))
        .unwrap_or(Value::Null))
}

pub async fn eth_send_raw_transaction(ctx: ServerContext, params: Params) -> RpcResult {
    let raw = params.bytes(0)?;
    if raw.is_empty() {
        return Err(RpcError::invalid_params("empty transaction"));
    }
    let hash = keccak256(&raw);
    if ctx.settings.verbose {
        info!("eth_sendRawTransaction {} ({} bytes)", hash, raw.len());
    }

    let outcome = ctx
        .provider
        .function_call(ctx.engine_id(), "submit", raw, SUBMIT_GAS, 0)
        .await?;
    debug!("submit {} outcome: {}", hash, outcome);
    Ok(hex_data(hash))
}
