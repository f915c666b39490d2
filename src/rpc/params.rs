use alloy_primitives::{Address, B256, U256};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::str::FromStr;

use super::error::RpcError;
use crate::utils::{decode_hex, encode_hex};

/// Positional request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Value>);

/// Block selector accepted by the `eth_*` methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Earliest,
    Pending,
    Safe,
    Finalized,
    Number(u64),
}

impl FromStr for BlockTag {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(BlockTag::Latest),
            "earliest" => Ok(BlockTag::Earliest),
            "pending" => Ok(BlockTag::Pending),
            "safe" => Ok(BlockTag::Safe),
            "finalized" => Ok(BlockTag::Finalized),
            other => parse_quantity(other).map(BlockTag::Number),
        }
    }
}

impl Params {
    /// Absent or null params are an empty list; anything but an array is rejected.
    pub fn from_value(value: Value) -> Result<Self, RpcError> {
        match value {
            Value::Null => Ok(Params(Vec::new())),
            Value::Array(items) => Ok(Params(items)),
            _ => Err(RpcError::invalid_params("params must be an array")),
        }
    }

    pub fn new(items: Vec<Value>) -> Self {
        Params(items)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index).filter(|v| !v.is_null())
    }

    pub fn required<T: DeserializeOwned>(&self, index: usize) -> Result<T, RpcError> {
        let value = self
            .get(index)
            .ok_or_else(|| RpcError::invalid_params(format!("missing value for required argument {}", index)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| RpcError::invalid_params(format!("argument {}: {}", index, e)))
    }

    pub fn optional<T: DeserializeOwned>(&self, index: usize) -> Result<Option<T>, RpcError> {
        match self.get(index) {
            None => Ok(None),
            Some(_) => self.required(index).map(Some),
        }
    }

    fn string(&self, index: usize) -> Result<String, RpcError> {
        self.required::<String>(index)
    }

    pub fn address(&self, index: usize) -> Result<Address, RpcError> {
        let raw = self.string(index)?;
        Address::from_str(&raw)
            .map_err(|_| RpcError::invalid_params(format!("argument {}: invalid address `{}`", index, raw)))
    }

    pub fn optional_address(&self, index: usize) -> Result<Option<Address>, RpcError> {
        match self.get(index) {
            None => Ok(None),
            Some(_) => self.address(index).map(Some),
        }
    }

    pub fn bytes(&self, index: usize) -> Result<Vec<u8>, RpcError> {
        let raw = self.string(index)?;
        decode_hex(&raw)
            .map_err(|_| RpcError::invalid_params(format!("argument {}: invalid hex data", index)))
    }

    pub fn b256(&self, index: usize) -> Result<B256, RpcError> {
        let quantity = self.quantity(index)?;
        Ok(B256::from(quantity))
    }

    pub fn quantity(&self, index: usize) -> Result<U256, RpcError> {
        let raw = self.string(index)?;
        let digits = raw
            .strip_prefix("0x")
            .ok_or_else(|| RpcError::invalid_params(format!("argument {}: quantity must be 0x-prefixed", index)))?;
        U256::from_str_radix(digits, 16)
            .map_err(|_| RpcError::invalid_params(format!("argument {}: invalid quantity `{}`", index, raw)))
    }

    pub fn block_tag(&self, index: usize) -> Result<BlockTag, RpcError> {
        match self.get(index) {
            None => Ok(BlockTag::Latest),
            Some(Value::String(s)) => s.parse(),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(BlockTag::Number)
                .ok_or_else(|| RpcError::invalid_params(format!("argument {}: invalid block number", index))),
            Some(_) => Err(RpcError::invalid_params(format!("argument {}: invalid block tag", index))),
        }
    }
}

pub fn parse_quantity(raw: &str) -> Result<u64, RpcError> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::invalid_params(format!("invalid block tag `{}`", raw)))?;
    u64::from_str_radix(digits, 16).map_err(|_| RpcError::invalid_params(format!("invalid quantity `{}`", raw)))
}

pub fn hex_quantity<T>(value: T) -> Value
where
    U256: alloy_primitives::ruint::UintTryFrom<T>,
{
    Value::String(format!("0x{:x}", U256::from(value)))
}

pub fn hex_data(bytes: impl AsRef<[u8]>) -> Value {
    Value::String(encode_hex(bytes))
}
