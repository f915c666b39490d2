//! EIP-712 (v4) typed-data hashing and secp256k1 signer recovery.

use alloy_primitives::{Address, PrimitiveSignature, B256};
use thiserror::Error;

use crate::utils::decode_hex;

pub use alloy_dyn_abi::TypedData;

#[derive(Error, Debug)]
pub enum Eip712Error {
    #[error("typed data: {0}")]
    TypedData(#[from] alloy_dyn_abi::Error),
    #[error("missing value for field `{0}`")]
    MissingValue(String),
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

/// Parses a 65-byte `r ‖ s ‖ v` hex signature; `v` may be 0/1 or 27/28.
pub fn parse_signature(raw: &str) -> Result<PrimitiveSignature, Eip712Error> {
    let bytes = decode_hex(raw).map_err(|e| Eip712Error::InvalidSignature(e.to_string()))?;
    PrimitiveSignature::from_raw(&bytes).map_err(|e| Eip712Error::InvalidSignature(e.to_string()))
}

/// `keccak256(0x19 0x01 ‖ domainSeparator ‖ hashStruct(message))`
pub fn signing_hash(data: &TypedData) -> Result<B256, Eip712Error> {
    Ok(data.eip712_signing_hash()?)
}

/// Recovers the address that signed `data`. High-S signatures are normalised first.
pub fn recover_signer(data: &TypedData, signature: &PrimitiveSignature) -> Result<Address, Eip712Error> {
    signature
        .recover_address_from_prehash(&signing_hash(data)?)
        .map_err(|e| Eip712Error::InvalidSignature(e.to_string()))
}
