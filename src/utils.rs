use chrono::{DateTime, Utc};
use thiserror::Error;

/// Convert a NEAR block timestamp (nanoseconds since Unix epoch) to DateTime<Utc>
pub fn convert_near_timestamp(timestamp_nanoseconds: u64) -> DateTime<Utc> {
    let seconds = (timestamp_nanoseconds / 1_000_000_000) as i64;
    let nanos = (timestamp_nanoseconds % 1_000_000_000) as u32;

    DateTime::from_timestamp(seconds, nanos).unwrap_or_else(Utc::now)
}

/// NEAR hashes are base58; Ethereum clients expect 0x-prefixed hex.
pub fn near_hash_to_hex(hash: &str) -> Option<String> {
    let bytes = bs58::decode(hash).into_vec().ok()?;
    Some(format!("0x{}", hex::encode(bytes)))
}

pub fn encode_hex(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[derive(Error, Debug, PartialEq)]
pub enum HexError {
    #[error("hex data must start with 0x")]
    MissingPrefix,
    #[error("hex data must have an even number of digits")]
    OddLength,
    #[error(transparent)]
    Invalid(#[from] hex::FromHexError),
}

/// Decodes `0x`-prefixed, even-length hex data (`0x` alone is empty).
pub fn decode_hex(value: &str) -> Result<Vec<u8>, HexError> {
    let digits = value.strip_prefix("0x").ok_or(HexError::MissingPrefix)?;
    if digits.len() % 2 == 1 {
        return Err(HexError::OddLength);
    }
    Ok(hex::decode(digits)?)
}
