use alloy_dyn_abi::DynSolValue;
use alloy_primitives::{Address, PrimitiveSignature, U256};
use alloy_rlp::{BufMut, Encodable, Header};

use super::eip712::Eip712Error;

/// Minimal RLP tree; argument values are encoded by their raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RlpItem {
    Bytes(Vec<u8>),
    List(Vec<RlpItem>),
}

impl RlpItem {
    fn payload_length(items: &[RlpItem]) -> usize {
        items.iter().map(|item| item.length()).sum()
    }
}

impl Encodable for RlpItem {
    fn encode(&self, out: &mut dyn BufMut) {
        match self {
            RlpItem::Bytes(bytes) => bytes.as_slice().encode(out),
            RlpItem::List(items) => {
                Header {
                    list: true,
                    payload_length: Self::payload_length(items),
                }
                .encode(out);
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    fn length(&self) -> usize {
        match self {
            RlpItem::Bytes(bytes) => bytes.as_slice().length(),
            RlpItem::List(items) => {
                let payload = Self::payload_length(items);
                payload + alloy_rlp::length_of_length(payload)
            }
        }
    }
}

fn uint_bytes(value: U256) -> Vec<u8> {
    let bytes: [u8; 32] = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(32);
    bytes[start..].to_vec()
}

/// Looks up a named member of a coerced struct value.
pub fn field<'a>(message: &'a DynSolValue, name: &str) -> Result<&'a DynSolValue, Eip712Error> {
    match message {
        DynSolValue::CustomStruct { prop_names, tuple, .. } => prop_names
            .iter()
            .position(|p| p == name)
            .and_then(|i| tuple.get(i))
            .ok_or_else(|| Eip712Error::MissingValue(name.to_string())),
        _ => Err(invalid(name, "expected a struct")),
    }
}

fn invalid(name: &str, reason: &str) -> Eip712Error {
    Eip712Error::InvalidValue {
        field: name.to_string(),
        reason: reason.to_string(),
    }
}

pub fn address_field(message: &DynSolValue, name: &str) -> Result<Address, Eip712Error> {
    match field(message, name)? {
        DynSolValue::Address(address) => Ok(*address),
        _ => Err(invalid(name, "expected an address")),
    }
}

fn uint_field(message: &DynSolValue, name: &str) -> Result<U256, Eip712Error> {
    match field(message, name)? {
        DynSolValue::Uint(value, _) => Ok(*value),
        _ => Err(invalid(name, "expected an unsigned integer")),
    }
}

fn string_field<'a>(message: &'a DynSolValue, name: &str) -> Result<&'a str, Eip712Error> {
    match field(message, name)? {
        DynSolValue::String(value) => Ok(value.as_str()),
        _ => Err(invalid(name, "expected a string")),
    }
}

/// Converts a typed value into its RLP form; scalars are encoded by their raw bytes.
fn argument_item(value: &DynSolValue) -> Result<RlpItem, Eip712Error> {
    let item = match value {
        DynSolValue::Bool(flag) => RlpItem::Bytes(uint_bytes(U256::from(u8::from(*flag)))),
        DynSolValue::Uint(value, _) => RlpItem::Bytes(uint_bytes(*value)),
        DynSolValue::Int(value, _) => RlpItem::Bytes(uint_bytes(value.into_raw())),
        DynSolValue::Address(address) => RlpItem::Bytes(address.to_vec()),
        DynSolValue::FixedBytes(word, size) => RlpItem::Bytes(word[..*size].to_vec()),
        DynSolValue::Bytes(bytes) => RlpItem::Bytes(bytes.clone()),
        DynSolValue::String(s) => RlpItem::Bytes(s.as_bytes().to_vec()),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) | DynSolValue::Tuple(items) => {
            RlpItem::List(struct_items(items)?)
        }
        DynSolValue::CustomStruct { tuple, .. } => RlpItem::List(struct_items(tuple)?),
        other => {
            return Err(Eip712Error::InvalidValue {
                field: "arguments".to_string(),
                reason: format!("unsupported value {:?}", other),
            })
        }
    };
    Ok(item)
}

fn struct_items(values: &[DynSolValue]) -> Result<Vec<RlpItem>, Eip712Error> {
    values.iter().map(argument_item).collect()
}

/// Encodes the engine's `meta_call` arguments from the coerced message:
/// `v ‖ r ‖ s ‖ rlp([nonce, feeAmount, feeAddress, contractAddress, value, contractMethod, rlp(arguments)])`.
pub fn encode_meta_call(message: &DynSolValue, signature: &PrimitiveSignature) -> Result<Vec<u8>, Eip712Error> {
    let arguments = match field(message, "arguments") {
        Ok(DynSolValue::CustomStruct { tuple, .. }) => struct_items(tuple)?,
        Ok(_) => return Err(invalid("arguments", "expected a struct")),
        Err(Eip712Error::MissingValue(_)) => Vec::new(),
        Err(e) => return Err(e),
    };
    let arguments = alloy_rlp::encode(RlpItem::List(arguments));

    let body = RlpItem::List(vec![
        RlpItem::Bytes(uint_bytes(uint_field(message, "nonce")?)),
        RlpItem::Bytes(uint_bytes(uint_field(message, "feeAmount")?)),
        RlpItem::Bytes(address_field(message, "feeAddress")?.to_vec()),
        RlpItem::Bytes(address_field(message, "contractAddress")?.to_vec()),
        RlpItem::Bytes(uint_bytes(uint_field(message, "value")?)),
        RlpItem::Bytes(string_field(message, "contractMethod")?.as_bytes().to_vec()),
        RlpItem::Bytes(arguments),
    ]);

    let signature = signature.normalized_s();
    let mut out = Vec::with_capacity(65 + body.length());
    out.push(u8::from(signature.v()));
    out.extend_from_slice(&signature.r().to_be_bytes::<32>());
    out.extend_from_slice(&signature.s().to_be_bytes::<32>());
    body.encode(&mut out);
    Ok(out)
}
