use alloy_primitives::Address;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

pub mod eip712;
pub mod meta_call;

use crate::metrics::record_relay_submission;
use crate::rpc::error::codes;
use crate::rpc::{RpcErrorObject, RpcId, RpcResponse, ServerContext};
use eip712::{parse_signature, recover_signer, Eip712Error, TypedData};
use meta_call::{address_field, encode_meta_call};

pub const INVALID_SIGNATURE: &str = "Signature is invalid for given message";
/// Gas attached to `meta_call` submissions (10 Tgas).
pub const META_CALL_GAS: u64 = 10_000_000_000_000;

/// Body of `POST /relay`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayRequest {
    #[serde(default)]
    pub id: RpcId,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub signature: Option<Value>,
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("missing `{0}`")]
    MissingField(&'static str),
    #[error("malformed typed data: {0}")]
    TypedData(#[from] serde_json::Error),
    #[error(transparent)]
    Eip712(#[from] Eip712Error),
    #[error("recovered signer {recovered} does not match sender {sender}")]
    SignerMismatch { recovered: Address, sender: Address },
}

/// Validated meta-call ready for submission.
#[derive(Debug)]
pub struct PreparedMetaCall {
    pub sender: Address,
    pub args: Vec<u8>,
}

/// Checks the payload and signature and encodes the meta call.
pub fn prepare(request: &RelayRequest) -> Result<PreparedMetaCall, RelayError> {
    let data = request.data.as_ref().filter(|v| !v.is_null()).ok_or(RelayError::MissingField("data"))?;
    let signature = request
        .signature
        .as_ref()
        .and_then(Value::as_str)
        .ok_or(RelayError::MissingField("signature"))?;

    let signature = parse_signature(signature)?;
    let typed: TypedData = serde_json::from_value(data.clone())?;
    let message = typed.coerce().map_err(Eip712Error::from)?;
    let sender = address_field(&message, "sender")?;

    let recovered = recover_signer(&typed, &signature)?;
    if recovered != sender {
        return Err(RelayError::SignerMismatch { recovered, sender });
    }

    let args = encode_meta_call(&message, &signature)?;
    Ok(PreparedMetaCall { sender, args })
}

/// Relays a signed meta-transaction. Always answers with an envelope.
pub async fn relay(ctx: &ServerContext, request: RelayRequest) -> RpcResponse {
    let id = request.id.clone();
    if ctx.settings.verbose {
        info!("relay request {:?}: data={:?} signature={:?}", id, request.data, request.signature);
    }

    let prepared = match prepare(&request) {
        Ok(prepared) => prepared,
        Err(e) => {
            warn!("Rejected relay request {:?}: {}", id, e);
            record_relay_submission("rejected");
            return RpcResponse::error(id, RpcErrorObject::new(codes::SERVER_ERROR, INVALID_SIGNATURE));
        }
    };

    let outcome = ctx
        .provider
        .function_call(ctx.engine_id(), "meta_call", prepared.args, META_CALL_GAS, 0)
        .await;

    match outcome {
        Ok(result) => {
            record_relay_submission("submitted");
            if ctx.settings.verbose {
                info!("relay {:?} from {} submitted: {}", id, prepared.sender, result);
            }
            RpcResponse::success(id, result)
        }
        Err(e) => {
            record_relay_submission("failed");
            error!("relay {:?} from {} failed: {}", id, prepared.sender, e);
            RpcResponse::error(id, RpcErrorObject::new(codes::SERVER_ERROR, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_are_rejected() {
        let err = prepare(&RelayRequest::default()).unwrap_err();
        assert!(matches!(err, RelayError::MissingField("data")));

        let request = RelayRequest {
            data: Some(json!({})),
            signature: Some(json!(42)),
            ..RelayRequest::default()
        };
        assert!(matches!(
            prepare(&request).unwrap_err(),
            RelayError::MissingField("signature")
        ));
    }

    #[test]
    fn short_signature_is_rejected() {
        let request: RelayRequest = serde_json::from_value(json!({
            "data": {
                "types": { "M": [{ "name": "sender", "type": "address" }] },
                "primaryType": "M",
                "domain": { "name": "x" },
                "message": { "sender": "0x0000000000000000000000000000000000000001" }
            },
            "signature": "0xdeadbeef"
        }))
        .unwrap();
        assert!(matches!(prepare(&request).unwrap_err(), RelayError::Eip712(_)));
    }
}
