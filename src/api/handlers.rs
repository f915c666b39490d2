use axum::{body::Bytes, extract::State, Json};
use serde_json::{json, Value};
use tracing::debug;

use super::routes::AppState;
use super::types::HealthResponse;
use crate::relay::{self, RelayRequest};
use crate::rpc::{RpcPayloadResponse, RpcResponse};

pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": format!("Aurora relayer is running on {}", state.dispatcher.context().network.label)
    }))
}

pub async fn rpc(State(state): State<AppState>, body: Bytes) -> Json<RpcPayloadResponse> {
    Json(state.dispatcher.handle_payload(&body).await)
}

pub async fn relay(State(state): State<AppState>, body: Bytes) -> Json<RpcResponse> {
    // An unreadable body is treated like one with no fields and rejected by the relay.
    let request = serde_json::from_slice::<RelayRequest>(&body).unwrap_or_else(|e| {
        debug!("Unreadable relay body: {}", e);
        RelayRequest::default()
    });
    Json(relay::relay(state.dispatcher.context(), request).await)
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let ctx = state.dispatcher.context();
    Json(HealthResponse {
        status: "ok".to_string(),
        network: ctx.network.id.to_string(),
        chain_id: ctx.network.chain_id,
        engine: ctx.engine_id().to_string(),
    })
}
