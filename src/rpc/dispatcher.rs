use futures::future::{join_all, FutureExt};
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

use super::context::ServerContext;
use super::error::{classify, RpcError, RpcResult};
use super::params::Params;
use super::registry::MethodRegistry;
use super::types::{RpcId, RpcPayloadResponse, RpcRequest, RpcResponse};
use crate::metrics::record_rpc_request;

/// Routes JSON-RPC requests to registered handlers and turns every outcome
/// into a response envelope.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<MethodRegistry>,
    context: ServerContext,
}

impl Dispatcher {
    pub fn new(registry: Arc<MethodRegistry>, context: ServerContext) -> Self {
        Self { registry, context }
    }

    pub fn context(&self) -> &ServerContext {
        &self.context
    }

    /// Handles a raw HTTP body, which may hold a single request or a batch.
    pub async fn handle_payload(&self, body: &[u8]) -> RpcPayloadResponse {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                debug!("Rejecting unparsable RPC body: {}", e);
                return RpcPayloadResponse::Single(RpcResponse::error(
                    RpcId::Null,
                    classify(&RpcError::parse_error()),
                ));
            }
        };

        match value {
            Value::Array(items) if items.is_empty() => RpcPayloadResponse::Single(
                RpcResponse::error(RpcId::Null, classify(&RpcError::invalid_request())),
            ),
            Value::Array(items) => {
                let responses = join_all(items.into_iter().map(|item| self.handle_value(item))).await;
                RpcPayloadResponse::Batch(responses)
            }
            other => RpcPayloadResponse::Single(self.handle_value(other).await),
        }
    }

    async fn handle_value(&self, value: Value) -> RpcResponse {
        let id = value
            .get("id")
            .and_then(|id| serde_json::from_value::<RpcId>(id.clone()).ok())
            .unwrap_or_default();
        match serde_json::from_value::<RpcRequest>(value) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => {
                debug!("Invalid RPC request object: {}", e);
                RpcResponse::error(id, classify(&RpcError::invalid_request()))
            }
        }
    }

    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let RpcRequest { id, method, params, .. } = request;
        let started = Instant::now();
        let outcome = self.invoke(&method, params).await;

        record_rpc_request(
            &method,
            self.registry.contains(&method),
            started.elapsed(),
            outcome.is_err(),
        );

        match outcome {
            Ok(result) => RpcResponse::success(id, result),
            Err(err) => {
                error!("RPC {} failed: {:?}", method, err);
                RpcResponse::error(id, classify(&err))
            }
        }
    }

    async fn invoke(&self, method: &str, params: Value) -> RpcResult {
        let handler = self.registry.get(method).ok_or_else(RpcError::method_not_found)?;
        let params = Params::from_value(params)?;
        let context = self.context.clone();

        match AssertUnwindSafe(async move { handler(context, params).await })
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(RpcError::internal(panic_message(&*panic))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
