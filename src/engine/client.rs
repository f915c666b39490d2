use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

use super::EngineError;

/// Thin JSON-RPC client for a NEAR node.
#[derive(Debug, Clone)]
pub struct NearRpcClient {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl NearRpcClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(16)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, EngineError> {
        debug!("NEAR RPC {} {}", method, params);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": "dontcare"
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout(self.timeout)
                } else {
                    EngineError::Transport(e)
                }
            })?;

        if !response.status().is_success() && response.status().as_u16() != 400 {
            return Err(EngineError::Rpc(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let mut json: Value = response.json().await?;
        if let Some(err) = json.get("error") {
            return Err(classify_rpc_error(method, err));
        }

        match json.get_mut("result") {
            Some(result) => Ok(result.take()),
            None => Err(EngineError::Decode(format!("{} response has no result", method))),
        }
    }
}

fn classify_rpc_error(method: &str, err: &Value) -> EngineError {
    let cause = err
        .pointer("/cause/name")
        .and_then(Value::as_str)
        .unwrap_or_default();
    match cause {
        "UNKNOWN_BLOCK" | "UNKNOWN_CHUNK" => EngineError::UnknownBlock,
        _ => {
            error!("NEAR RPC error for {}: {}", method, err);
            let message = err
                .get("data")
                .map(|d| match d {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .or_else(|| err.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| err.to_string());
            EngineError::Rpc(message)
        }
    }
}
