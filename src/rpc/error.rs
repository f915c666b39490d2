use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::types::RpcErrorObject;
use crate::engine::EngineError;
use crate::utils::encode_hex;

/// JSON-RPC error codes used on the wire.
pub mod codes {
    /// Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// JSON is not a valid request object
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    /// Catch-all for failures without a more specific code
    pub const SERVER_ERROR: i32 = -32000;
    /// eth_call reverted, following geth
    pub const EXECUTION_REVERTED: i32 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Coded(i32),
    Internal,
}

/// A failure raised while serving an RPC method.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct RpcError {
    pub kind: ErrorKind,
    pub message: String,
    pub data: Option<Value>,
}

pub type RpcResult = Result<Value, RpcError>;

impl RpcError {
    pub fn coded(code: i32, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Coded(code),
            message: message.into(),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn parse_error() -> Self {
        Self::coded(codes::PARSE_ERROR, "Parse error")
    }

    pub fn invalid_request() -> Self {
        Self::coded(codes::INVALID_REQUEST, "Invalid request")
    }

    pub fn method_not_found() -> Self {
        Self::coded(codes::METHOD_NOT_FOUND, "Method not found")
    }

    pub fn invalid_params(details: impl fmt::Display) -> Self {
        Self::coded(codes::INVALID_PARAMS, format!("Invalid params: {}", details))
    }

    pub fn code(&self) -> i32 {
        match self.kind {
            ErrorKind::Coded(code) => code,
            ErrorKind::Internal => codes::SERVER_ERROR,
        }
    }
}

/// The single mapping from failures to wire error objects.
pub fn classify(error: &RpcError) -> RpcErrorObject {
    RpcErrorObject {
        code: error.code(),
        message: error.message.clone(),
        data: error.data.clone(),
    }
}

impl From<EngineError> for RpcError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Reverted(output) => {
                RpcError::coded(codes::EXECUTION_REVERTED, "execution reverted")
                    .with_data(Value::String(encode_hex(output)))
            }
            other => RpcError::internal(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for RpcError {
    fn from(err: anyhow::Error) -> Self {
        RpcError::internal(err.to_string())
    }
}
