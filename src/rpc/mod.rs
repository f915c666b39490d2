pub mod context;
pub mod dispatcher;
pub mod error;
pub mod methods;
pub mod params;
pub mod registry;
pub mod types;

pub use context::ServerContext;
pub use dispatcher::Dispatcher;
pub use error::{classify, ErrorKind, RpcError, RpcResult};
pub use params::{BlockTag, Params};
pub use registry::MethodRegistry;
pub use types::{RpcErrorObject, RpcId, RpcOutcome, RpcPayloadResponse, RpcRequest, RpcResponse};
