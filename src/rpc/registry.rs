use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::future::Future;

use super::context::ServerContext;
use super::error::RpcResult;
use super::methods;
use super::params::Params;

pub type MethodHandler = Box<dyn Fn(ServerContext, Params) -> BoxFuture<'static, RpcResult> + Send + Sync>;

/// Method name to handler table, built once at startup.
#[derive(Default)]
pub struct MethodRegistry {
    handlers: HashMap<&'static str, MethodHandler>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, name: &'static str, handler: F) -> &mut Self
    where
        F: Fn(ServerContext, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RpcResult> + Send + 'static,
    {
        self.handlers
            .insert(name, Box::new(move |ctx, params| handler(ctx, params).boxed()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&MethodHandler> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn method_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Every method the relayer serves.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry
            .register("web3_clientVersion", methods::web3_client_version)
            .register("web3_sha3", methods::web3_sha3)
            .register("net_version", methods::net_version)
            .register("net_listening", methods::net_listening)
            .register("net_peerCount", methods::net_peer_count)
            .register("eth_chainId", methods::eth_chain_id)
            .register("eth_protocolVersion", methods::eth_protocol_version)
            .register("eth_syncing", methods::eth_syncing)
            .register("eth_mining", methods::eth_mining)
            .register("eth_hashrate", methods::eth_hashrate)
            .register("eth_gasPrice", methods::eth_gas_price)
            .register("eth_accounts", methods::eth_accounts)
            .register("eth_coinbase", methods::eth_coinbase)
            .register("eth_blockNumber", methods::eth_block_number)
            .register("eth_getBalance", methods::eth_get_balance)
            .register("eth_getTransactionCount", methods::eth_get_transaction_count)
            .register("eth_getCode", methods::eth_get_code)
            .register("eth_getStorageAt", methods::eth_get_storage_at)
            .register("eth_call", methods::eth_call)
            .register("eth_estimateGas", methods::eth_estimate_gas)
            .register("eth_getBlockByNumber", methods::eth_get_block_by_number)
            .register(
                "eth_getBlockTransactionCountByNumber",
                methods::eth_get_block_transaction_count_by_number,
            )
            .register(
                "eth_getTransactionByBlockNumberAndIndex",
                methods::eth_get_transaction_by_block_number_and_index,
            )
            .register("eth_sendRawTransaction", methods::eth_send_raw_transaction);
        registry
    }
}
