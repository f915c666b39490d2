use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::config::{CliOverrides, EnvOverrides, Settings};
use crate::engine::{
    network_config, Block, BlockHeight, Engine, EngineError, NetworkConfig, Provider, Transaction,
    ViewCall,
};
use crate::rpc::ServerContext;

pub fn sample_block(height: BlockHeight, transactions: usize) -> Block {
    Block {
        height,
        hash: Some(bs58::encode([height as u8; 32]).into_string()),
        parent_hash: Some(bs58::encode([height.saturating_sub(1) as u8; 32]).into_string()),
        timestamp: None,
        transactions: (0..transactions)
            .map(|i| Transaction {
                hash: B256::repeat_byte(i as u8 + 1),
                near_hash: bs58::encode([i as u8 + 0x40; 32]).into_string(),
                signer_id: "relay.test.near".to_string(),
                method: "submit".to_string(),
                input: vec![i as u8],
            })
            .collect(),
    }
}

#[derive(Debug, Default)]
struct MockEngineState {
    blocks: BTreeMap<BlockHeight, Block>,
    head: BlockHeight,
    failing_fetches: usize,
    malformed_blocks: bool,
    fetches: Vec<BlockHeight>,
    balances: HashMap<Address, U256>,
    code: HashMap<Address, Vec<u8>>,
    view_result: Option<Result<Vec<u8>, Vec<u8>>>,
    views: Vec<ViewCall>,
}

/// Scripted engine. Heights below the head that were never pushed read as
/// skipped; heights above it are not produced yet.
#[derive(Debug)]
pub struct MockEngine {
    network: &'static NetworkConfig,
    state: Mutex<MockEngineState>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new("testnet")
    }
}

impl MockEngine {
    pub fn new(network_id: &str) -> Self {
        Self {
            network: network_config(network_id).expect("known test network"),
            state: Mutex::new(MockEngineState::default()),
        }
    }

    pub fn push_block(&self, block: Block) {
        let mut state = self.state.lock().unwrap();
        state.head = state.head.max(block.height);
        state.blocks.insert(block.height, block);
    }

    pub fn fail_next_fetches(&self, n: usize) {
        self.state.lock().unwrap().failing_fetches = n;
    }

    /// Every later fetch fails with a non-transient decode error.
    pub fn serve_malformed_blocks(&self) {
        self.state.lock().unwrap().malformed_blocks = true;
    }

    pub fn fetches(&self) -> Vec<BlockHeight> {
        self.state.lock().unwrap().fetches.clone()
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.state.lock().unwrap().balances.insert(address, balance);
    }

    pub fn set_code(&self, address: Address, code: Vec<u8>) {
        self.state.lock().unwrap().code.insert(address, code);
    }

    /// `Err(data)` makes every view revert with `data`.
    pub fn set_view_result(&self, result: Result<Vec<u8>, Vec<u8>>) {
        self.state.lock().unwrap().view_result = Some(result);
    }

    pub fn views(&self) -> Vec<ViewCall> {
        self.state.lock().unwrap().views.clone()
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn network(&self) -> &'static NetworkConfig {
        self.network
    }

    fn contract_id(&self) -> &str {
        self.network.contract_id
    }

    async fn latest_height(&self) -> Result<BlockHeight, EngineError> {
        Ok(self.state.lock().unwrap().head)
    }

    async fn get_block(&self, height: BlockHeight) -> Result<Option<Block>, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.fetches.push(height);
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(EngineError::Rpc("injected fetch failure".to_string()));
        }
        if state.malformed_blocks {
            return Err(EngineError::Decode(format!("block {} has no header", height)));
        }
        if let Some(block) = state.blocks.get(&height) {
            return Ok(Some(block.clone()));
        }
        Ok((height < state.head).then(|| Block::skipped(height)))
    }

    async fn get_balance(&self, address: Address) -> Result<U256, EngineError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }

    async fn get_nonce(&self, _address: Address) -> Result<U256, EngineError> {
        Ok(U256::ZERO)
    }

    async fn get_code(&self, address: Address) -> Result<Vec<u8>, EngineError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_storage_at(&self, _address: Address, _key: B256) -> Result<B256, EngineError> {
        Ok(B256::ZERO)
    }

    async fn view(&self, call: ViewCall) -> Result<Vec<u8>, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.views.push(call);
        match state.view_result.clone() {
            Some(Ok(output)) => Ok(output),
            Some(Err(data)) => Err(EngineError::Reverted(data)),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub contract_id: String,
    pub method: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

/// Provider that records submissions instead of signing them.
#[derive(Debug)]
pub struct RecordingProvider {
    calls: Mutex<Vec<RecordedCall>>,
    failure: Option<String>,
}

impl Default for RecordingProvider {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failure: None,
        }
    }
}

impl RecordingProvider {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for RecordingProvider {
    fn account_id(&self) -> Option<&str> {
        Some("relay.test.near")
    }

    async fn function_call(
        &self,
        contract_id: &str,
        method: &str,
        args: Vec<u8>,
        gas: u64,
        deposit: u128,
    ) -> Result<Value, EngineError> {
        self.calls.lock().unwrap().push(RecordedCall {
            contract_id: contract_id.to_string(),
            method: method.to_string(),
            args,
            gas,
            deposit,
        });
        match &self.failure {
            Some(message) => Err(EngineError::Execution(message.clone())),
            None => Ok(json!({ "status": { "SuccessValue": "" } })),
        }
    }
}

pub fn test_settings(yaml: &str) -> Settings {
    Settings::from_yaml(yaml, &EnvOverrides::default(), &CliOverrides::default())
        .expect("test settings")
}

pub fn test_context(
    network_id: &str,
    engine: Arc<MockEngine>,
    provider: Arc<RecordingProvider>,
) -> ServerContext {
    let settings = test_settings(&format!("network: {}", network_id));
    let network = settings.network_config().expect("known test network");
    ServerContext::new(Arc::new(settings), network, engine, provider)
}
