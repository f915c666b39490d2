use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use borsh::BorshSerialize;
use ed25519_dalek::{Signer, SigningKey};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{EngineError, NearRpcClient, Provider};

#[derive(Debug, Clone, BorshSerialize)]
pub enum PublicKey {
    Ed25519([u8; 32]),
}

#[derive(Debug, Clone, BorshSerialize)]
pub enum Signature {
    Ed25519([u8; 64]),
}

#[derive(Debug, Clone, BorshSerialize)]
pub struct FunctionCallAction {
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

// Variant order fixes the borsh tag; FunctionCall must stay at index 2.
#[derive(Debug, Clone, BorshSerialize)]
pub enum Action {
    CreateAccount,
    DeployContract { code: Vec<u8> },
    FunctionCall(FunctionCallAction),
    Transfer { deposit: u128 },
}

#[derive(Debug, Clone, BorshSerialize)]
pub struct NearTransaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, BorshSerialize)]
pub struct SignedTransaction {
    pub transaction: NearTransaction,
    pub signature: Signature,
}

impl NearTransaction {
    pub fn sign(self, key: &SigningKey) -> Result<SignedTransaction, EngineError> {
        let bytes = borsh::to_vec(&self).map_err(|e| EngineError::Signer(e.to_string()))?;
        let hash = Sha256::digest(&bytes);
        let signature = key.sign(&hash);
        Ok(SignedTransaction {
            transaction: self,
            signature: Signature::Ed25519(signature.to_bytes()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct KeyFile {
    account_id: String,
    public_key: String,
    #[serde(alias = "secret_key")]
    private_key: String,
}

pub fn default_key_path(network: &str, account_id: &str) -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home)
        .join(".near-credentials")
        .join(network)
        .join(format!("{}.json", account_id))
}

fn decode_ed25519(value: &str) -> Result<Vec<u8>, EngineError> {
    let encoded = value.strip_prefix("ed25519:").ok_or_else(|| {
        EngineError::Signer(format!("unsupported key type in `{}`", value))
    })?;
    bs58::decode(encoded)
        .into_vec()
        .map_err(|e| EngineError::Signer(format!("invalid base58 key: {}", e)))
}

/// Submits function calls signed with the relayer's full-access key.
pub struct NearProvider {
    rpc: NearRpcClient,
    account_id: String,
    public_key: [u8; 32],
    public_key_text: String,
    signing_key: SigningKey,
    // Serializes submissions so nonces are handed out in order.
    last_nonce: Mutex<u64>,
}

impl NearProvider {
    pub fn from_key_file(rpc: NearRpcClient, path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Signer(format!("reading {}: {}", path.display(), e)))?;
        let key_file: KeyFile = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Signer(format!("parsing {}: {}", path.display(), e)))?;

        let secret = decode_ed25519(&key_file.private_key)?;
        let seed: [u8; 32] = secret
            .get(..32)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| EngineError::Signer("private key is too short".to_string()))?;
        let signing_key = SigningKey::from_bytes(&seed);

        let public_key: [u8; 32] = decode_ed25519(&key_file.public_key)?
            .try_into()
            .map_err(|_| EngineError::Signer("public key must be 32 bytes".to_string()))?;
        if signing_key.verifying_key().to_bytes() != public_key {
            return Err(EngineError::Signer(
                "private key does not match public key".to_string(),
            ));
        }

        info!("🔑 Loaded signer {} from {}", key_file.account_id, path.display());
        Ok(Self {
            rpc,
            account_id: key_file.account_id,
            public_key,
            public_key_text: key_file.public_key,
            signing_key,
            last_nonce: Mutex::new(0),
        })
    }

    async fn access_key(&self) -> Result<(u64, [u8; 32]), EngineError> {
        let result = self
            .rpc
            .call(
                "query",
                json!({
                    "request_type": "view_access_key",
                    "finality": "final",
                    "account_id": self.account_id,
                    "public_key": self.public_key_text,
                }),
            )
            .await?;
        if let Some(err) = result.get("error").and_then(Value::as_str) {
            return Err(EngineError::Signer(err.to_string()));
        }
        let nonce = result
            .get("nonce")
            .and_then(Value::as_u64)
            .ok_or_else(|| EngineError::Decode("access key has no nonce".to_string()))?;
        let block_hash = result
            .get("block_hash")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Decode("access key has no block hash".to_string()))?;
        let block_hash: [u8; 32] = bs58::decode(block_hash)
            .into_vec()
            .ok()
            .and_then(|v| v.try_into().ok())
            .ok_or_else(|| EngineError::Decode("invalid block hash".to_string()))?;
        Ok((nonce, block_hash))
    }
}

#[async_trait]
impl Provider for NearProvider {
    fn account_id(&self) -> Option<&str> {
        Some(&self.account_id)
    }

    async fn function_call(
        &self,
        contract_id: &str,
        method: &str,
        args: Vec<u8>,
        gas: u64,
        deposit: u128,
    ) -> Result<Value, EngineError> {
        let mut last_nonce = self.last_nonce.lock().await;
        let (chain_nonce, block_hash) = self.access_key().await?;
        let nonce = chain_nonce.max(*last_nonce) + 1;

        let signed = NearTransaction {
            signer_id: self.account_id.clone(),
            public_key: PublicKey::Ed25519(self.public_key),
            nonce,
            receiver_id: contract_id.to_string(),
            block_hash,
            actions: vec![Action::FunctionCall(FunctionCallAction {
                method_name: method.to_string(),
                args,
                gas,
                deposit,
            })],
        }
        .sign(&self.signing_key)?;
        let encoded = borsh::to_vec(&signed).map_err(|e| EngineError::Signer(e.to_string()))?;

        let outcome = self
            .rpc
            .call("broadcast_tx_commit", json!([BASE64.encode(encoded)]))
            .await?;
        *last_nonce = nonce;

        if let Some(failure) = outcome.pointer("/status/Failure") {
            warn!("{}.{} failed: {}", contract_id, method, failure);
            return Err(EngineError::Execution(failure.to_string()));
        }
        Ok(outcome)
    }
}

/// Provider used when no signer account is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadOnlyProvider;

#[async_trait]
impl Provider for ReadOnlyProvider {
    fn account_id(&self) -> Option<&str> {
        None
    }

    async fn function_call(
        &self,
        _contract_id: &str,
        _method: &str,
        _args: Vec<u8>,
        _gas: u64,
        _deposit: u128,
    ) -> Result<Value, EngineError> {
        Err(EngineError::ReadOnly)
    }
}
