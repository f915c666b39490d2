use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BlockRow {
    pub height: i64,
    pub hash: Option<String>,
    pub parent_hash: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub transaction_count: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TransactionRow {
    pub block_height: i64,
    pub transaction_index: i32,
    pub hash: String,
    pub near_hash: String,
    pub signer_id: String,
    pub method: String,
    pub input: Vec<u8>,
}
