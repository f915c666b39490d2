use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres};
use tracing::debug;

use super::models::{BlockRow, TransactionRow};
use super::{check_cursor, IndexStore, StoreError};
use crate::engine::{Block, BlockHeight, Transaction};
use crate::utils::encode_hex;

pub const DEFAULT_CURSOR: &str = "blocks";

fn to_db(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Overflow(value))
}

fn to_db_index(value: usize) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Overflow(value as u64))
}

fn from_db(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Backend(format!("negative height {} in database", value)))
}

async fn upsert_block_with<'e, E>(executor: E, block: &Block) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let count = to_db_index(block.transactions.len())?;
    sqlx::query(
        "INSERT INTO blocks (height, hash, parent_hash, timestamp, transaction_count)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (height) DO UPDATE SET
            hash = EXCLUDED.hash,
            parent_hash = EXCLUDED.parent_hash,
            timestamp = EXCLUDED.timestamp,
            transaction_count = EXCLUDED.transaction_count"
    )
    .bind(to_db(block.height)?)
    .bind(&block.hash)
    .bind(&block.parent_hash)
    .bind(block.timestamp)
    .bind(count)
    .execute(executor)
    .await?;
    Ok(())
}

async fn upsert_transaction_with<'e, E>(
    executor: E,
    height: BlockHeight,
    index: usize,
    tx: &Transaction,
) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    let index = to_db_index(index)?;
    sqlx::query(
        "INSERT INTO transactions (block_height, transaction_index, hash, near_hash, signer_id, method, input)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (block_height, transaction_index) DO UPDATE SET
            hash = EXCLUDED.hash,
            near_hash = EXCLUDED.near_hash,
            signer_id = EXCLUDED.signer_id,
            method = EXCLUDED.method,
            input = EXCLUDED.input"
    )
    .bind(to_db(height)?)
    .bind(index)
    .bind(encode_hex(tx.hash))
    .bind(&tx.near_hash)
    .bind(&tx.signer_id)
    .bind(&tx.method)
    .bind(&tx.input)
    .execute(executor)
    .await?;
    Ok(())
}

async fn set_cursor_with<'e, E>(executor: E, name: &str, next: BlockHeight) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query(
        "INSERT INTO indexer_cursor (name, next_height, updated_at)
         VALUES ($1, $2, NOW())
         ON CONFLICT (name) DO UPDATE SET
            next_height = EXCLUDED.next_height,
            updated_at = NOW()"
    )
    .bind(name)
    .bind(to_db(next)?)
    .execute(executor)
    .await?;
    Ok(())
}

/// PostgreSQL-backed index.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    cursor_name: String,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cursor_name: DEFAULT_CURSOR.to_string(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn block(&self, height: BlockHeight) -> Result<Option<BlockRow>, StoreError> {
        let row = sqlx::query_as::<_, BlockRow>(
            "SELECT height, hash, parent_hash, timestamp, transaction_count FROM blocks WHERE height = $1",
        )
        .bind(to_db(height)?)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn transactions(&self, height: BlockHeight) -> Result<Vec<TransactionRow>, StoreError> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT block_height, transaction_index, hash, near_hash, signer_id, method, input
             FROM transactions WHERE block_height = $1 ORDER BY transaction_index",
        )
        .bind(to_db(height)?)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl IndexStore for PgStore {
    async fn get_cursor(&self) -> Result<Option<BlockHeight>, StoreError> {
        let next: Option<i64> = sqlx::query_scalar("SELECT next_height FROM indexer_cursor WHERE name = $1")
            .bind(&self.cursor_name)
            .fetch_optional(&self.pool)
            .await?;
        next.map(from_db).transpose()
    }

    async fn set_cursor(&self, next: BlockHeight) -> Result<(), StoreError> {
        set_cursor_with(&self.pool, &self.cursor_name, next).await
    }

    async fn upsert_block(&self, block: &Block) -> Result<(), StoreError> {
        upsert_block_with(&self.pool, block).await
    }

    async fn upsert_transaction(
        &self,
        height: BlockHeight,
        index: usize,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        upsert_transaction_with(&self.pool, height, index, transaction).await
    }

    async fn commit_block(&self, block: &Block) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Held until commit; serialises writers even before the cursor row exists.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&self.cursor_name)
            .execute(&mut *tx)
            .await?;
        let stored: Option<i64> = sqlx::query_scalar("SELECT next_height FROM indexer_cursor WHERE name = $1")
            .bind(&self.cursor_name)
            .fetch_optional(&mut *tx)
            .await?;
        check_cursor(stored.map(from_db).transpose()?, block.height)?;

        upsert_block_with(&mut *tx, block).await?;
        for (index, transaction) in block.transactions.iter().enumerate() {
            upsert_transaction_with(&mut *tx, block.height, index, transaction).await?;
        }
        sqlx::query("DELETE FROM transactions WHERE block_height = $1 AND transaction_index >= $2")
            .bind(to_db(block.height)?)
            .bind(to_db_index(block.transactions.len())?)
            .execute(&mut *tx)
            .await?;

        let next = block
            .height
            .checked_add(1)
            .ok_or(StoreError::Overflow(block.height))?;
        set_cursor_with(&mut *tx, &self.cursor_name, next).await?;

        tx.commit().await?;
        debug!("Committed block {} ({} transactions)", block.height, block.transactions.len());
        Ok(())
    }
}
