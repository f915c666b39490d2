use sqlx::PgPool;
use tracing::info;

pub async fn initialize_database(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS blocks (
            height BIGINT PRIMARY KEY,
            hash TEXT,
            parent_hash TEXT,
            timestamp TIMESTAMPTZ,
            transaction_count INTEGER NOT NULL DEFAULT 0,
            indexed_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS transactions (
            block_height BIGINT NOT NULL,
            transaction_index INTEGER NOT NULL,
            hash TEXT NOT NULL,
            near_hash TEXT NOT NULL,
            signer_id TEXT NOT NULL,
            method TEXT NOT NULL,
            input BYTEA NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (block_height, transaction_index),
            FOREIGN KEY (block_height) REFERENCES blocks(height)
        )"
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_transactions_hash ON transactions(hash)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS indexer_cursor (
            name TEXT PRIMARY KEY,
            next_height BIGINT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP
        )"
    )
    .execute(pool)
    .await?;

    info!("🧱 Schema is up to date");
    Ok(())
}

/// Empties the index, cursor included.
pub async fn reset_database(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("TRUNCATE TABLE transactions, blocks, indexer_cursor")
        .execute(pool)
        .await?;
    info!("🧹 Index tables truncated");
    Ok(())
}
