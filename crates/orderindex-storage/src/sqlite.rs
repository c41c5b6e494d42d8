//! SQLite checkpoint store.
//!
//! Keeps one row per source in a single file so the indexer can run against
//! a collector that does not track blocks itself. Saves are monotonic: an
//! older block never overwrites a newer one.
//!
//! # Usage
//! ```rust,no_run
//! use orderindex_storage::sqlite::SqliteCheckpointStore;
//!
//! # async fn example() -> Result<(), orderindex_core::IndexerError> {
//! let store = SqliteCheckpointStore::open("./orderindex.db").await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::debug;

use orderindex_core::{Checkpoint, CheckpointStore, IndexerError, SourceKey};

fn storage_err(e: sqlx::Error) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

/// SQLite-backed [`CheckpointStore`].
pub struct SqliteCheckpointStore {
    pool: SqlitePool,
}

impl SqliteCheckpointStore {
    /// Open (or create) a database at `path`.
    ///
    /// Accepts a plain file path or a full `sqlite:` URL.
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory database. A single pooled connection keeps the schema alive.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                chain_id   INTEGER NOT NULL,
                contract   TEXT    NOT NULL,
                last_block INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (chain_id, contract)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    /// Every stored checkpoint, ordered by chain id.
    pub async fn all(&self) -> Result<Vec<Checkpoint>, IndexerError> {
        let rows = sqlx::query(
            "SELECT chain_id, contract, last_block, updated_at
             FROM checkpoints ORDER BY chain_id, contract",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.iter().map(checkpoint_from_row).collect()
    }
}

fn checkpoint_from_row(row: &SqliteRow) -> Result<Checkpoint, IndexerError> {
    let last_block: i64 = row.try_get("last_block").map_err(storage_err)?;
    Ok(Checkpoint {
        source_key: SourceKey::new(
            row.try_get::<i64, _>("chain_id").map_err(storage_err)?,
            row.try_get::<String, _>("contract").map_err(storage_err)?,
        ),
        last_block: u64::try_from(last_block)
            .map_err(|_| IndexerError::Storage(format!("negative last_block {last_block}")))?,
        updated_at: row.try_get("updated_at").map_err(storage_err)?,
    })
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, key: &SourceKey) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT chain_id, contract, last_block, updated_at
             FROM checkpoints WHERE chain_id = ? AND contract = ?",
        )
        .bind(key.chain_id)
        .bind(&key.contract)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.as_ref().map(checkpoint_from_row).transpose()
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), IndexerError> {
        let block = i64::try_from(checkpoint.last_block).map_err(|_| {
            IndexerError::Storage(format!("block {} out of range", checkpoint.last_block))
        })?;
        sqlx::query(
            "INSERT INTO checkpoints (chain_id, contract, last_block, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (chain_id, contract) DO UPDATE
             SET last_block = excluded.last_block, updated_at = excluded.updated_at
             WHERE excluded.last_block > checkpoints.last_block",
        )
        .bind(checkpoint.source_key.chain_id)
        .bind(&checkpoint.source_key.contract)
        .bind(block)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(source = %checkpoint.source_key, block, "checkpoint saved");
        Ok(())
    }
}
