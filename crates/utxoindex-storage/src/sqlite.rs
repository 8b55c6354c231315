//! SQLite storage backend for UtxoIndex.
//!
//! Persists the UTXO set, confirmed blocks, and the latest confirmed point to
//! a single SQLite file. Every [`WriteUnit`] is applied inside one SQL
//! transaction.
//!
//! # Usage
//! ```rust,no_run
//! use utxoindex_storage::sqlite::SqliteUtxoStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteUtxoStore::open("./utxos.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteUtxoStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use utxoindex_core::error::IndexerError;
use utxoindex_core::store::{UtxoStore, WriteUnit};
use utxoindex_core::types::{BlockPoint, FullBlock, Tx, TxInput, TxInputOutput, TxOutput};

fn storage_err(e: impl std::fmt::Display) -> IndexerError {
    IndexerError::Storage(e.to_string())
}

/// SQLite-backed UTXO store.
pub struct SqliteUtxoStore {
    pool: SqlitePool,
}

impl SqliteUtxoStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./utxos.db"`) or a full
    /// SQLite URL (`"sqlite:./utxos.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url).await.map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Uses a single long-lived connection; all data is lost when the pool
    /// is dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(storage_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS utxos (
                tx_hash  TEXT    NOT NULL,
                tx_index INTEGER NOT NULL,
                address  TEXT    NOT NULL,
                amount   INTEGER NOT NULL,
                PRIMARY KEY (tx_hash, tx_index)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_utxos_address ON utxos (address);")
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        // Single row, id = 0
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS latest_block_point (
                id           INTEGER PRIMARY KEY CHECK (id = 0),
                block_slot   INTEGER NOT NULL,
                block_hash   TEXT    NOT NULL,
                block_number INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS confirmed_blocks (
                block_number INTEGER PRIMARY KEY,
                block_slot   INTEGER NOT NULL,
                block_hash   TEXT    NOT NULL,
                txs_json     TEXT    NOT NULL,
                confirmed_at INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    // ─── Inspection ─────────────────────────────────────────────────────────────

    /// Unspent outputs held by `address`, ordered by outpoint.
    pub async fn outputs_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<TxInputOutput>, IndexerError> {
        let rows = sqlx::query(
            "SELECT tx_hash, tx_index, address, amount FROM utxos
             WHERE address = ? ORDER BY tx_hash, tx_index",
        )
        .bind(address)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(rows
            .into_iter()
            .map(|r| TxInputOutput {
                input: TxInput::new(r.get::<String, _>("tx_hash"), r.get::<i64, _>("tx_index") as u32),
                output: TxOutput::new(r.get::<String, _>("address"), r.get::<i64, _>("amount") as u64),
            })
            .collect())
    }

    /// Total number of tracked unspent outputs.
    pub async fn utxo_count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM utxos")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    /// Confirmed blocks ordered by block number.
    pub async fn confirmed_blocks(&self) -> Result<Vec<FullBlock>, IndexerError> {
        let rows = sqlx::query(
            "SELECT block_number, block_slot, block_hash, txs_json
             FROM confirmed_blocks ORDER BY block_number",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;

        rows.iter().map(full_block_from_row).collect()
    }

    pub async fn confirmed_block_count(&self) -> Result<u64, IndexerError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM confirmed_blocks")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }
}

fn full_block_from_row(r: &SqliteRow) -> Result<FullBlock, IndexerError> {
    let txs_json: String = r.get("txs_json");
    let txs: Vec<Tx> = serde_json::from_str(&txs_json).map_err(storage_err)?;
    let block_hash = hex::decode(r.get::<String, _>("block_hash")).map_err(storage_err)?;

    Ok(FullBlock {
        block_slot: r.get::<i64, _>("block_slot") as u64,
        block_hash,
        block_number: r.get::<i64, _>("block_number") as u64,
        txs,
    })
}

// ─── UtxoStore impl ──────────────────────────────────────────────────────────

#[async_trait]
impl UtxoStore for SqliteUtxoStore {
    async fn latest_block_point(&self) -> Result<Option<BlockPoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT block_slot, block_hash, block_number FROM latest_block_point WHERE id = 0",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        row.map(|r| {
            let hash = hex::decode(r.get::<String, _>("block_hash")).map_err(storage_err)?;
            Ok(BlockPoint::new(
                r.get::<i64, _>("block_slot") as u64,
                hash,
                r.get::<i64, _>("block_number") as u64,
            ))
        })
        .transpose()
    }

    async fn output_at(&self, input: &TxInput) -> Result<Option<TxOutput>, IndexerError> {
        let row = sqlx::query("SELECT address, amount FROM utxos WHERE tx_hash = ? AND tx_index = ?")
            .bind(&input.hash)
            .bind(input.index as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.map(|r| TxOutput::new(r.get::<String, _>("address"), r.get::<i64, _>("amount") as u64)))
    }

    async fn commit(&self, unit: WriteUnit) -> Result<(), IndexerError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        for utxo in &unit.outputs_to_add {
            sqlx::query(
                "INSERT OR REPLACE INTO utxos (tx_hash, tx_index, address, amount)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&utxo.input.hash)
            .bind(utxo.input.index as i64)
            .bind(&utxo.output.address)
            .bind(utxo.output.amount as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        for input in &unit.outputs_to_remove {
            sqlx::query("DELETE FROM utxos WHERE tx_hash = ? AND tx_index = ?")
                .bind(&input.hash)
                .bind(input.index as i64)
                .execute(&mut *tx)
                .await
                .map_err(storage_err)?;
        }

        if let Some(block) = &unit.confirmed_block {
            let txs_json = serde_json::to_string(&block.txs).map_err(storage_err)?;
            sqlx::query(
                "INSERT OR REPLACE INTO confirmed_blocks
                 (block_number, block_slot, block_hash, txs_json, confirmed_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(block.block_number as i64)
            .bind(block.block_slot as i64)
            .bind(hex::encode(&block.block_hash))
            .bind(&txs_json)
            .bind(chrono::Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        if let Some(point) = &unit.latest_block_point {
            sqlx::query(
                "INSERT OR REPLACE INTO latest_block_point (id, block_slot, block_hash, block_number)
                 VALUES (0, ?, ?, ?)",
            )
            .bind(point.block_slot as i64)
            .bind(point.hash_hex())
            .bind(point.block_number as i64)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit()
            .await
            .map_err(|e| IndexerError::Storage(format!("commit unit: {e}")))?;

        debug!(
            added = unit.outputs_to_add.len(),
            removed = unit.outputs_to_remove.len(),
            block = unit.confirmed_block.is_some(),
            "unit committed"
        );
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
