use ledgerchain_core::{Block, LedgerResult};
use sqlx::Row;

use crate::db::StateStore;
use crate::rows::{format_ts, BlockRow};
use crate::transactions;

impl StateStore {
    /// Persist a freshly mined (and possibly signed) block together with
    /// all of its transactions and their `batch_refs` index rows in a
    /// single relational transaction.
    pub async fn put_sealed_block(&self, block: &Block, mining_time_ms: Option<i64>) -> LedgerResult<i64> {
        let mut tx = self.pool.begin().await?;

        let block_id: i64 = sqlx::query(
            "INSERT INTO blocks (
                block_number, previous_hash, merkle_root, timestamp, nonce,
                difficulty, block_hash, validator_user_id, validator_public_key,
                validator_signature, transaction_count, mining_time_ms, is_valid,
                created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(block.block_number as i64)
        .bind(&block.previous_hash)
        .bind(&block.merkle_root)
        .bind(format_ts(block.timestamp))
        .bind(block.nonce as i64)
        .bind(block.difficulty as i64)
        .bind(&block.hash)
        .bind(block.validator_user_id)
        .bind(&block.validator_public_key)
        .bind(&block.validator_signature)
        .bind(block.transactions.len() as i64)
        .bind(mining_time_ms)
        .bind(format_ts(block.timestamp))
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for txn in &block.transactions {
            transactions::insert_in_tx(&mut tx, block_id, txn).await?;
        }

        tx.commit().await?;
        Ok(block_id)
    }

    pub async fn count_blocks(&self) -> LedgerResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM blocks")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    pub async fn get_block_row_by_number(&self, block_number: u64) -> LedgerResult<Option<BlockRow>> {
        let row = sqlx::query_as::<_, BlockRow>("SELECT * FROM blocks WHERE block_number = ?")
            .bind(block_number as i64)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_block_row_by_hash(&self, hash: &str) -> LedgerResult<Option<BlockRow>> {
        let row = sqlx::query_as::<_, BlockRow>("SELECT * FROM blocks WHERE block_hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn get_block_by_number(&self, block_number: u64) -> LedgerResult<Option<Block>> {
        match self.get_block_row_by_number(block_number).await? {
            None => Ok(None),
            Some(row) => {
                let txns = transactions::list_for_block(&self.pool, row.block_id).await?;
                Ok(Some(row.into_block(txns)?))
            }
        }
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> LedgerResult<Option<Block>> {
        match self.get_block_row_by_hash(hash).await? {
            None => Ok(None),
            Some(row) => {
                let txns = transactions::list_for_block(&self.pool, row.block_id).await?;
                Ok(Some(row.into_block(txns)?))
            }
        }
    }

    /// All blocks, `block_number`-ordered, each with its transactions in
    /// `transaction_id` order — the exact shape the startup reload
    /// routine and `get_all_blocks()` need.
    pub async fn iter_all_blocks(&self) -> LedgerResult<Vec<Block>> {
        let rows = sqlx::query_as::<_, BlockRow>("SELECT * FROM blocks ORDER BY block_number ASC")
            .fetch_all(&self.pool)
            .await?;
        let mut blocks = Vec::with_capacity(rows.len());
        for row in rows {
            let txns = transactions::list_for_block(&self.pool, row.block_id).await?;
            blocks.push(row.into_block(txns)?);
        }
        Ok(blocks)
    }
}
