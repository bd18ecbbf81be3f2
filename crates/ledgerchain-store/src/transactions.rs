use ledgerchain_core::{LedgerResult, Stage, Transaction};
use serde_json::Value;
use sqlx::sqlite::Sqlite;
use sqlx::{Row, SqlitePool};

use crate::rows::{format_ts, TransactionRow};
use crate::db::StateStore;

/// Insert one transaction, and its derived `batch_refs` row, as part of
/// an in-flight block-sealing transaction (the "Write-through" step:
/// the per-stage index is written in the same relational transaction as
/// the block and its transactions).
pub(crate) async fn insert_in_tx(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    block_id: i64,
    txn: &Transaction,
) -> LedgerResult<i64> {
    let document_hashes = txn
        .document_hashes
        .as_ref()
        .map(|m| serde_json::to_string(&Value::Object(m.clone())))
        .transpose()
        .map_err(|e| ledgerchain_core::LedgerError::Serialization(e.to_string()))?;
    let transaction_data = serde_json::to_string(&Value::Object(txn.transaction_data.clone()))
        .map_err(|e| ledgerchain_core::LedgerError::Serialization(e.to_string()))?;

    let transaction_id: i64 = sqlx::query(
        "INSERT INTO transactions (
            transaction_hash, block_id, transaction_type, batch_no, actor_user_id,
            actor_role, actor_public_key, actor_signature, transaction_data,
            from_entity_id, to_entity_id, document_hashes, nonce, timestamp,
            is_verified, verification_count, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, 0, ?)",
    )
    .bind(&txn.hash)
    .bind(block_id)
    .bind(txn.transaction_type.as_tag())
    .bind(&txn.batch_no)
    .bind(txn.actor_user_id)
    .bind(&txn.actor_role)
    .bind(&txn.actor_public_key)
    .bind(&txn.actor_signature)
    .bind(transaction_data)
    .bind(txn.from_entity_id)
    .bind(txn.to_entity_id)
    .bind(document_hashes)
    .bind(&txn.nonce)
    .bind(format_ts(txn.timestamp))
    .bind(format_ts(txn.timestamp))
    .execute(&mut **tx)
    .await?
    .last_insert_rowid();

    let stage: Stage = txn.transaction_type.into();
    sqlx::query(
        "INSERT INTO batch_refs (batch_no, stage, transaction_id, block_id, transaction_hash, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&txn.batch_no)
    .bind(stage.as_str())
    .bind(transaction_id)
    .bind(block_id)
    .bind(&txn.hash)
    .bind(format_ts(txn.timestamp))
    .execute(&mut **tx)
    .await?;

    Ok(transaction_id)
}

pub(crate) async fn list_for_block(pool: &SqlitePool, block_id: i64) -> LedgerResult<Vec<Transaction>> {
    let rows = sqlx::query_as::<_, TransactionRow>(
        "SELECT * FROM transactions WHERE block_id = ? ORDER BY transaction_id ASC",
    )
    .bind(block_id)
    .fetch_all(pool)
    .await?;
    rows.into_iter().map(|r| r.into_transaction()).collect()
}

impl StateStore {
    pub async fn get_transaction_by_hash(&self, hash: &str) -> LedgerResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE transaction_hash = ?")
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.into_transaction()).transpose()
    }

    pub async fn transaction_hash_exists(&self, hash: &str) -> LedgerResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM transactions WHERE transaction_hash = ?")
            .bind(hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? > 0)
    }

    pub async fn count_transactions(&self) -> LedgerResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM transactions")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u64)
    }

    /// Every transaction hash currently on record, for seeding the
    /// in-memory replay set on startup reload.
    pub async fn all_transaction_hashes(&self) -> LedgerResult<Vec<String>> {
        let rows = sqlx::query("SELECT transaction_hash FROM transactions")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|r| r.try_get::<String, _>("transaction_hash").map_err(Into::into)).collect()
    }
}
