use ledgerchain_core::{BatchRef, LedgerError, LedgerResult, Stage};
use sqlx::FromRow;

use crate::db::StateStore;

#[derive(Debug, FromRow)]
struct BatchRefRow {
    batch_no: String,
    stage: String,
    transaction_id: i64,
    block_id: i64,
    transaction_hash: String,
}

impl BatchRefRow {
    fn into_batch_ref(self) -> LedgerResult<BatchRef> {
        let stage = Stage::from_str(&self.stage)
            .ok_or_else(|| LedgerError::Serialization(format!("unknown stage {:?}", self.stage)))?;
        Ok(BatchRef {
            batch_no: self.batch_no,
            stage,
            transaction_id: self.transaction_id,
            block_id: self.block_id,
            transaction_hash: self.transaction_hash,
        })
    }
}

impl StateStore {
    /// The full provenance trail for a batch: every `batch_refs` row,
    /// ordered by insertion (i.e. chronologically — the per-stage
    /// index's only ordering guarantee, the "BatchRef" step).
    pub async fn get_batch_history(&self, batch_no: &str) -> LedgerResult<Vec<BatchRef>> {
        let rows = sqlx::query_as::<_, BatchRefRow>(
            "SELECT batch_no, stage, transaction_id, block_id, transaction_hash
             FROM batch_refs WHERE batch_no = ? ORDER BY ref_id ASC",
        )
        .bind(batch_no)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(BatchRefRow::into_batch_ref).collect()
    }
}
