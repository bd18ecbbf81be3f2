use chrono::Utc;
use ledgerchain_core::LedgerResult;
use sqlx::Row;

use crate::db::StateStore;
use crate::rows::format_ts;

impl StateStore {
    pub async fn get_metadata(&self, key: &str) -> LedgerResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get::<String, _>("value")).transpose().map_err(Into::into)
    }

    pub async fn put_metadata(&self, key: &str, value: &str, description: Option<&str>) -> LedgerResult<()> {
        sqlx::query(
            "INSERT INTO metadata (key, value, description, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(description)
        .bind(format_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
