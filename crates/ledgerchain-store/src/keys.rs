use chrono::Utc;
use ledgerchain_core::{KeyRecord, LedgerResult};
use sqlx::{FromRow, Row};

use crate::db::StateStore;
use crate::rows::{format_ts, parse_ts};

#[derive(Debug, FromRow)]
struct UserKeyRow {
    user_id: i64,
    public_key: String,
    encrypted_private_key: String,
    key_version: i64,
    is_active: i64,
    created_at: String,
    updated_at: String,
}

impl UserKeyRow {
    fn into_key_record(self) -> LedgerResult<KeyRecord> {
        Ok(KeyRecord {
            user_id: self.user_id,
            public_key: self.public_key,
            sealed_private_key: self.encrypted_private_key,
            key_version: self.key_version as u32,
            is_active: self.is_active != 0,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

impl StateStore {
    /// Insert a new active key for `user_id`, deactivating any previously
    /// active key first — both statements run in one transaction so a
    /// reader never observes zero or two active keys for the same user
    /// (the `idx_user_keys_active` partial unique index backstops this
    /// at the schema level too).
    pub async fn rotate_key(&self, record: &KeyRecord) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE user_keys SET is_active = 0, updated_at = ? WHERE user_id = ? AND is_active = 1")
            .bind(format_ts(Utc::now()))
            .bind(record.user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO user_keys (
                user_id, public_key, encrypted_private_key, key_version,
                is_active, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.user_id)
        .bind(&record.public_key)
        .bind(&record.sealed_private_key)
        .bind(record.key_version as i64)
        .bind(record.is_active as i64)
        .bind(format_ts(record.created_at))
        .bind(format_ts(record.updated_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_active_key(&self, user_id: i64) -> LedgerResult<Option<KeyRecord>> {
        let row = sqlx::query_as::<_, UserKeyRow>(
            "SELECT user_id, public_key, encrypted_private_key, key_version, is_active, created_at, updated_at
             FROM user_keys WHERE user_id = ? AND is_active = 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserKeyRow::into_key_record).transpose()
    }

    /// The most recent key row for `user_id` regardless of `is_active` —
    /// used by `get_private` so a deactivated key reports `KeyInactive`
    /// rather than being indistinguishable from "no key at all"
    /// (`KeyMissing` vs `KeyInactive` are different error kinds).
    pub async fn get_latest_key(&self, user_id: i64) -> LedgerResult<Option<KeyRecord>> {
        let row = sqlx::query_as::<_, UserKeyRow>(
            "SELECT user_id, public_key, encrypted_private_key, key_version, is_active, created_at, updated_at
             FROM user_keys WHERE user_id = ? ORDER BY key_version DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserKeyRow::into_key_record).transpose()
    }

    pub async fn get_key_by_version(&self, user_id: i64, key_version: u32) -> LedgerResult<Option<KeyRecord>> {
        let row = sqlx::query_as::<_, UserKeyRow>(
            "SELECT user_id, public_key, encrypted_private_key, key_version, is_active, created_at, updated_at
             FROM user_keys WHERE user_id = ? AND key_version = ?",
        )
        .bind(user_id)
        .bind(key_version as i64)
        .fetch_optional(&self.pool)
        .await?;
        row.map(UserKeyRow::into_key_record).transpose()
    }

    pub async fn deactivate_key(&self, user_id: i64) -> LedgerResult<bool> {
        let result = sqlx::query("UPDATE user_keys SET is_active = 0, updated_at = ? WHERE user_id = ? AND is_active = 1")
            .bind(format_ts(Utc::now()))
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn reactivate_key(&self, user_id: i64, key_version: u32) -> LedgerResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE user_keys SET is_active = 0, updated_at = ? WHERE user_id = ? AND is_active = 1")
            .bind(format_ts(Utc::now()))
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(
            "UPDATE user_keys SET is_active = 1, updated_at = ? WHERE user_id = ? AND key_version = ?",
        )
        .bind(format_ts(Utc::now()))
        .bind(user_id)
        .bind(key_version as i64)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn has_active_key(&self, user_id: i64) -> LedgerResult<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM user_keys WHERE user_id = ? AND is_active = 1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? > 0)
    }

    pub async fn key_version_count(&self, user_id: i64) -> LedgerResult<u32> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM user_keys WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")? as u32)
    }
}
