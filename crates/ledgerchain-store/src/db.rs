use ledgerchain_core::LedgerResult;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Relational handle for the ledger's durable state.
///
/// One `StateStore` owns one connection pool; every connection the pool
/// hands out has `foreign_keys = ON` set, since SQLite does not enforce
/// foreign keys by default.
#[derive(Clone)]
pub struct StateStore {
    pub(crate) pool: SqlitePool,
}

impl StateStore {
    /// Open (creating if necessary) the SQLite database at `database_url`
    /// and apply any pending migrations.
    ///
    /// `database_url` follows `sqlx`'s sqlite connection-string format,
    /// e.g. `sqlite://ledger.db` or `sqlite::memory:` for tests.
    pub async fn open(database_url: &str) -> LedgerResult<Self> {
        Self::open_with_pool_size(database_url, 8).await
    }

    async fn open_with_pool_size(database_url: &str, max_connections: u32) -> LedgerResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// An in-memory database for tests — here and in every crate above
    /// this one that needs a throwaway store.
    pub async fn open_in_memory() -> LedgerResult<Self> {
        // A pooled `:memory:` database is one database per connection; a
        // single-connection pool keeps every query against the same
        // in-memory database for the life of the store.
        Self::open_with_pool_size("sqlite::memory:", 1).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Delete `batch_refs`, then `transactions`, then `blocks` (FK-safe
    /// deletion order), leaving `user_keys` untouched — a reset
    /// re-bootstraps the chain, not the key material.
    pub async fn reset_chain(&self) -> LedgerResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM batch_refs").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM transactions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM blocks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM metadata").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}
