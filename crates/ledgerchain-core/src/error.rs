use thiserror::Error;

/// Every error kind surfaced by the ledger core.
///
/// The core never swallows an error: every fallible operation returns one
/// of these variants (or a caller-visible `Option`/`bool` for pure
/// queries), and every variant is logged at its origin before being
/// propagated.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("transaction already seen (replay): {hash}")]
    Replay { hash: String },

    #[error("rate limit exceeded for actor {actor_user_id} ({max} txs / {window_secs}s)")]
    RateLimited {
        actor_user_id: i64,
        max: u32,
        window_secs: i64,
    },

    #[error("no key record for user {0}")]
    KeyMissing(i64),

    #[error("key for user {0} is deactivated")]
    KeyInactive(i64),

    #[error("failed to decrypt sealed private key for user {0}")]
    DecryptFailed(i64),

    #[error("persistence failed: {0}")]
    PersistenceFailed(#[source] sqlx::Error),

    #[error("chain integrity check failed: {0}")]
    IntegrityFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operator-only action requires an admin identity")]
    OperatorOnly,

    #[error("ledger already initialized")]
    AlreadyInitialized,

    #[error("cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

// sqlx::Error doesn't implement Clone, so route explicit construction
// through a helper instead of a bare `#[from]` at call sites that need to
// keep the original error alive for logging before converting.
impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::PersistenceFailed(e)
    }
}

impl From<sqlx::migrate::MigrateError> for LedgerError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        LedgerError::PersistenceFailed(sqlx::Error::Migrate(Box::new(e)))
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
