use ledgerchain_consensus::EngineConfig;

/// Everything a host application supplies to embed the ledger. Block
/// size, rate limits, difficulty targets and the health interval all
/// have working defaults but are overridable — tests are the main
/// reason to reach for anything beyond `default()`.
#[derive(Clone, Debug)]
pub struct LedgerConfig {
    /// `sqlx` sqlite connection string, e.g. `sqlite://ledger.db` or
    /// `sqlite::memory:` for a throwaway instance.
    pub database_url: String,
    /// Shared secret used to derive every user's AES-256-GCM sealing
    /// key.
    pub seal_secret: String,
    pub engine: EngineConfig,
    pub health_check_interval_secs: u64,
    /// Default off (trust stored block hashes/Merkle roots on reload);
    /// when on, reload recomputes every block's hash, Merkle root and
    /// validator signature from the stored rows instead.
    pub strict_reload_verification: bool,
    /// Users allowed to seal blocks as a validator. Seeded into the
    /// store's `metadata` table under the `validators` key on first
    /// boot; defaults to `{1}`.
    pub default_validators: Vec<i64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            seal_secret: "change-me".to_string(),
            engine: EngineConfig::default(),
            health_check_interval_secs: ledgerchain_core::constants::HEALTH_CHECK_INTERVAL_SECS,
            strict_reload_verification: false,
            default_validators: vec![1],
        }
    }
}
