//! `ledgerchain` — the application-embedded supply-chain ledger. Ties
//! the crates below it together into one `LedgerHandle`: the
//! single-writer chain engine, the sealed key store, and the background
//! integrity supervisor.
//!
//! Most embedders construct one `LedgerHandle` directly with
//! `LedgerHandle::new` and hold onto it (an `Arc` if shared across
//! tasks). `initialize`/`handle` are a convenience for the common case
//! of one ledger per process: a global, lazily-addressable singleton
//! that rejects a second `initialize` call outright rather than letting
//! two independent chains run against the same database.

mod config;
mod handle;
mod health;

pub use config::LedgerConfig;
pub use handle::{
    AddTransactionOutcome, ChainStats, EnrichedTransaction, LedgerHandle, ReloadOutcome,
    ResetOutcome, TransactionRequest,
};
pub use health::{HealthReport, HealthSupervisor};

use std::sync::Arc;

use ledgerchain_core::{LedgerError, LedgerResult};
use once_cell::sync::OnceCell;

static INSTANCE: OnceCell<Arc<LedgerHandle>> = OnceCell::new();

/// Build the process-wide `LedgerHandle` and publish it. Returns
/// `LedgerError::AlreadyInitialized` if a handle is already published —
/// callers that want an independent instance (tests, the demo CLI's
/// subcommands) should use `LedgerHandle::new` directly instead.
pub async fn initialize(config: LedgerConfig) -> LedgerResult<Arc<LedgerHandle>> {
    if INSTANCE.get().is_some() {
        return Err(LedgerError::AlreadyInitialized);
    }
    let handle = Arc::new(LedgerHandle::new(config).await?);
    INSTANCE
        .set(handle.clone())
        .map_err(|_| LedgerError::AlreadyInitialized)?;
    Ok(handle)
}

/// Fetch the process-wide `LedgerHandle` published by `initialize`.
pub fn handle() -> LedgerResult<Arc<LedgerHandle>> {
    INSTANCE
        .get()
        .cloned()
        .ok_or_else(|| LedgerError::NotFound("ledger not initialized".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerchain_core::TransactionType;
    use serde_json::json;

    async fn ledger() -> LedgerHandle {
        LedgerHandle::new(LedgerConfig::default()).await.unwrap()
    }

    fn request(batch_no: &str, actor_user_id: i64) -> TransactionRequest {
        let mut data = ledgerchain_core::JsonMap::new();
        data.insert("type_of_fertilizer".into(), json!("organic-compost"));
        TransactionRequest {
            transaction_type: TransactionType::BatchCreate,
            batch_no: batch_no.to_string(),
            actor_user_id,
            actor_role: "farmer".into(),
            transaction_data: data,
            from_entity_id: None,
            to_entity_id: Some(3),
            document_hashes: None,
        }
    }

    #[tokio::test]
    async fn submitting_without_a_key_fails_with_key_missing() {
        let ledger = ledger().await;
        let err = ledger.submit_transaction(request("BATCH001", 42)).await.unwrap_err();
        assert!(matches!(err, LedgerError::KeyMissing(42)));
    }

    #[tokio::test]
    async fn submit_then_force_seal_by_a_registered_validator() {
        let ledger = ledger().await;
        ledger.generate_key(7).await.unwrap();
        ledger.generate_key(1).await.unwrap();

        let outcome = ledger.submit_transaction(request("BATCH001", 7)).await.unwrap();
        assert!(outcome.block.is_none());
        assert_eq!(outcome.pending, 1);

        assert!(ledger.is_validator(1).await);
        let block = ledger.seal(Some(1)).await.unwrap().unwrap();
        assert_eq!(block.validator_user_id, Some(1));
        assert!(block.validator_signature.is_some());

        let stats = ledger.get_stats().await;
        assert_eq!(stats.block_count, 2); // genesis + this block
        assert_eq!(stats.pending_count, 0);
        assert_eq!(stats.total_transactions, 1);
    }

    #[tokio::test]
    async fn sealing_as_an_unregistered_validator_is_rejected() {
        let ledger = ledger().await;
        ledger.generate_key(7).await.unwrap();
        ledger.submit_transaction(request("BATCH001", 7)).await.unwrap();
        let err = ledger.seal(Some(999)).await.unwrap_err();
        assert!(matches!(err, LedgerError::OperatorOnly));
    }

    #[tokio::test]
    async fn batch_history_is_populated_only_after_sealing() {
        let ledger = ledger().await;
        ledger.generate_key(7).await.unwrap();
        ledger.submit_transaction(request("BATCH001", 7)).await.unwrap();
        assert!(ledger.get_batch_history("BATCH001").await.is_empty());

        ledger.seal(None).await.unwrap();
        let history = ledger.get_batch_history("BATCH001").await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].block_number, 1);

        let refs = ledger.get_batch_reference("BATCH001").await.unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].transaction_hash, history[0].transaction.hash);
    }

    #[tokio::test]
    async fn validate_chain_and_get_health_agree_on_a_fresh_ledger() {
        let ledger = ledger().await;
        assert!(ledger.validate_chain().await);
        let report = ledger.get_health().await;
        assert!(report.passed);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn reset_without_operator_flag_is_rejected() {
        let ledger = ledger().await;
        let err = ledger.reset(false).await.unwrap_err();
        assert!(matches!(err, LedgerError::OperatorOnly));
    }

    #[tokio::test]
    async fn reset_clears_the_chain_and_restores_default_validators() {
        let ledger = ledger().await;
        ledger.generate_key(7).await.unwrap();
        ledger.submit_transaction(request("BATCH001", 7)).await.unwrap();
        ledger.seal(None).await.unwrap();
        assert_eq!(ledger.get_stats().await.block_count, 2);

        let outcome = ledger.reset(true).await.unwrap();
        assert_eq!(outcome.blocks, 1);
        assert!(ledger.is_validator(1).await);
        assert!(ledger.get_batch_history("BATCH001").await.is_empty());
    }

    #[tokio::test]
    async fn reload_chain_rebuilds_in_memory_state_from_the_store() {
        let ledger = ledger().await;
        ledger.generate_key(7).await.unwrap();
        ledger.submit_transaction(request("BATCH001", 7)).await.unwrap();
        ledger.seal(None).await.unwrap();

        let outcome = ledger.reload_chain().await.unwrap();
        assert_eq!(outcome.blocks, 2);
        assert!(outcome.valid);
        assert_eq!(ledger.get_stats().await.pending_count, 0);
    }

    /// Reload determinism: after sealing, the in-memory chain
    /// `reload_chain` rebuilds from the store must be byte-for-byte
    /// identical to the chain as it stood before the reload.
    #[tokio::test]
    async fn reload_reproduces_an_identical_chain_byte_for_byte() {
        let ledger = ledger().await;
        ledger.generate_key(7).await.unwrap();
        ledger.submit_transaction(request("BATCH001", 7)).await.unwrap();
        ledger.seal(None).await.unwrap();
        ledger.submit_transaction(request("BATCH002", 7)).await.unwrap();
        ledger.seal(None).await.unwrap();

        let before = ledger.get_all_blocks().await;
        ledger.reload_chain().await.unwrap();
        let after = ledger.get_all_blocks().await;

        assert_eq!(
            serde_json::to_string(&before).unwrap(),
            serde_json::to_string(&after).unwrap()
        );
    }

    #[tokio::test]
    async fn global_singleton_rejects_a_second_initialization() {
        let first = initialize(LedgerConfig::default()).await.expect("first call succeeds");
        let second = initialize(LedgerConfig::default()).await;
        assert!(matches!(second, Err(LedgerError::AlreadyInitialized)));
        assert!(Arc::ptr_eq(&first, &handle().unwrap()));
    }
}
