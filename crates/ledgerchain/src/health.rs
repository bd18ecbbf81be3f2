//! The background health supervisor: periodically re-checks that the
//! in-memory chain and the durable store still agree.
//!
//! Runs on its own `tokio::time::interval` task so a slow or wedged
//! caller of [`crate::LedgerHandle`] never delays the check. The chain
//! mutex is only held for the comparison itself (and, on failure, for
//! the recovery reload) — never across the sleep.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ledgerchain_consensus::ChainEngine;
use ledgerchain_store::StateStore;

/// The outcome of one integrity pass, cached for [`crate::LedgerHandle::get_health`].
#[derive(Clone, Debug)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub passed: bool,
    pub issues: Vec<String>,
    /// Set when `passed` is false and an auto-recovery reload was
    /// attempted in response.
    pub recovery_attempted: bool,
}

/// A background task that periodically re-derives [`HealthReport`] and,
/// on failure, triggers [`ChainEngine::reload`].
pub struct HealthSupervisor {
    task: JoinHandle<()>,
}

impl HealthSupervisor {
    pub fn spawn(
        engine: Arc<Mutex<ChainEngine>>,
        report: Arc<Mutex<Option<HealthReport>>>,
        interval_secs: u64,
        strict: bool,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            loop {
                ticker.tick().await;
                let outcome = run_check(&engine, strict).await;
                let final_report = if outcome.passed {
                    outcome
                } else {
                    warn!(issues = ?outcome.issues, "chain integrity check failed, attempting recovery");
                    {
                        let mut guard = engine.lock().await;
                        if let Err(e) = guard.reload().await {
                            error!(error = %e, "auto-recovery reload failed");
                        }
                    }
                    let mut recovered = run_check(&engine, strict).await;
                    recovered.recovery_attempted = true;
                    if recovered.passed {
                        info!("auto-recovery restored chain integrity");
                    } else {
                        error!(issues = ?recovered.issues, "chain still inconsistent after auto-recovery");
                    }
                    recovered
                };
                *report.lock().await = Some(final_report);
            }
        });
        Self { task }
    }

    /// Cancel the background loop. Dropping a `HealthSupervisor` without
    /// calling this leaves the task running detached — `LedgerHandle::
    /// shutdown` always calls this explicitly instead of relying on drop.
    pub fn stop(self) {
        self.task.abort();
    }
}

/// One integrity pass: validate the in-memory chain, compare its block
/// count against the store, and compare the stored tip's hash against
/// the in-memory tip. Takes the engine lock only for the duration of
/// the in-memory checks and the two cheap store round-trips.
async fn run_check(engine: &Arc<Mutex<ChainEngine>>, strict: bool) -> HealthReport {
    let start = Instant::now();
    let mut issues = Vec::new();

    let (in_memory_len, tip_hash, store): (u64, Option<String>, StateStore) = {
        let guard = engine.lock().await;
        if let Err(e) = guard.validate_chain(strict) {
            issues.push(e.to_string());
        }
        (
            guard.chain_len(),
            guard.tip().map(|b| b.hash.clone()),
            guard.store().clone(),
        )
    };

    match store.count_blocks().await {
        Ok(stored_len) if stored_len != in_memory_len => {
            issues.push(format!(
                "store has {stored_len} blocks, in-memory chain has {in_memory_len}"
            ));
        }
        Err(e) => issues.push(format!("failed to count stored blocks: {e}")),
        _ => {}
    }

    if let Some(tip_hash) = tip_hash {
        match store.get_block_row_by_number(in_memory_len.saturating_sub(1)).await {
            Ok(Some(row)) if row.block_hash != tip_hash => {
                issues.push(format!(
                    "stored tip block {} has hash {} but in-memory tip is {tip_hash}",
                    in_memory_len.saturating_sub(1),
                    row.block_hash
                ));
            }
            Ok(None) => issues.push("stored tip block is missing".to_string()),
            Err(e) => issues.push(format!("failed to read stored tip block: {e}")),
            _ => {}
        }
    }

    HealthReport {
        checked_at: Utc::now(),
        duration_ms: start.elapsed().as_millis() as u64,
        passed: issues.is_empty(),
        issues,
        recovery_attempted: false,
    }
}

/// Run one integrity pass on demand — used by `LedgerHandle::get_health`
/// the first time it's called, before the background task has ticked.
pub(crate) async fn check_now(engine: &Arc<Mutex<ChainEngine>>, strict: bool) -> HealthReport {
    run_check(engine, strict).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use ledgerchain_consensus::EngineConfig;
    use ledgerchain_core::{Transaction, TransactionDraft, TransactionType};
    use ledgerchain_crypto::{generate_keypair, random_nonce_hex, sha256_hex, sign_hex};

    async fn engine_with_one_sealed_block() -> ChainEngine {
        let store = StateStore::open_in_memory().await.unwrap();
        let reloaded = store.reload_or_bootstrap().await.unwrap();
        let mut config = EngineConfig::default();
        config.initial_difficulty = 1;
        let mut engine =
            ChainEngine::from_reloaded(config, store, reloaded.chain, reloaded.replay_hashes, HashSet::new());

        let pair = generate_keypair();
        let mut data = serde_json::Map::new();
        data.insert("type_of_fertilizer".into(), serde_json::json!("organic-compost"));
        let now = Utc::now();
        let draft = TransactionDraft {
            transaction_type: TransactionType::BatchCreate,
            batch_no: "BATCH001".into(),
            actor_user_id: 7,
            actor_role: "farmer".into(),
            actor_public_key: pair.public_key_hex.clone(),
            transaction_data: data,
            from_entity_id: None,
            to_entity_id: None,
            document_hashes: None,
            timestamp: now,
            nonce: random_nonce_hex(),
        };
        let bytes = ledgerchain_core::canonical::canonical_json_to_string(&Transaction::canonical_payload_of(&draft))
            .into_bytes();
        let hash = sha256_hex(&bytes);
        let signature = sign_hex(&pair.private_key_hex, &bytes).unwrap();
        let tx = Transaction {
            transaction_type: draft.transaction_type,
            batch_no: draft.batch_no,
            actor_user_id: draft.actor_user_id,
            actor_role: draft.actor_role,
            actor_public_key: draft.actor_public_key,
            actor_signature: signature,
            transaction_data: draft.transaction_data,
            from_entity_id: draft.from_entity_id,
            to_entity_id: draft.to_entity_id,
            document_hashes: draft.document_hashes,
            timestamp: draft.timestamp,
            nonce: draft.nonce,
            hash,
        };
        engine.add_transaction(tx, now).await.unwrap();
        engine.seal(None, None, now).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn a_healthy_chain_reports_no_issues() {
        let engine = Arc::new(Mutex::new(engine_with_one_sealed_block().await));
        let report = run_check(&engine, true).await;
        assert!(report.passed);
        assert!(report.issues.is_empty());
    }

    /// Recovery scenario: an external process wipes the store out
    /// from under the in-memory chain. The check must notice the count
    /// mismatch, and `ChainEngine::reload` must restore agreement.
    #[tokio::test]
    async fn store_divergence_is_detected_and_repaired_on_recovery() {
        let engine = Arc::new(Mutex::new(engine_with_one_sealed_block().await));

        {
            let guard = engine.lock().await;
            guard.store().reset_chain().await.unwrap();
        }

        let diverged = run_check(&engine, false).await;
        assert!(!diverged.passed);
        assert!(!diverged.issues.is_empty());

        {
            let mut guard = engine.lock().await;
            guard.reload().await.unwrap();
        }
        let recovered = run_check(&engine, false).await;
        assert!(recovered.passed);
    }
}
