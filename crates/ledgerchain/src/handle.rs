//! `LedgerHandle` — the single public entry point an embedding
//! application talks to. Wraps one `ChainEngine` behind a
//! `tokio::sync::Mutex` (every state-changing call serializes through
//! this lock, and reads take it too since the engine itself isn't
//! internally synchronized), a `KeyStore` for per-actor signing, and
//! the background `HealthSupervisor`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use ledgerchain_consensus::ChainEngine;
use ledgerchain_core::canonical::canonical_json_to_string;
use ledgerchain_core::{
    Block, BatchRef, JsonMap, KeyRecord, LedgerError, LedgerResult, Stage, Transaction,
    TransactionDraft, TransactionType,
};
use ledgerchain_crypto::{random_nonce_hex, sha256_hex};
use ledgerchain_keystore::{IssuedKey, KeyStore};
use ledgerchain_store::StateStore;

use crate::config::LedgerConfig;
use crate::health::{self, HealthReport, HealthSupervisor};

/// Everything a caller supplies to record one supply-chain event; the
/// handle fills in the actor's public key, nonce, timestamp, hash and
/// signature — those fields are derived, not caller-supplied.
pub struct TransactionRequest {
    pub transaction_type: TransactionType,
    pub batch_no: String,
    pub actor_user_id: i64,
    pub actor_role: String,
    pub transaction_data: JsonMap,
    pub from_entity_id: Option<i64>,
    pub to_entity_id: Option<i64>,
    pub document_hashes: Option<JsonMap>,
}

/// What happened to a submitted transaction: whether it triggered an
/// automatic seal, and how many transactions remain pending afterward.
#[derive(Debug)]
pub struct AddTransactionOutcome {
    pub transaction: Transaction,
    pub block: Option<Block>,
    pub pending: usize,
}

/// One entry of `get_batch_history` — a recorded transaction alongside
/// the coarse stage it belongs to and the block that sealed it.
#[derive(Clone, Debug)]
pub struct EnrichedTransaction {
    pub transaction: Transaction,
    pub stage: Stage,
    pub block_number: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct ChainStats {
    pub block_count: u64,
    pub pending_count: usize,
    pub current_difficulty: u32,
    pub total_transactions: u64,
    pub validator_count: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct ReloadOutcome {
    pub blocks: u64,
    pub valid: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct ResetOutcome {
    pub blocks: u64,
}

/// The embedded ledger. Open one per process (or via `ledgerchain::
/// initialize`/`ledgerchain::handle` for the shared-singleton form) and
/// keep it alive for the lifetime of the embedding application.
pub struct LedgerHandle {
    config: LedgerConfig,
    engine: Arc<Mutex<ChainEngine>>,
    keystore: Arc<KeyStore>,
    store: StateStore,
    health_report: Arc<Mutex<Option<HealthReport>>>,
    health_supervisor: HealthSupervisor,
}

impl LedgerHandle {
    /// Open the store, reload (or bootstrap) the chain, restore the
    /// validator set, and start the health supervisor. Fails fast if the
    /// reloaded chain doesn't already satisfy its own invariants — a
    /// corrupt store is surfaced at startup rather than discovered on
    /// the first integrity tick.
    pub async fn new(config: LedgerConfig) -> LedgerResult<Self> {
        let store = StateStore::open(&config.database_url).await?;
        let reloaded = store.reload_or_bootstrap().await?;

        let validators: HashSet<i64> = match store.get_metadata("validators").await? {
            Some(json) => serde_json::from_str::<Vec<i64>>(&json)
                .map_err(|e| LedgerError::Serialization(e.to_string()))?
                .into_iter()
                .collect(),
            None => {
                let defaults = config.default_validators.clone();
                let json = serde_json::to_string(&defaults)
                    .map_err(|e| LedgerError::Serialization(e.to_string()))?;
                store
                    .put_metadata("validators", &json, Some("users allowed to seal as a validator"))
                    .await?;
                defaults.into_iter().collect()
            }
        };

        let engine = ChainEngine::from_reloaded(
            config.engine.clone(),
            store.clone(),
            reloaded.chain,
            reloaded.replay_hashes,
            validators,
        );
        engine.validate_chain(config.strict_reload_verification)?;

        let keystore = Arc::new(KeyStore::new(store.clone(), config.seal_secret.clone()));
        let engine = Arc::new(Mutex::new(engine));
        let health_report = Arc::new(Mutex::new(None));
        let health_supervisor = HealthSupervisor::spawn(
            engine.clone(),
            health_report.clone(),
            config.health_check_interval_secs,
            config.strict_reload_verification,
        );

        Ok(Self {
            config,
            engine,
            keystore,
            store,
            health_report,
            health_supervisor,
        })
    }

    /// Default-configured `EngineConfig`'s default validator set and a
    /// fresh default `LedgerConfig`, wired together — shorthand for
    /// tests and the demo CLI.
    pub async fn in_memory() -> LedgerResult<Self> {
        Self::new(LedgerConfig::default()).await
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Record a new supply-chain event. Builds the canonical payload,
    /// signs it with the actor's active key, and admits it to the
    /// pending pool — sealing automatically if the pool reaches
    /// `block_size`.
    pub async fn submit_transaction(&self, request: TransactionRequest) -> LedgerResult<AddTransactionOutcome> {
        let now = Utc::now();
        let record = self.keystore.get_active_record(request.actor_user_id).await?;

        let draft = TransactionDraft {
            transaction_type: request.transaction_type,
            batch_no: request.batch_no,
            actor_user_id: request.actor_user_id,
            actor_role: request.actor_role,
            actor_public_key: record.public_key,
            transaction_data: request.transaction_data,
            from_entity_id: request.from_entity_id,
            to_entity_id: request.to_entity_id,
            document_hashes: request.document_hashes,
            timestamp: now,
            nonce: random_nonce_hex(),
        };
        let bytes = canonical_json_to_string(&Transaction::canonical_payload_of(&draft)).into_bytes();
        let hash = sha256_hex(&bytes);
        let signature = self.keystore.sign(request.actor_user_id, &bytes).await?;

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

        let mut engine = self.engine.lock().await;
        let outcome = engine.add_transaction(tx.clone(), now).await?;
        Ok(AddTransactionOutcome {
            transaction: tx,
            block: outcome.auto_sealed,
            pending: engine.pending_len(),
        })
    }

    /// Force-seal the pending pool. With `validator_user_id`, the
    /// caller must already be a registered validator holding an active
    /// key — the resulting block carries its signature. Returns
    /// `Ok(None)` if there was nothing pending.
    pub async fn seal(&self, validator_user_id: Option<i64>) -> LedgerResult<Option<Block>> {
        let now = Utc::now();
        let mut engine = self.engine.lock().await;
        match validator_user_id {
            Some(user_id) => {
                if !engine.is_validator(user_id) {
                    return Err(LedgerError::OperatorOnly);
                }
                let public_key = self.keystore.get_public(user_id).await?;
                engine
                    .seal(Some((user_id, public_key)), Some(self.keystore.as_ref()), now)
                    .await
            }
            None => engine.seal(None, None, now).await,
        }
    }

    /// The full, timestamp-ordered provenance trail for a batch, built
    /// from the in-memory chain — every already-sealed transaction
    /// whose `batch_no` matches, alongside its stage and block number.
    pub async fn get_batch_history(&self, batch_no: &str) -> Vec<EnrichedTransaction> {
        let engine = self.engine.lock().await;
        let mut entries: Vec<EnrichedTransaction> = engine
            .chain_snapshot()
            .iter()
            .flat_map(|block| {
                block
                    .transactions
                    .iter()
                    .filter(|t| t.batch_no == batch_no)
                    .map(move |t| EnrichedTransaction {
                        transaction: t.clone(),
                        stage: Stage::from(t.transaction_type),
                        block_number: block.block_number,
                    })
            })
            .collect();
        entries.sort_by_key(|e| e.transaction.timestamp);
        entries
    }

    /// The raw `batch_refs` secondary-index rows for a batch — the same
    /// data `get_batch_history` derives from the in-memory chain, but
    /// read straight from the store.
    pub async fn get_batch_reference(&self, batch_no: &str) -> LedgerResult<Vec<BatchRef>> {
        self.store.get_batch_history(batch_no).await
    }

    /// Full chain validation. Strictness follows
    /// `strict_reload_verification`, off by default and only on for
    /// callers who opted into audit-grade verification.
    pub async fn validate_chain(&self) -> bool {
        let engine = self.engine.lock().await;
        engine.validate_chain(self.config.strict_reload_verification).is_ok()
    }

    pub async fn get_stats(&self) -> ChainStats {
        let engine = self.engine.lock().await;
        let total_transactions = engine.chain_snapshot().iter().map(|b| b.transactions.len() as u64).sum();
        ChainStats {
            block_count: engine.chain_len(),
            pending_count: engine.pending_len(),
            current_difficulty: engine.tip().map(|b| b.difficulty).unwrap_or(self.config.engine.initial_difficulty),
            total_transactions,
            validator_count: engine.validators().len(),
        }
    }

    /// The most recent integrity report, running one on demand if the
    /// background supervisor hasn't ticked yet.
    pub async fn get_health(&self) -> HealthReport {
        if let Some(report) = self.health_report.lock().await.clone() {
            return report;
        }
        health::check_now(&self.engine, self.config.strict_reload_verification).await
    }

    pub async fn get_all_blocks(&self) -> Vec<Block> {
        self.engine.lock().await.chain_snapshot().to_vec()
    }

    pub async fn get_all_transactions(&self) -> Vec<Transaction> {
        self.engine
            .lock()
            .await
            .chain_snapshot()
            .iter()
            .flat_map(|b| b.transactions.clone())
            .collect()
    }

    pub async fn get_block(&self, block_number: u64) -> Option<Block> {
        self.engine.lock().await.get_block_by_number(block_number).cloned()
    }

    pub async fn get_block_by_hash(&self, hash: &str) -> Option<Block> {
        self.engine.lock().await.get_block_by_hash(hash).cloned()
    }

    pub async fn get_transaction(&self, hash: &str) -> Option<Transaction> {
        self.engine.lock().await.get_transaction_by_hash(hash).cloned()
    }

    /// Drop the in-memory chain and rebuild it from the store — the
    /// same startup-reload path, reused here as an operator-triggerable
    /// recovery action distinct from the background supervisor's own
    /// automatic reload.
    pub async fn reload_chain(&self) -> LedgerResult<ReloadOutcome> {
        let mut engine = self.engine.lock().await;
        engine.reload().await?;
        let valid = engine.validate_chain(self.config.strict_reload_verification).is_ok();
        Ok(ReloadOutcome {
            blocks: engine.chain_len(),
            valid,
        })
    }

    /// Wipe every block, transaction and batch reference and
    /// re-bootstrap genesis. Key material is left
    /// untouched. `is_operator` stands in for the embedding
    /// application's own admin-identity check — this crate has no
    /// notion of roles or sessions, so it trusts the caller's assertion.
    pub async fn reset(&self, is_operator: bool) -> LedgerResult<ResetOutcome> {
        if !is_operator {
            return Err(LedgerError::OperatorOnly);
        }
        self.store.reset_chain().await?;

        let mut engine = self.engine.lock().await;
        engine.reload().await?;
        engine.clear_rate_limits();
        for user_id in self.config.default_validators.clone() {
            engine.add_validator(user_id);
        }
        self.persist_validators(&engine).await?;
        Ok(ResetOutcome { blocks: engine.chain_len() })
    }

    pub async fn add_validator(&self, user_id: i64) -> LedgerResult<()> {
        let mut engine = self.engine.lock().await;
        engine.add_validator(user_id);
        self.persist_validators(&engine).await
    }

    pub async fn is_validator(&self, user_id: i64) -> bool {
        self.engine.lock().await.is_validator(user_id)
    }

    pub async fn clear_rate_limits(&self) {
        self.engine.lock().await.clear_rate_limits();
    }

    async fn persist_validators(&self, engine: &ChainEngine) -> LedgerResult<()> {
        let validators: Vec<i64> = engine.validators().iter().copied().collect();
        let json = serde_json::to_string(&validators).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        self.store
            .put_metadata("validators", &json, Some("users allowed to seal as a validator"))
            .await
    }

    pub async fn generate_key(&self, user_id: i64) -> LedgerResult<IssuedKey> {
        self.keystore.generate(user_id).await
    }

    pub async fn rotate_key(&self, user_id: i64) -> LedgerResult<IssuedKey> {
        self.keystore.rotate(user_id).await
    }

    pub async fn get_public_key(&self, user_id: i64) -> LedgerResult<String> {
        self.keystore.get_public(user_id).await
    }

    pub async fn get_key_info(&self, user_id: i64) -> LedgerResult<Option<KeyRecord>> {
        self.keystore.get_info(user_id).await
    }

    pub async fn deactivate_key(&self, user_id: i64) -> LedgerResult<bool> {
        self.keystore.deactivate(user_id).await
    }

    pub async fn reactivate_key(&self, user_id: i64, key_version: u32) -> LedgerResult<bool> {
        self.keystore.reactivate(user_id, key_version).await
    }

    /// Stop the health supervisor and close the pool. Consumes `self`
    /// so an embedding application can't keep issuing calls against a
    /// handle it just shut down.
    pub async fn shutdown(self) {
        self.health_supervisor.stop();
        self.store.pool().close().await;
    }
}
