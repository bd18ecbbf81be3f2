//! `ChainEngine` — admission, sealing, difficulty adjustment and chain
//! validation. Owns the pending pool, replay set, rate counters and
//! validator set. This type itself is not internally synchronized;
//! callers serialize all access through a single mutex.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use ledgerchain_core::constants::{
    ADJUST_EVERY, BLOCK_SIZE, GENESIS_PREVIOUS_HASH, INITIAL_DIFFICULTY, MIN_DIFFICULTY,
    RATE_MAX, RATE_WINDOW_SECS, TARGET_BLOCK_TIME_SECS,
};
use ledgerchain_core::merkle::merkle_root_hex;
use ledgerchain_core::{Block, LedgerError, LedgerResult, Transaction};
use ledgerchain_crypto::{hash_meets_difficulty, sha256_hex, verify_hex};
use ledgerchain_keystore::KeyStore;
use ledgerchain_store::{recomputed_block_hash, StateStore};

use crate::block::BlockBuilder;

/// Every tunable the engine needs, injectable so tests don't have to
/// wait on wall-clock time or soak through 5000-transaction blocks.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub block_size: usize,
    pub initial_difficulty: u32,
    pub target_block_time_secs: i64,
    pub adjust_every: u64,
    pub rate_window_secs: i64,
    pub rate_max: u32,
    pub min_difficulty: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            initial_difficulty: INITIAL_DIFFICULTY,
            target_block_time_secs: TARGET_BLOCK_TIME_SECS,
            adjust_every: ADJUST_EVERY,
            rate_window_secs: RATE_WINDOW_SECS,
            rate_max: RATE_MAX,
            min_difficulty: MIN_DIFFICULTY,
        }
    }
}

/// The in-memory chain engine. Construct via `ChainEngine::reload` so
/// the pending pool, replay set and chain all start consistent with the
/// store.
pub struct ChainEngine {
    config: EngineConfig,
    store: StateStore,
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    replay_set: HashSet<String>,
    rate_counters: HashMap<i64, VecDeque<DateTime<Utc>>>,
    validators: HashSet<i64>,
    current_difficulty: u32,
}

/// What happened to a transaction admitted via `add_transaction`.
#[derive(Debug)]
pub struct AdmissionOutcome {
    pub auto_sealed: Option<Block>,
}

impl ChainEngine {
    /// Build an engine from an already-reloaded (or freshly bootstrapped)
    /// chain — see `ledgerchain_store::StateStore::reload_or_bootstrap`.
    pub fn from_reloaded(
        config: EngineConfig,
        store: StateStore,
        chain: Vec<Block>,
        replay_hashes: HashSet<String>,
        validators: HashSet<i64>,
    ) -> Self {
        let current_difficulty = tip_difficulty(&chain, config.initial_difficulty);
        Self {
            config,
            store,
            chain,
            pending: Vec::new(),
            replay_set: replay_hashes,
            rate_counters: HashMap::new(),
            validators,
            current_difficulty,
        }
    }

    pub fn tip(&self) -> Option<&Block> {
        self.chain.last()
    }

    pub fn chain_len(&self) -> u64 {
        self.chain.len() as u64
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn add_validator(&mut self, user_id: i64) {
        self.validators.insert(user_id);
    }

    pub fn is_validator(&self, user_id: i64) -> bool {
        self.validators.contains(&user_id)
    }

    pub fn validators(&self) -> &HashSet<i64> {
        &self.validators
    }

    pub fn clear_rate_limits(&mut self) {
        self.rate_counters.clear();
    }

    /// Admission pipeline. `tx` must already carry its computed `hash`
    /// and `actor_signature` — this engine never signs on a caller's
    /// behalf.
    pub async fn add_transaction(&mut self, tx: Transaction, now: DateTime<Utc>) -> LedgerResult<AdmissionOutcome> {
        self.validate_transaction(&tx, now)?;

        if self.replay_set.contains(&tx.hash) {
            return Err(LedgerError::Replay { hash: tx.hash.clone() });
        }

        self.check_and_bump_rate(tx.actor_user_id, now)?;

        self.replay_set.insert(tx.hash.clone());
        self.pending.push(tx);

        let auto_sealed = if self.pending.len() >= self.config.block_size {
            self.seal(None, None, now).await?
        } else {
            None
        };

        Ok(AdmissionOutcome { auto_sealed })
    }

    fn validate_transaction(&self, tx: &Transaction, now: DateTime<Utc>) -> LedgerResult<()> {
        let expected_hash = sha256_hex(&tx.canonical_bytes());
        if expected_hash != tx.hash {
            return Err(LedgerError::InvalidTransaction(format!(
                "hash mismatch: stored {} computed {}",
                tx.hash, expected_hash
            )));
        }
        if !verify_hex(&tx.actor_public_key, &tx.canonical_bytes(), &tx.actor_signature) {
            return Err(LedgerError::InvalidTransaction(
                "actor signature does not verify".into(),
            ));
        }
        match tx.check_timestamp(now) {
            Ok(true) => warn!(batch_no = %tx.batch_no, "stale transaction timestamp accepted"),
            Ok(false) => {}
            Err(reason) => return Err(LedgerError::InvalidTransaction(reason)),
        }
        Ok(())
    }

    fn check_and_bump_rate(&mut self, actor_user_id: i64, now: DateTime<Utc>) -> LedgerResult<()> {
        let window = self.config.rate_window_secs;
        let counter = self.rate_counters.entry(actor_user_id).or_default();
        while let Some(&front) = counter.front() {
            if (now - front).num_seconds() > window {
                counter.pop_front();
            } else {
                break;
            }
        }
        if counter.len() as u32 >= self.config.rate_max {
            return Err(LedgerError::RateLimited {
                actor_user_id,
                max: self.config.rate_max,
                window_secs: window,
            });
        }
        counter.push_back(now);
        Ok(())
    }

    /// Sealing. Returns `None` if the pending pool is empty.
    /// `validator`, if given, must already hold an active keystore key
    /// — callers pass the keystore's public key alongside its user id.
    /// When `keystore` is also given, the mined block is signed before
    /// being persisted; without a keystore the block carries the
    /// validator's identity in its hash but no signature.
    pub async fn seal(
        &mut self,
        validator: Option<(i64, String)>,
        keystore: Option<&KeyStore>,
        now: DateTime<Utc>,
    ) -> LedgerResult<Option<Block>> {
        if self.pending.is_empty() {
            return Ok(None);
        }

        let block_number = self.chain_len();
        let previous_hash = self
            .tip()
            .map(|b| b.hash.clone())
            .unwrap_or_else(|| GENESIS_PREVIOUS_HASH.to_string());

        let difficulty = self.next_difficulty(block_number);

        let take = self.pending.len().min(self.config.block_size);
        let batch: Vec<Transaction> = self.pending.drain(..take).collect();

        let mut builder = BlockBuilder::new(block_number, previous_hash, batch.clone(), difficulty, now);
        if let Some((validator_id, validator_public_key)) = validator.clone() {
            builder = builder.with_validator(validator_id, validator_public_key);
        }
        let mut mined = builder.mine();

        if let (Some((validator_id, _)), Some(keystore)) = (validator.as_ref(), keystore) {
            if let Some(payload) = mined.validator_signing_bytes() {
                match keystore.sign(*validator_id, &payload).await {
                    Ok(signature) => mined = mined.sign(signature),
                    Err(e) => {
                        // Persistence hasn't happened yet — restore the
                        // pending pool and surface the signing failure.
                        for tx in batch.into_iter().rev() {
                            self.pending.insert(0, tx);
                        }
                        return Err(e);
                    }
                }
            }
        }

        let block = mined.into_block();

        match self.store.put_sealed_block(&block, None).await {
            Ok(_) => {
                self.chain.push(block.clone());
                self.current_difficulty = difficulty;
                info!(block_number, difficulty, transactions = block.transactions.len(), "sealed block");
                Ok(Some(block))
            }
            Err(e) => {
                // Persistence failed: restore the pending pool so the
                // chain never leads the store.
                for tx in batch.into_iter().rev() {
                    self.pending.insert(0, tx);
                }
                Err(e)
            }
        }
    }

    /// Δt is measured between the first and last block of the previous
    /// adjustment window — both already-sealed blocks, not the
    /// timestamp of the block currently being assembled.
    fn next_difficulty(&self, block_number: u64) -> u32 {
        if block_number == 0 || block_number % self.config.adjust_every != 0 {
            return self.current_difficulty;
        }
        let window = self.config.adjust_every as usize;
        if self.chain.len() < window {
            return self.current_difficulty;
        }
        let window_start = &self.chain[self.chain.len() - window];
        let window_end = self.chain.last().expect("non-empty chain checked above");
        let delta = (window_end.timestamp - window_start.timestamp).num_seconds().max(0);
        let expected = self.config.target_block_time_secs * self.config.adjust_every as i64;

        if delta < expected / 2 {
            self.current_difficulty + 1
        } else if delta > expected * 2 {
            self.current_difficulty.saturating_sub(1).max(self.config.min_difficulty)
        } else {
            self.current_difficulty
        }
    }

    /// Full chain validation.
    ///
    /// When `strict` is false (the default), trusts stored `hash`/
    /// `merkle_root` values and only checks the cross-block invariants
    /// (monotonic numbering, `previous_hash` linkage). When `strict` is
    /// true, every block's hash and Merkle root — and validator
    /// signature, if present — are recomputed from the stored rows and
    /// a mismatch is `IntegrityFailed` rather than a silent accept.
    pub fn validate_chain(&self, strict: bool) -> LedgerResult<()> {
        if self.chain.is_empty() {
            return Err(LedgerError::IntegrityFailed("chain has no genesis block".into()));
        }
        let genesis = &self.chain[0];
        if genesis.block_number != 0 || genesis.previous_hash != GENESIS_PREVIOUS_HASH {
            return Err(LedgerError::IntegrityFailed(
                "genesis block malformed".into(),
            ));
        }

        for (i, block) in self.chain.iter().enumerate() {
            if block.block_number != i as u64 {
                return Err(LedgerError::IntegrityFailed(format!(
                    "block number gap at index {i}"
                )));
            }
            if i > 0 {
                let prev = &self.chain[i - 1];
                if block.previous_hash != prev.hash {
                    return Err(LedgerError::IntegrityFailed(format!(
                        "block {} previous_hash does not match block {}'s hash",
                        block.block_number, prev.block_number
                    )));
                }
                if !hash_meets_difficulty(&block.hash, block.difficulty) {
                    return Err(LedgerError::IntegrityFailed(format!(
                        "block {} hash does not meet its recorded difficulty",
                        block.block_number
                    )));
                }
            }

            if strict {
                self.verify_block_strict(block)?;
            }
        }
        Ok(())
    }

    fn verify_block_strict(&self, block: &Block) -> LedgerResult<()> {
        let tx_hashes: Vec<&str> = block.transactions.iter().map(|t| t.hash.as_str()).collect();
        let recomputed_merkle = merkle_root_hex(&tx_hashes);
        if recomputed_merkle != block.merkle_root {
            return Err(LedgerError::IntegrityFailed(format!(
                "block {} merkle_root does not match its transactions",
                block.block_number
            )));
        }

        let recomputed_hash = recomputed_block_hash(block);
        if recomputed_hash != block.hash {
            return Err(LedgerError::IntegrityFailed(format!(
                "block {} hash does not match its recomputed identity",
                block.block_number
            )));
        }

        if let (Some(signature), Some(public_key)) = (&block.validator_signature, &block.validator_public_key) {
            if !verify_hex(public_key, &block.validator_signing_bytes(), signature) {
                return Err(LedgerError::IntegrityFailed(format!(
                    "block {} validator signature does not verify",
                    block.block_number
                )));
            }
        }
        Ok(())
    }

    pub fn chain_snapshot(&self) -> &[Block] {
        &self.chain
    }

    pub fn get_block_by_number(&self, block_number: u64) -> Option<&Block> {
        self.chain.iter().find(|b| b.block_number == block_number)
    }

    pub fn get_block_by_hash(&self, hash: &str) -> Option<&Block> {
        self.chain.iter().find(|b| b.hash == hash)
    }

    pub fn get_transaction_by_hash(&self, hash: &str) -> Option<&Transaction> {
        self.chain
            .iter()
            .flat_map(|b| b.transactions.iter())
            .find(|t| t.hash == hash)
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Auto-recovery: drop the in-memory chain, pending pool and
    /// replay set, then reload from the store. Any transactions still
    /// in the pending pool at the moment of recovery are lost — they
    /// were never persisted, so the store has no record of them
    /// either.
    pub async fn reload(&mut self) -> LedgerResult<()> {
        let reloaded = self.store.reload_or_bootstrap().await?;
        self.chain = reloaded.chain;
        self.replay_set = reloaded.replay_hashes;
        self.pending.clear();
        self.current_difficulty = tip_difficulty(&self.chain, self.config.initial_difficulty);
        Ok(())
    }
}

/// The difficulty the next block should start mining at: the tip's
/// recorded difficulty, unless the tip is still the genesis block
/// (whose own difficulty is always 0, exempt from proof-of-work) — in
/// which case mining starts at `initial_difficulty` instead of 0.
fn tip_difficulty(chain: &[Block], initial_difficulty: u32) -> u32 {
    chain
        .last()
        .filter(|b| b.block_number != 0)
        .map(|b| b.difficulty)
        .unwrap_or(initial_difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerchain_core::TransactionType;
    use ledgerchain_crypto::{generate_keypair, random_nonce_hex, sign_hex};
    use serde_json::json;

    fn signed_transaction(batch_no: &str, actor_user_id: i64, when: DateTime<Utc>) -> Transaction {
        let pair = generate_keypair();
        let mut data = serde_json::Map::new();
        data.insert("type_of_fertilizer".into(), json!("organic-compost"));
        let draft = ledgerchain_core::TransactionDraft {
            transaction_type: TransactionType::BatchCreate,
            batch_no: batch_no.to_string(),
            actor_user_id,
            actor_role: "farmer".into(),
            actor_public_key: pair.public_key_hex.clone(),
            transaction_data: data,
            from_entity_id: None,
            to_entity_id: None,
            document_hashes: None,
            timestamp: when,
            nonce: random_nonce_hex(),
        };
        let payload = ledgerchain_core::Transaction::canonical_payload_of(&draft);
        let bytes = ledgerchain_core::canonical::canonical_json_to_string(&payload).into_bytes();
        let hash = sha256_hex(&bytes);
        let signature = sign_hex(&pair.private_key_hex, &bytes).unwrap();
        Transaction {
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
        }
    }

    async fn engine_with_genesis() -> ChainEngine {
        let store = StateStore::open_in_memory().await.unwrap();
        let reloaded = store.reload_or_bootstrap().await.unwrap();
        let mut config = EngineConfig::default();
        config.initial_difficulty = 1;
        ChainEngine::from_reloaded(config, store, reloaded.chain, reloaded.replay_hashes, HashSet::from([1]))
    }

    #[tokio::test]
    async fn admits_a_valid_transaction_and_rejects_its_replay() {
        let mut engine = engine_with_genesis().await;
        let now = Utc::now();
        let tx = signed_transaction("BATCH001", 7, now);
        let outcome = engine.add_transaction(tx.clone(), now).await.unwrap();
        assert!(outcome.auto_sealed.is_none());
        assert_eq!(engine.pending_len(), 1);

        let err = engine.add_transaction(tx, now).await.unwrap_err();
        assert!(matches!(err, LedgerError::Replay { .. }));
    }

    #[tokio::test]
    async fn seals_a_block_and_advances_the_chain() {
        let mut engine = engine_with_genesis().await;
        let now = Utc::now();
        let tx = signed_transaction("BATCH001", 7, now);
        engine.add_transaction(tx, now).await.unwrap();

        let sealed = engine.seal(None, None, now).await.unwrap().unwrap();
        assert_eq!(sealed.block_number, 1);
        assert_eq!(engine.chain_len(), 2);
        // Block 1 mines off the genesis tip (difficulty 0, exempt from PoW)
        // but must still start at `initial_difficulty`, not inherit 0.
        assert_eq!(sealed.difficulty, 1);
        assert!(sealed.hash.starts_with('0'));
        assert!(hash_meets_difficulty(&sealed.hash, sealed.difficulty));
        assert!(engine.validate_chain(false).is_ok());
        assert!(engine.validate_chain(true).is_ok());
    }

    #[tokio::test]
    async fn sealing_with_a_validator_attaches_a_verifying_signature() {
        let mut engine = engine_with_genesis().await;
        let now = Utc::now();
        let tx = signed_transaction("BATCH001", 7, now);
        engine.add_transaction(tx, now).await.unwrap();

        let keystore = KeyStore::new(StateStore::open_in_memory().await.unwrap(), "validator-secret");
        let issued = keystore.generate(1).await.unwrap();

        let sealed = engine
            .seal(Some((1, issued.record.public_key.clone())), Some(&keystore), now)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(sealed.validator_user_id, Some(1));
        let signature = sealed.validator_signature.as_deref().expect("block should be signed");
        assert!(verify_hex(&issued.record.public_key, &sealed.validator_signing_bytes(), signature));
    }

    #[tokio::test]
    async fn rate_limit_rejects_beyond_the_window_max() {
        let mut engine = engine_with_genesis().await;
        engine.config.rate_max = 2;
        let now = Utc::now();
        for _ in 0..2 {
            let tx = signed_transaction("BATCH001", 7, now);
            engine.add_transaction(tx, now).await.unwrap();
        }
        let tx = signed_transaction("BATCH001", 7, now);
        let err = engine.add_transaction(tx, now).await.unwrap_err();
        assert!(matches!(err, LedgerError::RateLimited { .. }));
    }

    #[tokio::test]
    async fn tampered_signature_is_rejected() {
        let mut engine = engine_with_genesis().await;
        let now = Utc::now();
        let mut tx = signed_transaction("BATCH001", 7, now);
        tx.actor_signature = "00".repeat(32);
        let err = engine.add_transaction(tx, now).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
    }

    /// Scenario 5 (difficulty increase): a two-block window sealed far
    /// faster than `target_block_time_secs` should raise difficulty on
    /// the block that closes the window, driven with synthetic
    /// timestamps rather than sleeping wall-clock time.
    #[tokio::test]
    async fn difficulty_increases_when_a_window_seals_faster_than_target() {
        let mut engine = engine_with_genesis().await;
        engine.config.adjust_every = 2;
        engine.config.target_block_time_secs = 100;
        let genesis_time = engine.chain[0].timestamp;
        let fast_time = genesis_time + chrono::Duration::seconds(1);

        let tx1 = signed_transaction("BATCH001", 7, fast_time);
        engine.add_transaction(tx1, fast_time).await.unwrap();
        engine.seal(None, None, fast_time).await.unwrap();
        let difficulty_before = engine.current_difficulty;

        let tx2 = signed_transaction("BATCH002", 7, fast_time);
        engine.add_transaction(tx2, fast_time).await.unwrap();
        let sealed = engine.seal(None, None, fast_time).await.unwrap().unwrap();

        assert_eq!(sealed.difficulty, difficulty_before + 1);
        assert_eq!(engine.current_difficulty, difficulty_before + 1);
    }
}
