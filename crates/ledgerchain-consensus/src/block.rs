//! Block state machine: `Draft -> Mined -> Signed? -> into_block`.
//!
//! Modeled as a typestate `BlockBuilder<S>` so an illegal transition —
//! signing a block that hasn't been mined yet, or mining one twice — is
//! a compile error rather than a runtime flag check: mutations collect
//! on the draft and commit atomically once mined.

use chrono::{DateTime, Utc};

use ledgerchain_core::merkle::merkle_root_hex;
use ledgerchain_core::{Block, BlockIdentity, Transaction};
use ledgerchain_crypto::{mine, sha256_hex};

/// A block not yet mined: its transactions and identity fields (minus
/// `nonce`/`hash`) are fixed, but proof-of-work has not run.
pub struct Draft {
    block_number: u64,
    previous_hash: String,
    difficulty: u32,
    transactions: Vec<Transaction>,
    timestamp: DateTime<Utc>,
    validator_user_id: Option<i64>,
    validator_public_key: Option<String>,
}

/// A block whose proof-of-work has been found; it may still gain a
/// validator signature before being handed to the store.
pub struct Mined {
    block_number: u64,
    previous_hash: String,
    merkle_root: String,
    difficulty: u32,
    transactions: Vec<Transaction>,
    timestamp: DateTime<Utc>,
    validator_user_id: Option<i64>,
    validator_public_key: Option<String>,
    validator_signature: Option<String>,
    nonce: u64,
    hash: String,
}

pub struct BlockBuilder<S> {
    state: S,
}

impl BlockBuilder<Draft> {
    pub fn new(
        block_number: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        difficulty: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            state: Draft {
                block_number,
                previous_hash,
                difficulty,
                transactions,
                timestamp,
                validator_user_id: None,
                validator_public_key: None,
            },
        }
    }

    /// Commit to a validator *before* mining — the validator's identity
    /// is part of the block's own hash, so it must be
    /// decided before the proof-of-work search begins.
    pub fn with_validator(mut self, user_id: i64, public_key: String) -> Self {
        self.state.validator_user_id = Some(user_id);
        self.state.validator_public_key = Some(public_key);
        self
    }

    /// Compute the Merkle root over the block's transaction hashes and
    /// search for a nonce whose resulting hash meets `difficulty`.
    /// Genesis blocks never reach this builder — they are synthesized
    /// directly by `ledgerchain-store::reload`.
    pub fn mine(self) -> BlockBuilder<Mined> {
        let Draft {
            block_number,
            previous_hash,
            difficulty,
            transactions,
            timestamp,
            validator_user_id,
            validator_public_key,
        } = self.state;

        let tx_hashes: Vec<&str> = transactions.iter().map(|t| t.hash.as_str()).collect();
        let merkle_root = merkle_root_hex(&tx_hashes);

        let (nonce, hash) = mine(difficulty, |candidate_nonce| {
            let identity = BlockIdentity {
                block_number,
                previous_hash: &previous_hash,
                merkle_root: &merkle_root,
                timestamp,
                nonce: candidate_nonce,
                difficulty,
                validator_user_id,
                validator_public_key: validator_public_key.as_deref(),
            };
            sha256_hex(&identity.canonical_bytes())
        });

        BlockBuilder {
            state: Mined {
                block_number,
                previous_hash,
                merkle_root,
                difficulty,
                transactions,
                timestamp,
                validator_user_id,
                validator_public_key,
                validator_signature: None,
                nonce,
                hash,
            },
        }
    }
}

impl BlockBuilder<Mined> {
    /// The payload a validator's signature must cover:
    /// `{block_number, previous_hash, merkle_root, hash, timestamp}`.
    /// Callers sign this with the keystore and feed the result back via
    /// `sign`.
    pub fn validator_signing_bytes(&self) -> Option<Vec<u8>> {
        if self.state.validator_user_id.is_none() {
            return None;
        }
        let block = self.clone_as_block();
        Some(block.validator_signing_bytes())
    }

    pub fn sign(mut self, signature: String) -> Self {
        self.state.validator_signature = Some(signature);
        self
    }

    pub fn into_block(self) -> Block {
        self.clone_as_block()
    }

    fn clone_as_block(&self) -> Block {
        Block {
            block_number: self.state.block_number,
            previous_hash: self.state.previous_hash.clone(),
            merkle_root: self.state.merkle_root.clone(),
            timestamp: self.state.timestamp,
            nonce: self.state.nonce,
            difficulty: self.state.difficulty,
            validator_user_id: self.state.validator_user_id,
            validator_public_key: self.state.validator_public_key.clone(),
            validator_signature: self.state.validator_signature.clone(),
            transactions: self.state.transactions.clone(),
            hash: self.state.hash.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerchain_core::TransactionType;
    use serde_json::json;

    fn txn(nonce: &str) -> Transaction {
        let mut data = serde_json::Map::new();
        data.insert("type_of_fertilizer".into(), json!("organic-compost"));
        Transaction {
            transaction_type: TransactionType::BatchCreate,
            batch_no: "BATCH001".into(),
            actor_user_id: 1,
            actor_role: "farmer".into(),
            actor_public_key: "02abc".into(),
            actor_signature: "sig".into(),
            transaction_data: data,
            from_entity_id: None,
            to_entity_id: None,
            document_hashes: None,
            timestamp: Utc::now(),
            nonce: nonce.into(),
            hash: sha256_hex(nonce.as_bytes()),
        }
    }

    #[test]
    fn mining_produces_a_hash_meeting_difficulty() {
        let block = BlockBuilder::new(1, "genesis-hash".into(), vec![txn("a"), txn("b")], 1, Utc::now())
            .mine()
            .into_block();
        assert!(ledgerchain_crypto::hash_meets_difficulty(&block.hash, 1));
        assert_eq!(block.transactions.len(), 2);
    }

    #[test]
    fn validator_signature_attaches_after_mining() {
        let mined = BlockBuilder::new(1, "genesis-hash".into(), vec![txn("a")], 1, Utc::now())
            .with_validator(1, "02validator".into())
            .mine();
        let bytes = mined.validator_signing_bytes();
        assert!(bytes.is_some());
        let block = mined.sign("deadbeef".into()).into_block();
        assert_eq!(block.validator_signature.as_deref(), Some("deadbeef"));
    }
}
