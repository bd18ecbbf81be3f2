//! Row <-> domain-type conversions.
//!
//! SQLite has no native JSON/enum/bool types, so every table column is
//! `TEXT`/`INTEGER`; this module is the one place that knows how a
//! `ledgerchain_core` type maps onto those primitives.

use chrono::{DateTime, SecondsFormat, Utc};
use ledgerchain_core::{Block, BlockIdentity, LedgerError, LedgerResult, Transaction, TransactionType};
use sqlx::FromRow;

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_ts(s: &str) -> LedgerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Serialization(format!("bad timestamp {s:?}: {e}")))
}

#[derive(Debug, FromRow)]
pub struct BlockRow {
    pub block_id: i64,
    pub block_number: i64,
    pub previous_hash: String,
    pub merkle_root: String,
    pub timestamp: String,
    pub nonce: i64,
    pub difficulty: i64,
    pub block_hash: String,
    pub validator_user_id: Option<i64>,
    pub validator_public_key: Option<String>,
    pub validator_signature: Option<String>,
    pub transaction_count: i64,
    pub mining_time_ms: Option<i64>,
    pub is_valid: i64,
    pub created_at: String,
}

#[derive(Debug, FromRow)]
pub struct TransactionRow {
    pub transaction_id: i64,
    pub transaction_hash: String,
    pub block_id: i64,
    pub transaction_type: String,
    pub batch_no: String,
    pub actor_user_id: i64,
    pub actor_role: String,
    pub actor_public_key: Option<String>,
    pub actor_signature: String,
    pub transaction_data: String,
    pub from_entity_id: Option<i64>,
    pub to_entity_id: Option<i64>,
    pub document_hashes: Option<String>,
    pub nonce: String,
    pub timestamp: String,
    pub is_verified: i64,
    pub verification_count: i64,
    pub created_at: String,
}

impl TransactionRow {
    pub fn into_transaction(self) -> LedgerResult<Transaction> {
        let transaction_type = TransactionType::from_tag(&self.transaction_type).ok_or_else(|| {
            LedgerError::Serialization(format!("unknown transaction_type {:?}", self.transaction_type))
        })?;
        let transaction_data = match serde_json::from_str(&self.transaction_data)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?
        {
            serde_json::Value::Object(m) => m,
            _ => {
                return Err(LedgerError::Serialization(
                    "transaction_data must be a JSON object".into(),
                ))
            }
        };
        let document_hashes = match self.document_hashes {
            None => None,
            Some(s) => match serde_json::from_str(&s).map_err(|e| LedgerError::Serialization(e.to_string()))? {
                serde_json::Value::Object(m) => Some(m),
                serde_json::Value::Null => None,
                _ => {
                    return Err(LedgerError::Serialization(
                        "document_hashes must be a JSON object".into(),
                    ))
                }
            },
        };

        Ok(Transaction {
            transaction_type,
            batch_no: self.batch_no,
            actor_user_id: self.actor_user_id,
            actor_role: self.actor_role,
            actor_public_key: self.actor_public_key.unwrap_or_default(),
            actor_signature: self.actor_signature,
            transaction_data,
            from_entity_id: self.from_entity_id,
            to_entity_id: self.to_entity_id,
            document_hashes,
            timestamp: parse_ts(&self.timestamp)?,
            nonce: self.nonce,
            hash: self.transaction_hash,
        })
    }
}

impl BlockRow {
    /// Reassemble a `Block` from its row plus the already-loaded,
    /// `transaction_id`-ordered list of its transactions.
    pub fn into_block(self, transactions: Vec<Transaction>) -> LedgerResult<Block> {
        Ok(Block {
            block_number: self.block_number as u64,
            previous_hash: self.previous_hash,
            merkle_root: self.merkle_root,
            timestamp: parse_ts(&self.timestamp)?,
            nonce: self.nonce as u64,
            difficulty: self.difficulty as u32,
            validator_user_id: self.validator_user_id,
            validator_public_key: self.validator_public_key,
            validator_signature: self.validator_signature,
            transactions,
            hash: self.block_hash,
        })
    }
}

/// Recompute a block's identity hash from its stored fields (used by
/// both the trusting and `strict_reload_verification` reload paths —
/// the difference is only in which hash is treated as ground truth).
pub fn recomputed_block_hash(block: &Block) -> String {
    ledgerchain_crypto_sha256_hex_of_identity(&block.identity())
}

fn ledgerchain_crypto_sha256_hex_of_identity(identity: &BlockIdentity<'_>) -> String {
    // `ledgerchain-store` intentionally does not depend on
    // `ledgerchain-crypto` (it is a pure persistence layer); the one
    // SHA-256 call needed for strict-reload verification is inlined
    // here rather than pulling in the whole crypto crate for one
    // function.
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(identity.canonical_bytes()))
}
