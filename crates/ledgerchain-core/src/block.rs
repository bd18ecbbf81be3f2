use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{canonical_json_to_string, OrderedFields};
use crate::transaction::Transaction;
use crate::types::HexString;

/// A sealed (or in-progress) block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub block_number: u64,
    pub previous_hash: HexString,
    pub merkle_root: HexString,
    pub timestamp: DateTime<Utc>,
    /// Mining counter — distinct from a transaction's replay `nonce`.
    pub nonce: u64,
    pub difficulty: u32,
    pub validator_user_id: Option<i64>,
    pub validator_public_key: Option<HexString>,
    pub validator_signature: Option<HexString>,
    pub transactions: Vec<Transaction>,
    pub hash: HexString,
}

/// The fields that go into a block's own identity hash:
/// `{block_number, previous_hash, merkle_root, timestamp, nonce,
/// difficulty, validator_user_id, validator_public_key}` — notably
/// `transactions` is represented only via `merkle_root`, and
/// `validator_signature`/`hash` are excluded (a hash can't include
/// itself, and the signature is computed over the hash, not before it).
pub struct BlockIdentity<'a> {
    pub block_number: u64,
    pub previous_hash: &'a str,
    pub merkle_root: &'a str,
    pub timestamp: DateTime<Utc>,
    pub nonce: u64,
    pub difficulty: u32,
    pub validator_user_id: Option<i64>,
    pub validator_public_key: Option<&'a str>,
}

impl<'a> BlockIdentity<'a> {
    pub fn canonical_payload(&self) -> OrderedFields<'static> {
        vec![
            ("block_number", Value::Number(self.block_number.into())),
            (
                "previous_hash",
                Value::String(self.previous_hash.to_string()),
            ),
            ("merkle_root", Value::String(self.merkle_root.to_string())),
            (
                "timestamp",
                Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
            ("nonce", Value::Number(self.nonce.into())),
            ("difficulty", Value::Number(self.difficulty.into())),
            (
                "validator_user_id",
                self.validator_user_id
                    .map(|v| Value::Number(v.into()))
                    .unwrap_or(Value::Null),
            ),
            (
                "validator_public_key",
                self.validator_public_key
                    .map(|v| Value::String(v.to_string()))
                    .unwrap_or(Value::Null),
            ),
        ]
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_json_to_string(&self.canonical_payload()).into_bytes()
    }
}

impl Block {
    pub fn identity(&self) -> BlockIdentity<'_> {
        BlockIdentity {
            block_number: self.block_number,
            previous_hash: &self.previous_hash,
            merkle_root: &self.merkle_root,
            timestamp: self.timestamp,
            nonce: self.nonce,
            difficulty: self.difficulty,
            validator_user_id: self.validator_user_id,
            validator_public_key: self.validator_public_key.as_deref(),
        }
    }

    /// The payload a validator signature verifies against:
    /// `{block_number, previous_hash, merkle_root, hash, timestamp}` —
    /// deliberately a different, smaller set than the block's own
    /// identity hash, and includes the already-computed `hash` itself
    /// since signing happens only after mining completes.
    pub fn validator_signing_payload(&self) -> OrderedFields<'static> {
        vec![
            ("block_number", Value::Number(self.block_number.into())),
            (
                "previous_hash",
                Value::String(self.previous_hash.clone()),
            ),
            ("merkle_root", Value::String(self.merkle_root.clone())),
            ("hash", Value::String(self.hash.clone())),
            (
                "timestamp",
                Value::String(self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
        ]
    }

    pub fn validator_signing_bytes(&self) -> Vec<u8> {
        canonical_json_to_string(&self.validator_signing_payload()).into_bytes()
    }
}
