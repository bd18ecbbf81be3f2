use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{HexString, Stage};

/// A per-actor signing keypair, sealed at rest.
///
/// At most one record per `user_id` has `is_active = true` — enforced by
/// the store's unique partial index, not by this type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeyRecord {
    pub user_id: i64,
    pub public_key: HexString,
    /// `iv_hex:tag_hex:ciphertext_hex` (AES-256-GCM sealing format).
    pub sealed_private_key: String,
    pub key_version: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The secondary `batch_no -> stage` index row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchRef {
    pub batch_no: String,
    pub stage: Stage,
    pub transaction_id: i64,
    pub block_id: i64,
    pub transaction_hash: HexString,
}
