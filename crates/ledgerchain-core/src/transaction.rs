use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::{canonical_json_to_string, OrderedFields};
use crate::constants::{FUTURE_TOLERANCE_SECS, STALE_WARNING_SECS};
use crate::types::{HexString, JsonMap, TransactionType};

/// An immutable, signed supply-chain event.
///
/// `hash` and `actor_signature` are computed from every other field and
/// are never themselves part of the canonical payload they sign over —
/// see [`Transaction::canonical_payload`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_type: TransactionType,
    pub batch_no: String,
    pub actor_user_id: i64,
    pub actor_role: String,
    pub actor_public_key: HexString,
    pub actor_signature: HexString,
    pub transaction_data: JsonMap,
    pub from_entity_id: Option<i64>,
    pub to_entity_id: Option<i64>,
    pub document_hashes: Option<JsonMap>,
    pub timestamp: DateTime<Utc>,
    pub nonce: HexString,
    pub hash: HexString,
}

/// The fields to be filled in by a caller before hashing/signing.
pub struct TransactionDraft {
    pub transaction_type: TransactionType,
    pub batch_no: String,
    pub actor_user_id: i64,
    pub actor_role: String,
    pub actor_public_key: HexString,
    pub transaction_data: JsonMap,
    pub from_entity_id: Option<i64>,
    pub to_entity_id: Option<i64>,
    pub document_hashes: Option<JsonMap>,
    pub timestamp: DateTime<Utc>,
    pub nonce: HexString,
}

impl Transaction {
    /// Build the canonical payload — field order fixed, `hash` and
    /// `actor_signature` excluded — as an ordered field list.
    ///
    /// Shared by hash computation and signature verification:
    /// both hash and signature are taken over exactly this payload.
    pub fn canonical_payload_of(draft: &TransactionDraft) -> OrderedFields<'static> {
        vec![
            (
                "transaction_type",
                Value::String(draft.transaction_type.as_tag().to_string()),
            ),
            ("batch_no", Value::String(draft.batch_no.clone())),
            ("actor_user_id", Value::Number(draft.actor_user_id.into())),
            ("actor_role", Value::String(draft.actor_role.clone())),
            (
                "actor_public_key",
                Value::String(draft.actor_public_key.clone()),
            ),
            (
                "transaction_data",
                Value::Object(draft.transaction_data.clone()),
            ),
            (
                "from_entity_id",
                draft
                    .from_entity_id
                    .map(|v| Value::Number(v.into()))
                    .unwrap_or(Value::Null),
            ),
            (
                "to_entity_id",
                draft
                    .to_entity_id
                    .map(|v| Value::Number(v.into()))
                    .unwrap_or(Value::Null),
            ),
            (
                "document_hashes",
                draft
                    .document_hashes
                    .clone()
                    .map(Value::Object)
                    .unwrap_or(Value::Null),
            ),
            (
                "timestamp",
                Value::String(draft.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ),
            ("nonce", Value::String(draft.nonce.clone())),
        ]
    }

    /// Same payload, built from an already-assembled `Transaction`
    /// (used to re-verify a stored/loaded transaction).
    pub fn canonical_payload(&self) -> OrderedFields<'static> {
        Self::canonical_payload_of(&TransactionDraft {
            transaction_type: self.transaction_type,
            batch_no: self.batch_no.clone(),
            actor_user_id: self.actor_user_id,
            actor_role: self.actor_role.clone(),
            actor_public_key: self.actor_public_key.clone(),
            transaction_data: self.transaction_data.clone(),
            from_entity_id: self.from_entity_id,
            to_entity_id: self.to_entity_id,
            document_hashes: self.document_hashes.clone(),
            timestamp: self.timestamp,
            nonce: self.nonce.clone(),
        })
    }

    /// The exact byte string that gets hashed and signed.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_json_to_string(&self.canonical_payload()).into_bytes()
    }

    /// Future tolerance / staleness check.
    ///
    /// Returns `Err` only on the hard future-tolerance violation; a stale
    /// (>24h old) transaction is accepted but the caller should log a
    /// warning.
    pub fn check_timestamp(&self, now: DateTime<Utc>) -> Result<bool, String> {
        let delta = (self.timestamp - now).num_seconds();
        if delta > FUTURE_TOLERANCE_SECS {
            return Err(format!(
                "timestamp {} is {}s in the future (tolerance {}s)",
                self.timestamp, delta, FUTURE_TOLERANCE_SECS
            ));
        }
        let age = (now - self.timestamp).num_seconds();
        Ok(age > STALE_WARNING_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn draft() -> TransactionDraft {
        let mut data = JsonMap::new();
        data.insert("type_of_fertilizer".into(), json!("organic-compost"));
        TransactionDraft {
            transaction_type: TransactionType::BatchCreate,
            batch_no: "BATCH001".into(),
            actor_user_id: 7,
            actor_role: "farmer".into(),
            actor_public_key: "02abc".into(),
            transaction_data: data,
            from_entity_id: None,
            to_entity_id: Some(3),
            document_hashes: None,
            timestamp: "2026-01-01T00:00:00.000Z".parse().unwrap(),
            nonce: "deadbeef".into(),
        }
    }

    #[test]
    fn canonical_payload_field_order_is_fixed() {
        let payload = Transaction::canonical_payload_of(&draft());
        let keys: Vec<&str> = payload.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                "transaction_type",
                "batch_no",
                "actor_user_id",
                "actor_role",
                "actor_public_key",
                "transaction_data",
                "from_entity_id",
                "to_entity_id",
                "document_hashes",
                "timestamp",
                "nonce",
            ]
        );
    }

    #[test]
    fn absent_optional_fields_serialize_as_null() {
        let s = canonical_json_to_string(&Transaction::canonical_payload_of(&draft()));
        assert!(s.contains("\"from_entity_id\":null"));
        assert!(s.contains("\"document_hashes\":null"));
    }
}
