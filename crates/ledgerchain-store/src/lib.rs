//! `ledgerchain-store` — the relational persistence layer.
//!
//! One SQLite database, opened once per process, holds the durable
//! truth: `blocks`, `transactions`, `batch_refs` and `user_keys`, plus a
//! small `metadata` key/value table. Every table access goes through
//! `sqlx`'s runtime-checked query API (`query`/`query_as`), never the
//! compile-time `query!` macros, since this crate is built without a
//! live database connection available to the build itself.

mod batch_refs;
mod blocks;
mod db;
mod keys;
mod metadata;
mod reload;
mod rows;
mod transactions;

pub use db::StateStore;
pub use reload::{synthesize_genesis, ReloadedState};
pub use rows::recomputed_block_hash;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledgerchain_core::{KeyRecord, Transaction, TransactionType};
    use serde_json::json;

    fn sample_transaction(batch_no: &str, nonce: &str) -> Transaction {
        let mut data = serde_json::Map::new();
        data.insert("type_of_fertilizer".into(), json!("organic-compost"));
        Transaction {
            transaction_type: TransactionType::BatchCreate,
            batch_no: batch_no.to_string(),
            actor_user_id: 7,
            actor_role: "farmer".into(),
            actor_public_key: "02abc".into(),
            actor_signature: "deadbeef".into(),
            transaction_data: data,
            from_entity_id: None,
            to_entity_id: Some(3),
            document_hashes: None,
            timestamp: Utc::now(),
            nonce: nonce.to_string(),
            hash: format!("hash-{nonce}"),
        }
    }

    #[tokio::test]
    async fn bootstraps_genesis_on_an_empty_store() {
        let store = StateStore::open_in_memory().await.unwrap();
        let reloaded = store.reload_or_bootstrap().await.unwrap();
        assert_eq!(reloaded.chain.len(), 1);
        assert_eq!(reloaded.chain[0].block_number, 0);
        assert_eq!(reloaded.chain[0].previous_hash, "0");
        assert!(reloaded.replay_hashes.is_empty());
    }

    #[tokio::test]
    async fn sealed_block_round_trips_with_its_transactions() {
        let store = StateStore::open_in_memory().await.unwrap();
        store.reload_or_bootstrap().await.unwrap();

        let mut block = synthesize_genesis();
        block.block_number = 1;
        block.previous_hash = "genesis-hash".into();
        block.transactions = vec![sample_transaction("BATCH001", "n1"), sample_transaction("BATCH001", "n2")];
        block.hash = "block-1-hash".into();

        let block_id = store.put_sealed_block(&block, Some(42)).await.unwrap();
        assert!(block_id > 0);

        let fetched = store.get_block_by_number(1).await.unwrap().unwrap();
        assert_eq!(fetched.transactions.len(), 2);
        assert_eq!(fetched.transactions[0].nonce, "n1");
        assert_eq!(fetched.transactions[1].nonce, "n2");

        let history = store.get_batch_history("BATCH001").await.unwrap();
        assert_eq!(history.len(), 2);

        assert!(store.transaction_hash_exists("hash-n1").await.unwrap());
        assert!(!store.transaction_hash_exists("hash-missing").await.unwrap());
    }

    #[tokio::test]
    async fn key_rotation_keeps_exactly_one_active_version() {
        let store = StateStore::open_in_memory().await.unwrap();
        let now = Utc::now();
        let v1 = KeyRecord {
            user_id: 1,
            public_key: "pub-v1".into(),
            sealed_private_key: "iv:tag:ct".into(),
            key_version: 1,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        store.rotate_key(&v1).await.unwrap();
        assert!(store.has_active_key(1).await.unwrap());

        let v2 = KeyRecord {
            key_version: 2,
            public_key: "pub-v2".into(),
            ..v1
        };
        store.rotate_key(&v2).await.unwrap();

        let active = store.get_active_key(1).await.unwrap().unwrap();
        assert_eq!(active.key_version, 2);
        assert_eq!(active.public_key, "pub-v2");

        let old = store.get_key_by_version(1, 1).await.unwrap().unwrap();
        assert!(!old.is_active);
    }

    #[tokio::test]
    async fn reset_chain_clears_blocks_transactions_and_refs() {
        let store = StateStore::open_in_memory().await.unwrap();
        store.reload_or_bootstrap().await.unwrap();
        assert_eq!(store.count_blocks().await.unwrap(), 1);

        store.reset_chain().await.unwrap();
        assert_eq!(store.count_blocks().await.unwrap(), 0);
        assert_eq!(store.count_transactions().await.unwrap(), 0);

        let reloaded = store.reload_or_bootstrap().await.unwrap();
        assert_eq!(reloaded.chain.len(), 1);
    }
}
