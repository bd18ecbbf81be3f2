//! `ledgerchain-keystore` — per-actor signing keypairs, sealed at rest:
//! generation, rotation and activation.
//!
//! Builds on `ledgerchain_crypto`'s in-memory `generate_keypair` +
//! `Zeroizing`-guarded secret handling, turning it into a persisted
//! record: the private key never touches disk or memory unsealed
//! outside the short window needed to sign or to hand it back to a
//! caller that asked for it explicitly.

use chrono::Utc;
use ledgerchain_core::{KeyRecord, LedgerError, LedgerResult};
use ledgerchain_crypto::{generate_keypair, seal, sign_hex, unseal, verify_hex};
use ledgerchain_store::StateStore;
use zeroize::Zeroizing;

/// Owns the store and the shared sealing secret used to wrap every
/// private key at rest. One `KeyStore` per process, shared by reference
/// with the chain engine.
pub struct KeyStore {
    store: StateStore,
    seal_secret: String,
}

/// The result of `generate`/`rotate`: the plaintext private key is
/// handed back exactly this once — from here on, retrieving
/// it again means going through `get_private` and paying the unseal
/// cost.
pub struct IssuedKey {
    pub record: KeyRecord,
    pub private_key_hex: Zeroizing<String>,
}

impl KeyStore {
    pub fn new(store: StateStore, seal_secret: impl Into<String>) -> Self {
        Self {
            store,
            seal_secret: seal_secret.into(),
        }
    }

    /// Generate a brand-new keypair for `user_id` and make it the active
    /// one, deactivating whatever was active before (version 1 if this
    /// is the user's first key).
    pub async fn generate(&self, user_id: i64) -> LedgerResult<IssuedKey> {
        let next_version = self.store.key_version_count(user_id).await? + 1;
        self.install(user_id, next_version).await
    }

    /// Alias for `generate` — rotation and first-issuance are the same
    /// operation, distinguished only by the resulting `key_version`.
    pub async fn rotate(&self, user_id: i64) -> LedgerResult<IssuedKey> {
        self.generate(user_id).await
    }

    async fn install(&self, user_id: i64, key_version: u32) -> LedgerResult<IssuedKey> {
        let pair = generate_keypair();
        let sealed = seal(&self.seal_secret, user_id, pair.private_key_hex.as_bytes())
            .map_err(|e| LedgerError::Crypto(e.to_string()))?;
        let now = Utc::now();
        let record = KeyRecord {
            user_id,
            public_key: pair.public_key_hex,
            sealed_private_key: sealed,
            key_version,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.store.rotate_key(&record).await?;
        Ok(IssuedKey {
            record,
            private_key_hex: Zeroizing::new(pair.private_key_hex),
        })
    }

    pub async fn get_public(&self, user_id: i64) -> LedgerResult<String> {
        self.store
            .get_active_key(user_id)
            .await?
            .map(|k| k.public_key)
            .ok_or(LedgerError::KeyMissing(user_id))
    }

    /// Fetch `user_id`'s active key record, distinguishing `KeyMissing`
    /// (no key ever issued) from `KeyInactive` (a key exists but isn't
    /// the active one) — the same error semantics `get_private` needs,
    /// and useful on its own to callers that want the record (e.g. its
    /// public key) without unsealing anything.
    ///
    /// Resolved through `get_active_key` rather than "the highest
    /// `key_version`": after a `reactivate` of an older version, the
    /// newest-by-version row can be an inactive one, and the active key
    /// is whichever row the store's `is_active` flag actually marks.
    pub async fn get_active_record(&self, user_id: i64) -> LedgerResult<KeyRecord> {
        if let Some(record) = self.store.get_active_key(user_id).await? {
            return Ok(record);
        }
        match self.store.get_latest_key(user_id).await? {
            Some(_) => Err(LedgerError::KeyInactive(user_id)),
            None => Err(LedgerError::KeyMissing(user_id)),
        }
    }

    /// Unseal and return the active private key for `user_id`. The
    /// result is `Zeroizing` so the caller's stack copy is scrubbed on
    /// drop; the sealed ciphertext on disk is untouched.
    pub async fn get_private(&self, user_id: i64) -> LedgerResult<Zeroizing<Vec<u8>>> {
        let record = self.get_active_record(user_id).await?;
        let plaintext = unseal(&self.seal_secret, user_id, &record.sealed_private_key)
            .map_err(|_| LedgerError::DecryptFailed(user_id))?;
        Ok(Zeroizing::new(plaintext))
    }

    /// Sign `data` with `user_id`'s active key, unsealing it only for
    /// the duration of this call.
    pub async fn sign(&self, user_id: i64, data: &[u8]) -> LedgerResult<String> {
        let private_key = self.get_private(user_id).await?;
        let private_key_hex = String::from_utf8(private_key.to_vec())
            .map_err(|e| LedgerError::Crypto(e.to_string()))?;
        sign_hex(&private_key_hex, data).map_err(|e| LedgerError::Crypto(e.to_string()))
    }

    pub async fn deactivate(&self, user_id: i64) -> LedgerResult<bool> {
        self.store.deactivate_key(user_id).await
    }

    pub async fn reactivate(&self, user_id: i64, key_version: u32) -> LedgerResult<bool> {
        self.store.reactivate_key(user_id, key_version).await
    }

    pub async fn has_active(&self, user_id: i64) -> LedgerResult<bool> {
        self.store.has_active_key(user_id).await
    }

    pub async fn get_info(&self, user_id: i64) -> LedgerResult<Option<KeyRecord>> {
        self.store.get_active_key(user_id).await
    }

    /// Sanity check that the active keypair's private half actually
    /// produces signatures the public half verifies — used by the
    /// health supervisor and by operator tooling after a rotation.
    pub async fn validate_pair(&self, user_id: i64) -> LedgerResult<bool> {
        let record = self
            .store
            .get_active_key(user_id)
            .await?
            .ok_or(LedgerError::KeyMissing(user_id))?;
        let probe = b"ledgerchain-keystore-self-check";
        let signature = self.sign(user_id, probe).await?;
        Ok(verify_hex(&record.public_key, probe, &signature))
    }
}
