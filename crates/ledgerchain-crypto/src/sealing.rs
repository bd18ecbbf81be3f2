//! AES-256-GCM sealing of private key material at rest.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::ecdsa::CryptoError;
use crate::hash::sha256_bytes;

/// Derive the per-user sealing key: `SHA256(secret ":" user_id)`.
fn derive_key(secret: &str, user_id: i64) -> [u8; 32] {
    let material = format!("{secret}:{user_id}");
    sha256_bytes(material.as_bytes())
}

/// Seal `plaintext` for `user_id` under the process-wide `secret`.
///
/// Output encoding: `iv_hex:tag_hex:ciphertext_hex`, exactly as specified.
pub fn seal(secret: &str, user_id: i64, plaintext: &[u8]) -> Result<String, CryptoError> {
    let key_bytes = derive_key(secret, user_id);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);

    let mut iv_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut iv_bytes);
    let nonce = Nonce::from_slice(&iv_bytes);

    let mut ciphertext_and_tag = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::InvalidKey("AES-GCM encryption failed".into()))?;
    // `aes-gcm` appends the 16-byte tag to the ciphertext; split it back
    // out so we can encode tag and ciphertext as separate hex segments.
    let tag = ciphertext_and_tag.split_off(ciphertext_and_tag.len() - 16);

    Ok(format!(
        "{}:{}:{}",
        hex::encode(iv_bytes),
        hex::encode(tag),
        hex::encode(ciphertext_and_tag)
    ))
}

/// Unseal a `iv_hex:tag_hex:ciphertext_hex` string sealed by [`seal`].
///
/// A GCM tag mismatch (or malformed encoding) returns
/// `CryptoError::DecryptFailed`, distinct from any "unknown user" error
/// the caller layers on top.
pub fn unseal(secret: &str, user_id: i64, sealed: &str) -> Result<Vec<u8>, CryptoError> {
    let mut parts = sealed.splitn(3, ':');
    let (iv_hex, tag_hex, ciphertext_hex) = match (parts.next(), parts.next(), parts.next()) {
        (Some(a), Some(b), Some(c)) => (a, b, c),
        _ => return Err(CryptoError::DecryptFailed),
    };

    let iv = hex::decode(iv_hex).map_err(|_| CryptoError::DecryptFailed)?;
    let tag = hex::decode(tag_hex).map_err(|_| CryptoError::DecryptFailed)?;
    let ciphertext = hex::decode(ciphertext_hex).map_err(|_| CryptoError::DecryptFailed)?;
    if iv.len() != 12 || tag.len() != 16 {
        return Err(CryptoError::DecryptFailed);
    }

    let mut combined = ciphertext;
    combined.extend_from_slice(&tag);

    let key_bytes = derive_key(secret, user_id);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(&iv);

    cipher
        .decrypt(nonce, combined.as_ref())
        .map_err(|_| CryptoError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_unseal_round_trips() {
        let secret = "process-wide-shared-secret";
        let plaintext = b"super-secret-private-key-bytes";
        let sealed = seal(secret, 7, plaintext).unwrap();
        assert_eq!(sealed.matches(':').count(), 2);
        let recovered = unseal(secret, 7, &sealed).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn unseal_fails_with_wrong_secret() {
        let sealed = seal("right-secret", 7, b"data").unwrap();
        let err = unseal("wrong-secret", 7, &sealed).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptFailed));
    }

    #[test]
    fn unseal_fails_with_wrong_user_id() {
        let sealed = seal("secret", 7, b"data").unwrap();
        let err = unseal("secret", 8, &sealed).unwrap_err();
        assert!(matches!(err, CryptoError::DecryptFailed));
    }

    #[test]
    fn unseal_fails_on_malformed_encoding() {
        let err = unseal("secret", 7, "not-the-right-shape").unwrap_err();
        assert!(matches!(err, CryptoError::DecryptFailed));
    }
}
