//! ECDSA signing and verification over secp256k1, operating on
//! already-canonicalized bytes rather than raw transaction structs.

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use crate::hash::sha256_bytes;

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid secp256k1 key material: {0}")]
    InvalidKey(String),
    #[error("invalid DER signature: {0}")]
    InvalidSignature(String),
    #[error("signature verification failed")]
    VerificationFailed,
    #[error("failed to decrypt sealed key material")]
    DecryptFailed,
}

/// A freshly generated secp256k1 keypair, hex-encoded.
pub struct GeneratedKeyPair {
    pub public_key_hex: String,
    pub private_key_hex: String,
}

/// Generate a fresh secp256k1 keypair using the OS RNG.
pub fn generate_keypair() -> GeneratedKeyPair {
    let secp = Secp256k1::new();
    let mut rng = rand::rngs::OsRng;
    let (secret_key, public_key) = secp.generate_keypair(&mut rng);
    GeneratedKeyPair {
        public_key_hex: hex::encode(public_key.serialize()),
        private_key_hex: hex::encode(secret_key.secret_bytes()),
    }
}

/// Sign `data` (SHA-256'd internally) with a hex-encoded secp256k1
/// private key. Returns a DER-encoded, hex-encoded signature.
pub fn sign_hex(private_key_hex: &str, data: &[u8]) -> Result<String, CryptoError> {
    let secret_bytes =
        hex::decode(private_key_hex).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let secret_key =
        SecretKey::from_slice(&secret_bytes).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    let secp = Secp256k1::new();
    let digest = sha256_bytes(data);
    let message = Message::from_digest(digest);
    let signature = secp.sign_ecdsa(&message, &secret_key);
    Ok(hex::encode(signature.serialize_der()))
}

/// Verify a hex DER signature against a hex-encoded secp256k1 public key
/// and the same `data` that was signed.
pub fn verify_hex(public_key_hex: &str, data: &[u8], signature_hex: &str) -> bool {
    let result = (|| -> Result<bool, CryptoError> {
        let pubkey_bytes =
            hex::decode(public_key_hex).map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let public_key = PublicKey::from_slice(&pubkey_bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let sig_bytes =
            hex::decode(signature_hex).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let signature = Signature::from_der(&sig_bytes)
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let secp = Secp256k1::new();
        let digest = sha256_bytes(data);
        let message = Message::from_digest(digest);
        Ok(secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
    })();
    result.unwrap_or(false)
}
