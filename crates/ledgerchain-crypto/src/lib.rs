//! `ledgerchain-crypto` — SHA-256 hashing, ECDSA/secp256k1 signing,
//! AES-256-GCM sealing, nonce generation and proof-of-work helpers.
//! All functions are pure/stateless so they can be called from any
//! thread; statefulness (the replay set, the key store) lives in the
//! crates above this one.

pub mod ecdsa;
pub mod hash;
pub mod nonce;
pub mod pow;
pub mod sealing;

pub use ecdsa::{generate_keypair, sign_hex, verify_hex, CryptoError, GeneratedKeyPair};
pub use hash::{sha256_bytes, sha256_hex};
pub use nonce::random_nonce_hex;
pub use pow::{hash_meets_difficulty, mine};
pub use sealing::{seal, unseal};
