use sha2::{Digest, Sha256};

/// SHA-256 of arbitrary bytes, returned as a lowercase hex digest.
///
/// When the input is a structured value (a transaction or block), the
/// caller first renders it through `ledgerchain_core::canonical` — this
/// function only ever sees bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// SHA-256 of arbitrary bytes, returned as the raw 32-byte digest (used
/// as the ECDSA message digest, which must be exactly 32 bytes).
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}
