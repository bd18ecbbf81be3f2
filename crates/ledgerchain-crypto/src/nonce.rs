use rand::RngCore;

/// 256-bit cryptographically random nonce, hex-encoded. Expected to be
/// globally unique across the chain — enforced by the replay set in
/// `ledgerchain-consensus`, not by this generator.
pub fn random_nonce_hex() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn nonces_are_32_bytes_of_hex() {
        let n = random_nonce_hex();
        assert_eq!(n.len(), 64);
        assert!(hex::decode(&n).is_ok());
    }

    #[test]
    fn repeated_calls_do_not_collide() {
        let set: HashSet<String> = (0..1000).map(|_| random_nonce_hex()).collect();
        assert_eq!(set.len(), 1000);
    }
}
