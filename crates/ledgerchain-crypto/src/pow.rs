//! Proof-of-work target check and mining loop.
//!
//! The target is expressed in **leading hex-zero characters** of the
//! block's hex digest, so the predicate here counts characters, not
//! bits.

/// Does `hash_hex` start with `difficulty` `'0'` characters?
pub fn hash_meets_difficulty(hash_hex: &str, difficulty: u32) -> bool {
    if difficulty == 0 {
        return true;
    }
    let want = difficulty as usize;
    hash_hex.len() >= want && hash_hex.as_bytes()[..want].iter().all(|&b| b == b'0')
}

/// Search increasing nonce values, calling `hash_for_nonce` each time,
/// until the returned hash meets `difficulty`. Returns the winning nonce
/// and its hash.
///
/// The caller supplies the hashing closure because, in this ledger, the
/// mining nonce is one field inside a larger canonical JSON payload
/// rather than bytes appended to a fixed body — mining a block means
/// re-rendering the whole canonical form with an incremented `nonce`
/// each attempt.
pub fn mine<F: FnMut(u64) -> String>(difficulty: u32, mut hash_for_nonce: F) -> (u64, String) {
    let mut nonce = 0u64;
    loop {
        let hash = hash_for_nonce(nonce);
        if hash_meets_difficulty(&hash, difficulty) {
            return (nonce, hash);
        }
        nonce += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::sha256_hex;

    #[test]
    fn zero_difficulty_always_passes() {
        assert!(hash_meets_difficulty("ffffffff", 0));
    }

    #[test]
    fn requires_exact_leading_zero_count() {
        assert!(hash_meets_difficulty("00abcd", 2));
        assert!(!hash_meets_difficulty("0abcd", 2));
    }

    #[test]
    fn mine_finds_a_nonce_meeting_an_easy_target() {
        let (nonce, hash) = mine(1, |n| sha256_hex(format!("body-{n}").as_bytes()));
        assert!(hash_meets_difficulty(&hash, 1));
        assert_eq!(sha256_hex(format!("body-{nonce}").as_bytes()), hash);
    }
}
