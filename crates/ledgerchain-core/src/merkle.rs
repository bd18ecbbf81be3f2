//! Merkle root folding over transaction hashes.

use sha2::{Digest, Sha256};

/// SHA-256 of the empty string, used as the root of an empty block.
pub fn empty_root_hex() -> String {
    hex::encode(Sha256::digest([]))
}

/// Fold an ordered list of hex transaction-hash strings into one Merkle
/// root, Bitcoin-style: pairwise `SHA256(a || b)`, duplicating the last
/// element of an odd-length layer.
pub fn merkle_root_hex<S: AsRef<str>>(hashes: &[S]) -> String {
    if hashes.is_empty() {
        return empty_root_hex();
    }

    let mut layer: Vec<String> = hashes.iter().map(|h| h.as_ref().to_string()).collect();

    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            let last = layer.last().unwrap().clone();
            layer.push(last);
        }
        let mut next = Vec::with_capacity(layer.len() / 2);
        for pair in layer.chunks(2) {
            let mut hasher = Sha256::new();
            hasher.update(pair[0].as_bytes());
            hasher.update(pair[1].as_bytes());
            next.push(hex::encode(hasher.finalize()));
        }
        layer = next;
    }
    layer.into_iter().next().unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_hashes_empty_string() {
        assert_eq!(merkle_root_hex::<&str>(&[]), empty_root_hex());
    }

    #[test]
    fn single_hash_is_its_own_root() {
        // A one-element layer is already "one hash remains" (step 3) —
        // the fold loop never runs, so no self-pairing happens here.
        // Self-pairing only applies to an odd-length layer of more than
        // one element, produced mid-fold.
        let h = "a".repeat(64);
        assert_eq!(merkle_root_hex(&[h.clone()]), h);
    }

    #[test]
    fn odd_layer_duplicates_the_last_element() {
        let hashes = vec!["a".repeat(64), "b".repeat(64), "c".repeat(64)];
        // layer1: H(a,b), H(c,c) -> layer2: H(H(a,b), H(c,c))
        let h_ab = {
            let mut hasher = Sha256::new();
            hasher.update(hashes[0].as_bytes());
            hasher.update(hashes[1].as_bytes());
            hex::encode(hasher.finalize())
        };
        let h_cc = {
            let mut hasher = Sha256::new();
            hasher.update(hashes[2].as_bytes());
            hasher.update(hashes[2].as_bytes());
            hex::encode(hasher.finalize())
        };
        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(h_ab.as_bytes());
            hasher.update(h_cc.as_bytes());
            hex::encode(hasher.finalize())
        };
        assert_eq!(merkle_root_hex(&hashes), expected);
    }
}
