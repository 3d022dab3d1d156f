//! Hashing used by the encoder (`component_name_hash`) and by the analyzer's
//! candidate-matrix construction.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// 32-byte hash of a non-empty component name; the empty string hashes to
/// the empty byte string.
#[must_use]
pub fn component_name_hash(component: &str) -> Vec<u8> {
    if component.is_empty() {
        return Vec::new();
    }
    Sha256::digest(component.as_bytes()).to_vec()
}

/// Digests `(serialized_candidate, cohort, num_hashes)` into 32 bytes, used
/// by the analyzer to derive Bloom bit indices.
#[must_use]
pub fn digest_candidate(candidate: &[u8], cohort: u32, num_hashes: u32) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(candidate);
    hasher.update(cohort.to_le_bytes());
    hasher.update(num_hashes.to_le_bytes());
    hasher.finalize().into()
}

/// Extracts the `hash_index`-th Bloom bit position out of `num_bits`, from a
/// digest produced by [`digest_candidate`]. Shared by the string-RAPPOR
/// encoder and the RAPPOR candidate-matrix builder so both sides agree on
/// bit layout.
#[must_use]
pub fn hash_to_bit_index(digest: &[u8; 32], hash_index: u32, num_bits: u32) -> u32 {
    let offset = (hash_index as usize * 4) % (digest.len() - 4 + 1);
    let chunk = [digest[offset], digest[offset + 1], digest[offset + 2], digest[offset + 3]];
    u32::from_le_bytes(chunk) % num_bits
}

/// HMAC-SHA256-signs a payload and returns the hex-encoded signature,
/// grounded on `server/src/webhooks/signing.rs::sign_payload`.
#[must_use]
pub fn sign_hmac_sha256(secret: &[u8], payload: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts a key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies an HMAC-SHA256 signature in constant time.
#[must_use]
pub fn verify_hmac_sha256(secret: &[u8], payload: &[u8], signature: &str) -> bool {
    let expected = sign_hmac_sha256(secret, payload);
    expected.len() == signature.len()
        && expected
            .as_bytes()
            .iter()
            .zip(signature.as_bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_component_hashes_to_empty() {
        assert!(component_name_hash("").is_empty());
    }

    #[test]
    fn component_hash_is_32_bytes() {
        assert_eq!(component_name_hash("gpu").len(), 32);
    }

    #[test]
    fn digest_varies_by_cohort() {
        let a = digest_candidate(b"hello", 0, 2);
        let b = digest_candidate(b"hello", 1, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let sig = sign_hmac_sha256(b"secret", b"payload");
        assert!(verify_hmac_sha256(b"secret", b"payload", &sig));
        assert!(!verify_hmac_sha256(b"wrong", b"payload", &sig));
    }
}
