//! Forculus threshold encryption.
//!
//! A client encodes a string by: (1) deriving a symmetric key and a
//! polynomial deterministically from the plaintext, so that every client
//! who encodes the same string computes the *same* polynomial; (2)
//! encrypting the plaintext under that key; (3) contributing one point on
//! the polynomial, at an x-coordinate fresh per observation. Once the
//! server has collected `threshold` distinct points for the same string it
//! can interpolate the polynomial's constant term (the key) and decrypt.
//! Reconstruction is out of the core's scope; only encoding is
//! specified here.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use cobalt_common::ForculusObservation;
use rand::{RngCore, SeedableRng};
use rand::rngs::StdRng;
use sha2::{Digest, Sha256};

use crate::error::EncoderError;

/// A 61-bit Mersenne prime, large enough that point collisions across
/// plausible client populations are negligible, small enough that all
/// arithmetic fits in `u128` intermediates.
const FIELD_PRIME: u64 = (1u64 << 61) - 1;

fn mod_mul(a: u64, b: u64) -> u64 {
    ((u128::from(a) * u128::from(b)) % u128::from(FIELD_PRIME)) as u64
}

fn mod_add(a: u64, b: u64) -> u64 {
    let sum = u128::from(a) + u128::from(b);
    (sum % u128::from(FIELD_PRIME)) as u64
}

/// Derives the shared polynomial's coefficients (including the constant
/// term, the AES key material) from the plaintext.
fn polynomial_coefficients(plaintext: &str, threshold: u32) -> (Vec<u64>, [u8; 32]) {
    let seed_digest: [u8; 32] = Sha256::digest(plaintext.as_bytes()).into();
    let mut rng = StdRng::from_seed(seed_digest);

    let mut coefficients = Vec::with_capacity(threshold as usize);
    for _ in 0..threshold {
        coefficients.push(rng.next_u64() % FIELD_PRIME);
    }

    (coefficients, seed_digest)
}

fn evaluate_polynomial(coefficients: &[u64], x: u64) -> u64 {
    let mut acc = 0u64;
    let mut power = 1u64;
    for &c in coefficients {
        acc = mod_add(acc, mod_mul(c, power));
        power = mod_mul(power, x);
    }
    acc
}

/// Encodes `plaintext` under Forculus threshold encryption.
///
/// # Errors
/// Returns [`EncoderError::InvalidConfig`] when `threshold < 2`.
pub fn encode_forculus(
    plaintext: &str,
    threshold: u32,
    rng: &mut dyn RngCore,
) -> Result<ForculusObservation, EncoderError> {
    if threshold < 2 {
        return Err(EncoderError::InvalidConfig(format!(
            "forculus threshold {threshold} must be >= 2"
        )));
    }

    let (coefficients, key_seed) = polynomial_coefficients(plaintext, threshold);

    // The constant term (coefficients[0]) is the shared secret; derive a
    // 256-bit AES key from it together with the plaintext-derived seed so
    // the key depends on the full coefficient, not just its low 61 bits.
    let mut key_material = [0u8; 32];
    key_material.copy_from_slice(&key_seed);
    key_material[0..8].copy_from_slice(&coefficients[0].to_le_bytes());

    let cipher = Aes256Gcm::new_from_slice(&key_material)
        .map_err(|_| EncoderError::Other("forculus key derivation failed".into()))?;

    let mut nonce_bytes = [0u8; 12];
    rng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| EncoderError::Other("forculus encryption failed".into()))?;

    let point_x = (rng.next_u64() % (FIELD_PRIME - 1)) + 1; // nonzero
    let point_y = evaluate_polynomial(&coefficients, point_x);

    Ok(ForculusObservation {
        ciphertext,
        nonce: nonce_bytes.to_vec(),
        point_x,
        point_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn rejects_low_threshold() {
        let mut rng = StepRng::new(1, 1);
        let err = encode_forculus("hello", 1, &mut rng).unwrap_err();
        assert!(matches!(err, EncoderError::InvalidConfig(_)));
    }

    #[test]
    fn same_plaintext_same_polynomial_different_points() {
        let mut rng_a = StepRng::new(1, 1);
        let mut rng_b = StepRng::new(99, 7);
        let obs_a = encode_forculus("hello", 3, &mut rng_a).unwrap();
        let obs_b = encode_forculus("hello", 3, &mut rng_b).unwrap();

        // Different clients draw different x coordinates...
        assert_ne!(obs_a.point_x, obs_b.point_x);

        // ...but both points lie on the same shared polynomial, so
        // re-evaluating it directly reproduces each client's y.
        let (coefficients, _) = polynomial_coefficients("hello", 3);
        assert_eq!(evaluate_polynomial(&coefficients, obs_a.point_x), obs_a.point_y);
        assert_eq!(evaluate_polynomial(&coefficients, obs_b.point_x), obs_b.point_y);
    }

    #[test]
    fn different_plaintext_different_polynomial() {
        let (coeffs_a, _) = polynomial_coefficients("hello", 3);
        let (coeffs_b, _) = polynomial_coefficients("world", 3);
        assert_ne!(coeffs_a, coeffs_b);
    }
}
