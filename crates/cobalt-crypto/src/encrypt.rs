//! Encryption of a serialized observation (or envelope) to a recipient's
//! public key.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use cobalt_common::EncryptedMessage;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Debug, Error)]
pub enum EncryptError {
    #[error("encryption failed")]
    CipherFailure,
}

/// A recipient's static public key material. Real Cobalt negotiates keys
/// via X25519; here the key is a pre-shared 32-byte secret, which is
/// sufficient to exercise the envelope-encryption path end to end without
/// pulling in a full key-exchange stack.
#[derive(Debug, Clone)]
pub struct PublicKey(pub [u8; 32]);

/// Encrypts a plaintext buffer to a recipient. Implementations must be
/// deterministic only in the sense that they always succeed or always fail
/// for a given input; the ciphertext itself is randomized per call.
pub trait EncryptedMessageMaker: Send + Sync {
    /// # Errors
    /// Returns [`EncryptError`] if the underlying cipher rejects the input.
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedMessage, EncryptError>;
}

/// Pass-through "encrypter" used when no analyzer/shuffler key is
/// configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEncrypter;

impl EncryptedMessageMaker for NoOpEncrypter {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedMessage, EncryptError> {
        Ok(EncryptedMessage {
            ciphertext: plaintext.to_vec(),
        })
    }
}

/// AES-256-GCM envelope encryption with a per-message key derived from the
/// recipient's public key via HKDF-SHA256, and a fresh random salt/nonce
/// prepended to the ciphertext so the recipient can re-derive the key.
///
/// Wire format: `salt(16) || nonce(12) || ciphertext`.
pub struct HybridEncrypter {
    recipient_key: PublicKey,
}

impl HybridEncrypter {
    #[must_use]
    pub fn new(recipient_key: PublicKey) -> Self {
        Self { recipient_key }
    }

    fn derive_key(&self, salt: &[u8]) -> [u8; 32] {
        let hk = Hkdf::<Sha256>::new(Some(salt), &self.recipient_key.0);
        let mut key = [0u8; 32];
        hk.expand(b"cobalt-observation-key", &mut key)
            .expect("32 bytes is a valid HKDF output length");
        key
    }
}

impl EncryptedMessageMaker for HybridEncrypter {
    fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedMessage, EncryptError> {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);

        let mut key_bytes = self.derive_key(&salt);
        let cipher = Aes256Gcm::new_from_slice(&key_bytes).map_err(|_| EncryptError::CipherFailure)?;
        key_bytes.zeroize();

        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| EncryptError::CipherFailure)?;

        let mut wire = Vec::with_capacity(salt.len() + nonce_bytes.len() + ciphertext.len());
        wire.extend_from_slice(&salt);
        wire.extend_from_slice(&nonce_bytes);
        wire.extend_from_slice(&ciphertext);

        Ok(EncryptedMessage { ciphertext: wire })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_op_passes_through() {
        let enc = NoOpEncrypter;
        let msg = enc.encrypt(b"hello").unwrap();
        assert_eq!(msg.ciphertext, b"hello");
    }

    #[test]
    fn hybrid_produces_distinct_ciphertexts() {
        let enc = HybridEncrypter::new(PublicKey([7u8; 32]));
        let a = enc.encrypt(b"same plaintext").unwrap();
        let b = enc.encrypt(b"same plaintext").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext, "nonce/salt must be fresh per call");
        assert!(a.ciphertext.len() > b"same plaintext".len());
    }
}
