//! Cobalt Crypto
//!
//! Encryption-to-recipient capability used by `ObservationWriter` and
//! `ShippingManager`, plus the hashing primitives the
//! encoder and analyzer treat as a capability.
//! primitives, treated as a capability").
//!
//! Grounded on `shared/vc-crypto` for the crate shape (an `EncryptedMessage`
//! analog per session) and on `server/src/webhooks/signing.rs` for the
//! HMAC-SHA256 signing helper.

pub mod encrypt;
pub mod hashing;

pub use encrypt::{EncryptError, EncryptedMessageMaker, HybridEncrypter, NoOpEncrypter, PublicKey};
pub use hashing::{component_name_hash, digest_candidate, hash_to_bit_index, sign_hmac_sha256, verify_hmac_sha256};
