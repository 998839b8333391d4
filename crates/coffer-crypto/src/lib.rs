//! Coffer crypto engine.
//!
//! Password-based authenticated encryption for files at rest:
//! scrypt turns (password, salt) into an AES-256-GCM key, and every
//! ciphertext carries its own salt and nonce so that only the password
//! is needed to open it.
//!
//! Envelope layout, no version byte:
//!
//! ```text
//! salt[16] || nonce[12] || ciphertext || tag[16]
//! ```
//!
//! Nothing here holds state or touches I/O.

pub mod envelope;
pub mod kdf;
pub mod token;

pub use envelope::{
    Cipher, ENVELOPE_OVERHEAD, MIN_ENVELOPE_LEN, NONCE_LEN, SALT_LEN, TAG_LEN, decrypt, encrypt,
};
pub use kdf::{KEY_LEN, KdfParams, derive_key, derive_key_with};
pub use token::{generate_share_token, is_well_formed_token, token_hint};

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Input is too short to contain salt, nonce and at least one byte of ciphertext.
    #[error("envelope is malformed")]
    Format,

    /// Tag verification failed. Wrong password and tampered data are
    /// deliberately indistinguishable.
    #[error("authentication failed")]
    Authentication,

    #[error("invalid key derivation parameters")]
    KeyDerivation,

    #[error("encryption failed")]
    Encryption,
}
