use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};

use crate::CryptoError;
use crate::kdf::{KdfParams, derive_key_with};

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Shortest input `decrypt` will attempt: salt, nonce and one ciphertext byte.
pub const MIN_ENVELOPE_LEN: usize = SALT_LEN + NONCE_LEN + 1;

/// Bytes an envelope adds on top of the plaintext.
pub const ENVELOPE_OVERHEAD: usize = SALT_LEN + NONCE_LEN + TAG_LEN;

/// Password-based AES-256-GCM over whole buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cipher {
    params: KdfParams,
}

impl Cipher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }

    /// Encrypt `plaintext` under a key stretched from `password`.
    ///
    /// Salt and nonce are fresh OS randomness on every call, so two
    /// encryptions of the same input never share a key/nonce pair.
    pub fn encrypt(&self, plaintext: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let key = derive_key_with(&self.params, password, &salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CryptoError::Encryption)?;

        let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Open an envelope produced by [`Cipher::encrypt`].
    pub fn decrypt(&self, envelope: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
        // Checked before key derivation so short garbage costs nothing.
        if envelope.len() < MIN_ENVELOPE_LEN {
            return Err(CryptoError::Format);
        }

        let (salt, rest) = envelope.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        let salt: &[u8; SALT_LEN] = salt.try_into().map_err(|_| CryptoError::Format)?;

        let key = derive_key_with(&self.params, password, salt)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));

        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Authentication)
    }
}

/// Encrypt with the default scrypt cost.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
    Cipher::default().encrypt(plaintext, password)
}

/// Decrypt with the default scrypt cost.
pub fn decrypt(envelope: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
    Cipher::default().decrypt(envelope, password)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cipher() -> Cipher {
        Cipher::new(KdfParams::new(4, 8, 1).unwrap())
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let c = cipher();
        let big = vec![0u8; 4096];
        let messages: [&[u8]; 3] = [b"x", b"Hello from Coffer!", &big];
        for message in messages {
            let envelope = c.encrypt(message, "s3cret!").unwrap();
            assert_eq!(envelope.len(), message.len() + ENVELOPE_OVERHEAD);
            assert_eq!(c.decrypt(&envelope, "s3cret!").unwrap(), message);
        }
    }

    #[test]
    fn default_cost_roundtrip() {
        let envelope = encrypt(b"production parameters", "s3cret!").unwrap();
        assert_eq!(decrypt(&envelope, "s3cret!").unwrap(), b"production parameters");
    }

    #[test]
    fn wrong_password_fails_authentication() {
        let c = cipher();
        let envelope = c.encrypt(b"Secret message", "password-one").unwrap();
        let result = c.decrypt(&envelope, "password-two");
        assert!(matches!(result, Err(CryptoError::Authentication)));
    }

    #[test]
    fn tampering_fails_authentication() {
        let c = cipher();
        let envelope = c.encrypt(b"Secret message", "pw123456").unwrap();

        // Flip one bit in each region: salt, nonce, body, tag.
        for idx in [0, SALT_LEN, SALT_LEN + NONCE_LEN, envelope.len() - 1] {
            let mut tampered = envelope.clone();
            tampered[idx] ^= 0x01;
            assert!(matches!(
                c.decrypt(&tampered, "pw123456"),
                Err(CryptoError::Authentication)
            ));
        }
    }

    #[test]
    fn short_input_is_a_format_error() {
        let c = cipher();
        for len in [0, 1, SALT_LEN, SALT_LEN + NONCE_LEN, MIN_ENVELOPE_LEN - 1] {
            let junk = vec![0xAB; len];
            assert!(matches!(c.decrypt(&junk, "pw"), Err(CryptoError::Format)));
        }
    }

    #[test]
    fn short_input_is_rejected_before_key_derivation() {
        // Production cost would take noticeable time if derivation ran.
        let started = std::time::Instant::now();
        for _ in 0..100 {
            assert!(matches!(decrypt(&[0u8; 28], "pw"), Err(CryptoError::Format)));
        }
        assert!(started.elapsed() < std::time::Duration::from_millis(500));
    }

    #[test]
    fn minimum_length_body_reaches_authentication() {
        let c = cipher();
        let junk = vec![0u8; MIN_ENVELOPE_LEN];
        assert!(matches!(
            c.decrypt(&junk, "pw"),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn salt_and_nonce_are_fresh_per_call() {
        let c = cipher();
        let mut salts = HashSet::new();
        let mut nonces = HashSet::new();
        for _ in 0..64 {
            let envelope = c.encrypt(b"same input", "same password").unwrap();
            salts.insert(envelope[..SALT_LEN].to_vec());
            nonces.insert(envelope[SALT_LEN..SALT_LEN + NONCE_LEN].to_vec());
        }
        assert_eq!(salts.len(), 64);
        assert_eq!(nonces.len(), 64);
    }

    #[test]
    fn layout_is_salt_nonce_ciphertext() {
        let c = cipher();
        let envelope = c.encrypt(b"layout check", "pw123456").unwrap();

        let salt: [u8; SALT_LEN] = envelope[..SALT_LEN].try_into().unwrap();
        let key = derive_key_with(&c.params(), "pw123456", &salt).unwrap();
        let aead = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key[..]));
        let plaintext = aead
            .decrypt(
                Nonce::from_slice(&envelope[SALT_LEN..SALT_LEN + NONCE_LEN]),
                &envelope[SALT_LEN + NONCE_LEN..],
            )
            .unwrap();
        assert_eq!(plaintext, b"layout check");
    }

    #[test]
    fn cost_parameters_must_match() {
        let envelope = cipher().encrypt(b"data", "pw123456").unwrap();
        let other = Cipher::new(KdfParams::new(5, 8, 1).unwrap());
        assert!(matches!(
            other.decrypt(&envelope, "pw123456"),
            Err(CryptoError::Authentication)
        ));
    }
}
