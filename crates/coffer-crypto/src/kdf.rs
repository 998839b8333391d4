use scrypt::Params;
use zeroize::Zeroizing;

use crate::CryptoError;
use crate::envelope::SALT_LEN;

/// AES-256 key length.
pub const KEY_LEN: usize = 32;

/// scrypt cost parameters.
///
/// Envelopes do not record which parameters produced them, so every
/// deployment reading the same blobs must agree on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    log_n: u8,
    r: u32,
    p: u32,
}

impl KdfParams {
    pub fn new(log_n: u8, r: u32, p: u32) -> Result<Self, CryptoError> {
        Params::new(log_n, r, p, KEY_LEN).map_err(|_| CryptoError::KeyDerivation)?;
        Ok(Self { log_n, r, p })
    }

    pub fn log_n(&self) -> u8 {
        self.log_n
    }

    pub fn r(&self) -> u32 {
        self.r
    }

    pub fn p(&self) -> u32 {
        self.p
    }

    fn to_scrypt(self) -> Result<Params, CryptoError> {
        Params::new(self.log_n, self.r, self.p, KEY_LEN).map_err(|_| CryptoError::KeyDerivation)
    }
}

impl Default for KdfParams {
    /// N = 32768, r = 8, p = 1.
    fn default() -> Self {
        Self {
            log_n: 15,
            r: 8,
            p: 1,
        }
    }
}

/// Derive the file key from a password and salt using the default cost.
pub fn derive_key(
    password: &str,
    salt: &[u8; SALT_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    derive_key_with(&KdfParams::default(), password, salt)
}

/// Derive the file key with explicit cost parameters.
/// The returned buffer is wiped when dropped.
pub fn derive_key_with(
    params: &KdfParams,
    password: &str,
    salt: &[u8; SALT_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    let params = params.to_scrypt()?;
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut key[..])
        .map_err(|_| CryptoError::KeyDerivation)?;
    Ok(key)
}
