use aes_gcm::aead::OsRng;
use aes_gcm::aead::rand_core::RngCore;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};

/// Raw entropy per share token.
pub const SHARE_TOKEN_BYTES: usize = 32;

/// Encoded length: 32 bytes as unpadded base64.
pub const SHARE_TOKEN_LEN: usize = 43;

/// Generate a 256-bit URL-safe share token.
pub fn generate_share_token() -> String {
    let mut bytes = [0u8; SHARE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Cheap shape check so obviously bogus tokens never reach the store.
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == SHARE_TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Short prefix that is safe to put in logs.
pub fn token_hint(token: &str) -> &str {
    token.get(..8).unwrap_or("<short>")
}
