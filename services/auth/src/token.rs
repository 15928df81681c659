//! Session token generation

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::{RngCore, rngs::OsRng};

/// Number of random bytes behind a session token.
const TOKEN_BYTES: usize = 32;

/// Characters of a token kept by [`fingerprint`].
const FINGERPRINT_LEN: usize = 8;

/// Generate an opaque session token: 32 bytes from the OS CSPRNG,
/// base64url-encoded without padding (43 characters).
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Short, non-secret prefix of a token for logs and session listings.
pub fn fingerprint(token: &str) -> String {
    let prefix: String = token.chars().take(FINGERPRINT_LEN).collect();
    format!("{}…", prefix)
}
