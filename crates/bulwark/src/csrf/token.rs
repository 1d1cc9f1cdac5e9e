//! Token minting and constant-time comparison.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use bulwark_common::constants::csrf::TOKEN_BYTES;
use rand::RngCore;
use subtle::ConstantTimeEq;

/// Mint a fresh URL-safe token (256 bits of entropy)
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compare two tokens without leaking where they first differ.
///
/// Lengths are not secret: a length mismatch returns early. Equal-length
/// inputs are compared in full via `subtle`.
pub fn tokens_match(provided: &str, expected: &str) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
