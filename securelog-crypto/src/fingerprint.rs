//! Public-key fingerprint: the first 20 bytes of SHA-256 over the raw
//! (Base64-decoded) X.509 key bytes, re-encoded as Base64. Auditors use it
//! to locate the matching private key.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

const FINGERPRINT_LEN: usize = 20;

/// `None` for blank input or undecodable Base64; stable for a fixed key.
pub fn public_key_fingerprint(base64_public_key: &str) -> Option<String> {
    let trimmed = base64_public_key.trim();
    if trimmed.is_empty() {
        return None;
    }
    let raw = BASE64.decode(trimmed).ok()?;
    let digest = Sha256::digest(&raw);
    let head = &digest[..FINGERPRINT_LEN.min(digest.len())];
    Some(BASE64.encode(head))
}
