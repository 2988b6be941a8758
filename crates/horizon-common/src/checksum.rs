//! Content digests for staged payloads

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of `data`
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compare a payload against a previously recorded digest
pub fn matches_sha256(data: &[u8], expected: &str) -> bool {
    sha256_hex(data).eq_ignore_ascii_case(expected)
}
