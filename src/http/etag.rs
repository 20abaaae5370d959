use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

/// Computes the validator of a file version from its name and last
/// modification time (whole seconds).
///
/// The tag is the first 8 bytes of a SHA-256 digest, so it stays the same
/// across builds and restarts for an unchanged file.
pub fn compute(file_name: &str, modified: SystemTime) -> u64 {
    let secs = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let digest = Sha256::digest(format!("{file_name}{secs}").as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Reads a client-supplied Etag token. Weak markers and quotes are tolerated.
pub fn parse_token(value: &str) -> Option<u64> {
    let value = value.trim();
    let value = value.strip_prefix("W/").unwrap_or(value);
    value.trim_matches('"').parse().ok()
}
