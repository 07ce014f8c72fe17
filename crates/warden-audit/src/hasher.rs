// hasher.rs — SHA-256 hashing utilities.
//
// All hashes in Warden are SHA-256, encoded as 64-character lowercase hex
// strings: audit entry hashes, plan hashes, args digests. This module
// provides the shared convenience functions.

use sha2::{Digest, Sha256};
use std::path::Path;

/// Hash arbitrary bytes, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    // `format!("{:x}", ...)` produces lowercase hex
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string, returning a lowercase hex-encoded SHA-256 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Hash the contents of a file on disk.
///
/// Reads the entire file into memory; plan documents and journal lines are
/// small enough that streaming is not worth the complexity.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    let data = std::fs::read(path)?;
    Ok(hash_bytes(&data))
}

/// True if `s` looks like a SHA-256 hex digest (64 lowercase hex chars).
pub fn is_hex_digest(s: &str) -> bool {
    s.len() == 64
        && s.chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_determinism() {
        let input = b"hello world";
        assert_eq!(hash_bytes(input), hash_bytes(input));
    }

    #[test]
    fn hash_uniqueness() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn hash_known_value() {
        // SHA-256("") = e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        assert_eq!(
            hash_str(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_shape_check() {
        assert!(is_hex_digest(&hash_str("test")));
        assert!(!is_hex_digest("0".repeat(63).as_str()));
        assert!(!is_hex_digest(&hash_str("test").to_uppercase()));
    }
}
