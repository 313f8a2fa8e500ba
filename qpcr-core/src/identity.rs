//! Identity types for runs and plans

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Run identifier using UUIDv7 so runs sort by start time.
pub type RunId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash used to fingerprint generated plans.
pub type ContentHash = [u8; 32];

/// Generate a new UUIDv7 RunId (timestamp-sortable).
pub fn new_run_id() -> RunId {
    Uuid::now_v7()
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Lowercase hex rendering of a content hash.
pub fn content_hash_hex(hash: &ContentHash) -> String {
    hex::encode(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        let a = compute_content_hash(b"A1->B1 5.90uL");
        let b = compute_content_hash(b"A1->B1 5.90uL");
        assert_eq!(a, b);
        assert_ne!(a, compute_content_hash(b"A1->B1 5.80uL"));
    }

    #[test]
    fn test_content_hash_hex_length() {
        let hash = compute_content_hash(b"");
        let rendered = content_hash_hex(&hash);
        assert_eq!(rendered.len(), 64);
        assert!(rendered.starts_with("e3b0c442"));
    }

    #[test]
    fn test_run_ids_are_distinct() {
        assert_ne!(new_run_id(), new_run_id());
    }
}
