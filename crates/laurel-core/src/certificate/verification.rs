//! Verification hash and URL derivation.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// Derives the verification hash for one certificate.
///
/// Hashes 32 bytes of CSPRNG output together with the student id and a
/// nanosecond timestamp. The random token alone makes the hash
/// unguessable from public data; the id and timestamp tie it to one
/// issuance.
#[must_use]
pub(crate) fn verification_hash(student_id: &str) -> String {
    let mut token = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut token);

    let timestamp_ns = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(token);
    hasher.update(student_id.as_bytes());
    hasher.update(timestamp_ns.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Builds the public verification URL for a hash.
#[must_use]
pub fn verification_url(base_url: &str, verification_hash: &str) -> String {
    format!("{}/{verification_hash}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_distinct_per_call() {
        let a = verification_hash("student-1");
        let b = verification_hash("student-1");
        assert_eq!(a.len(), 64);
        assert_ne!(a, b, "fresh randomness must yield distinct hashes");
    }

    #[test]
    fn url_joins_without_duplicate_slash() {
        assert_eq!(
            verification_url("https://verify.example.org/certificates/", "abc123"),
            "https://verify.example.org/certificates/abc123"
        );
        assert_eq!(
            verification_url("https://verify.example.org/certificates", "abc123"),
            "https://verify.example.org/certificates/abc123"
        );
    }
}
