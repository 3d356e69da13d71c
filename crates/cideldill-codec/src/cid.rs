use sha2::{Digest, Sha512};

/// sha-512 hex digest of `bytes` — always 128 lowercase hex characters.
pub fn compute_cid(bytes: &[u8]) -> String {
    let digest = Sha512::digest(bytes);
    hex::encode(digest)
}

/// `true` iff `compute_cid(bytes) == claimed_cid`.
pub fn verify(bytes: &[u8], claimed_cid: &str) -> bool {
    compute_cid(bytes) == claimed_cid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cid_is_128_hex_chars() {
        let cid = compute_cid(b"hello");
        assert_eq!(cid.len(), 128);
        assert!(cid.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn cid_is_deterministic() {
        assert_eq!(compute_cid(b"same bytes"), compute_cid(b"same bytes"));
    }

    #[test]
    fn cid_differs_for_different_bytes() {
        assert_ne!(compute_cid(b"a"), compute_cid(b"b"));
    }

    #[test]
    fn verify_rejects_mismatched_cid() {
        let cid = compute_cid(b"payload");
        assert!(verify(b"payload", &cid));
        assert!(!verify(b"payload", &compute_cid(b"different")));
    }
}
