//! # Hashing Utilities
//!
//! SHA-256 is the only hash the ledger speaks. It names networks (the
//! network ID is the SHA-256 of the passphrase) and it produces the
//! digest every signer signs.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data as a fixed-size array.
///
/// # Example
///
/// ```
/// use lumen::crypto::sha256;
///
/// let hash = sha256(b"lumen");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash several byte slices as if they were concatenated.
///
/// Feeds the parts sequentially into one hasher instead of allocating a
/// buffer for the concatenation.
pub fn sha256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// The network ID: SHA-256 of the network passphrase.
pub fn network_id(passphrase: &str) -> [u8; 32] {
    sha256(passphrase.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn multi_matches_concatenation() {
        assert_eq!(sha256_multi(&[b"hello".as_slice(), b" world".as_slice()]), sha256(b"hello world"));
    }

    #[test]
    fn network_ids_differ_per_passphrase() {
        assert_ne!(
            network_id(crate::config::PUBLIC_PASSPHRASE),
            network_id(crate::config::TEST_PASSPHRASE)
        );
    }
}
