//! # Cryptographic Primitives
//!
//! Every key, every signature, and every transaction hash flows through
//! here. Nothing in this module is novel:
//!
//! - **Ed25519** for signatures, via `ed25519-dalek`.
//! - **SHA-256** for network IDs and transaction hashes.
//! - **StrKey** for the `G…` / `S…` strings humans copy and paste.
//!
//! Everything is a thin, type-safe wrapper around audited
//! implementations. If you're tempted to optimize these functions,
//! please reconsider.

pub mod hash;
pub mod keys;
pub mod strkey;

pub use hash::{network_id, sha256};
pub use keys::{address_of, DecoratedSignature, KeyError, KeyPair, PublicKey, Signature, Signer};
pub use strkey::{is_valid_address, is_valid_seed, StrKeyError};

/// Returns `true` if `s` is a valid address or a valid seed.
pub fn is_valid_address_or_seed(s: &str) -> bool {
    is_valid_address(s) || is_valid_seed(s)
}
