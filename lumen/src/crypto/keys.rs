//! # Key Management
//!
//! Ed25519 keypairs and their StrKey string forms.
//!
//! Two kinds of key strings flow through the client:
//!
//! - **Seeds** (`S…`) - the 32-byte Ed25519 secret. Can sign.
//! - **Addresses** (`G…`) - the 32-byte Ed25519 public key. Can only be
//!   named, never used to sign.
//!
//! Most orchestrator methods accept either in the "source" position, so
//! [`Signer::parse`] returns whichever one it was given and refuses to
//! sign with an address-only signer instead of failing at parse time.
//!
//! ## Security considerations
//!
//! - Signing keys come from `OsRng`. If your OS RNG is broken, you have
//!   bigger problems than this crate.
//! - Seeds are never logged and never appear in `Debug` output.

use ed25519_dalek::{Signature as DalekSignature, Signer as _, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::strkey::{self, KeyKind, StrKeyError};

/// Errors that can occur during key operations.
///
/// Intentionally vague about key material: an error message is a log
/// line waiting to happen.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("malformed seed: {0}")]
    InvalidSeed(StrKeyError),

    #[error("malformed address: {0}")]
    InvalidAddress(StrKeyError),

    #[error("not a valid address or seed")]
    Unrecognized,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("cannot sign with address {0}: a seed is required")]
    CannotSign(String),
}

// ---------------------------------------------------------------------------
// KeyPair
// ---------------------------------------------------------------------------

/// A full Ed25519 keypair: can sign, and knows its own address.
///
/// `KeyPair` intentionally does not implement `Serialize`. Exporting a
/// secret should be a deliberate call to [`KeyPair::seed`], not something
/// that happens because a struct ended up in a JSON response.
///
/// # Examples
///
/// ```
/// use lumen::crypto::keys::KeyPair;
///
/// let kp = KeyPair::random();
/// assert!(kp.address().starts_with('G'));
/// assert!(kp.seed().starts_with('S'));
///
/// let sig = kp.sign(b"pay bob");
/// assert!(kp.public_key().verify(b"pay bob", &sig));
/// ```
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generates a fresh keypair from the OS RNG.
    pub fn random() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Builds a keypair from raw 32-byte secret material.
    pub fn from_raw_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parses an `S…` seed string.
    pub fn from_seed(seed: &str) -> Result<Self, KeyError> {
        let raw = strkey::decode(KeyKind::Seed, seed).map_err(KeyError::InvalidSeed)?;
        Ok(Self::from_raw_seed(&raw))
    }

    /// The `S…` seed string. Handle with care.
    pub fn seed(&self) -> String {
        strkey::encode(KeyKind::Seed, &self.signing_key.to_bytes())
    }

    /// The `G…` address string.
    pub fn address(&self) -> String {
        self.public_key().address()
    }

    /// The public half of this keypair.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Signs a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }

    /// Signs a message and tags the result with this key's hint.
    pub fn sign_decorated(&self, message: &[u8]) -> DecoratedSignature {
        DecoratedSignature {
            hint: self.public_key().hint(),
            signature: self.sign(message),
        }
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_raw_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the seed. Not even "partially."
        write!(f, "KeyPair({})", self.address())
    }
}

impl PartialEq for KeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.public_key() == other.public_key()
    }
}

impl Eq for KeyPair {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// The public half of a keypair, i.e. an account address.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: [u8; 32],
}

impl PublicKey {
    /// Parses a `G…` address string.
    pub fn from_address(address: &str) -> Result<Self, KeyError> {
        let bytes = strkey::decode(KeyKind::Address, address).map_err(KeyError::InvalidAddress)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// The `G…` address string.
    pub fn address(&self) -> String {
        strkey::encode(KeyKind::Address, &self.bytes)
    }

    /// The last four bytes of the key, used to tag signatures so a
    /// verifier can match them to signers without trying every key.
    pub fn hint(&self) -> [u8; 4] {
        let mut hint = [0u8; 4];
        hint.copy_from_slice(&self.bytes[28..]);
        hint
    }

    /// Verifies a signature. `false` on any failure, including malformed
    /// signature bytes.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature.as_bytes()) else {
            return false;
        };
        key.verify(message, &DalekSignature::from_bytes(&sig_bytes))
            .is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.address())
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// A parsed key string: either a full keypair or an address on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signer {
    Full(KeyPair),
    AddressOnly(PublicKey),
}

impl Signer {
    /// Parses a seed or an address.
    pub fn parse(secret_or_public: &str) -> Result<Self, KeyError> {
        match secret_or_public.chars().next() {
            Some('S') => KeyPair::from_seed(secret_or_public).map(Self::Full),
            Some('G') => PublicKey::from_address(secret_or_public).map(Self::AddressOnly),
            _ => Err(KeyError::Unrecognized),
        }
    }

    /// The address this signer stands for.
    pub fn address(&self) -> String {
        match self {
            Self::Full(kp) => kp.address(),
            Self::AddressOnly(pk) => pk.address(),
        }
    }

    /// Signs with the underlying keypair, or fails for address-only signers.
    pub fn sign_decorated(&self, message: &[u8]) -> Result<DecoratedSignature, KeyError> {
        match self {
            Self::Full(kp) => Ok(kp.sign_decorated(message)),
            Self::AddressOnly(pk) => Err(KeyError::CannotSign(pk.address())),
        }
    }
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// An Ed25519 signature. Always 64 bytes when produced by this crate;
/// decoded envelopes may carry anything, so the bytes stay a `Vec`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    /// Wraps raw signature bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Hex encoding, mainly for logs.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() >= 128 {
            write!(f, "Signature({}...{})", &hex_str[..8], &hex_str[120..])
        } else {
            write!(f, "Signature({})", hex_str)
        }
    }
}

/// A signature tagged with the signer's key hint, as stored in envelopes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedSignature {
    pub hint: [u8; 4],
    pub signature: Signature,
}

/// Converts an address-or-seed string into the address it refers to.
pub fn address_of(address_or_seed: &str) -> Result<String, KeyError> {
    Signer::parse(address_or_seed).map(|s| s.address())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_keypairs_differ() {
        let a = KeyPair::random();
        let b = KeyPair::random();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn seed_round_trip() {
        let kp = KeyPair::random();
        let restored = KeyPair::from_seed(&kp.seed()).unwrap();
        assert_eq!(kp, restored);
        assert_eq!(kp.address(), restored.address());
    }

    #[test]
    fn address_round_trip() {
        let kp = KeyPair::random();
        let pk = PublicKey::from_address(&kp.address()).unwrap();
        assert_eq!(pk, kp.public_key());
    }

    #[test]
    fn sign_and_verify() {
        let kp = KeyPair::random();
        let sig = kp.sign(b"hello");
        assert_eq!(sig.as_bytes().len(), 64);
        assert!(kp.public_key().verify(b"hello", &sig));
        assert!(!kp.public_key().verify(b"goodbye", &sig));
        assert!(!KeyPair::random().public_key().verify(b"hello", &sig));
    }

    #[test]
    fn decorated_signature_carries_hint() {
        let kp = KeyPair::random();
        let dsig = kp.sign_decorated(b"tx hash");
        assert_eq!(dsig.hint, kp.public_key().as_bytes()[28..]);
    }

    #[test]
    fn signer_parse_distinguishes_kinds() {
        let kp = KeyPair::random();

        match Signer::parse(&kp.seed()).unwrap() {
            Signer::Full(parsed) => assert_eq!(parsed, kp),
            other => panic!("expected full signer, got {:?}", other),
        }
        match Signer::parse(&kp.address()).unwrap() {
            Signer::AddressOnly(pk) => assert_eq!(pk, kp.public_key()),
            other => panic!("expected address-only signer, got {:?}", other),
        }
        assert_eq!(Signer::parse("nonsense"), Err(KeyError::Unrecognized));
    }

    #[test]
    fn address_only_signer_cannot_sign() {
        let kp = KeyPair::random();
        let signer = Signer::parse(&kp.address()).unwrap();
        assert_eq!(
            signer.sign_decorated(b"x"),
            Err(KeyError::CannotSign(kp.address()))
        );
    }

    #[test]
    fn address_of_normalizes_seeds() {
        let kp = KeyPair::random();
        assert_eq!(address_of(&kp.seed()).unwrap(), kp.address());
        assert_eq!(address_of(&kp.address()).unwrap(), kp.address());
    }

    #[test]
    fn debug_does_not_leak_seed() {
        let kp = KeyPair::random();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("KeyPair(G"));
        assert!(!debug_str.contains(&kp.seed()));
    }

    #[test]
    fn deterministic_from_raw_seed() {
        let a = KeyPair::from_raw_seed(&[42u8; 32]);
        let b = KeyPair::from_raw_seed(&[42u8; 32]);
        assert_eq!(a.address(), b.address());
        assert_eq!(a.sign(b"m"), b.sign(b"m"));
    }
}
