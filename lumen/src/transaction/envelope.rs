//! Transaction envelopes and their transport encoding.
//!
//! An [`Envelope`] is a [`Transaction`] plus the decorated signatures
//! collected so far. On the wire it travels as `base64(bincode(envelope))`.
//!
//! # Hashing
//!
//! What signers sign is not the transaction bytes but a network-bound
//! digest:
//!
//! ```text
//! sha256( network_id || ENVELOPE_TYPE_TX || bincode(transaction) )
//! ```
//!
//! where `network_id = sha256(passphrase)`. Binding the passphrase means a
//! signature collected for the test network is worthless on the public one.
//! Signatures themselves are excluded, so the hash is stable while signers
//! are appended.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{Memo, Operation, TimeBounds};
use crate::crypto::hash::{network_id, sha256_multi};
use crate::crypto::DecoratedSignature;

/// Envelope type tag mixed into the transaction hash.
pub const ENVELOPE_TYPE_TX: [u8; 4] = 2u32.to_be_bytes();

/// Errors from encoding or decoding envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("envelope is not valid base64: {0}")]
    Base64(String),

    #[error("envelope body could not be decoded: {0}")]
    Decode(String),

    #[error("envelope could not be encoded: {0}")]
    Encode(String),
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// The signed part of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Fee-paying account; its sequence number is consumed.
    pub source_account: String,
    /// Total fee in stroops.
    pub fee: u32,
    pub sequence: i64,
    pub time_bounds: Option<TimeBounds>,
    pub memo: Memo,
    /// Applied in order, atomically.
    pub operations: Vec<Operation>,
}

impl Transaction {
    /// Canonical bytes of the transaction body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        bincode::serialize(self).map_err(|e| EnvelopeError::Encode(e.to_string()))
    }
}

/// Computes the network-bound hash that signers sign.
pub fn hash(tx: &Transaction, passphrase: &str) -> Result<[u8; 32], EnvelopeError> {
    let body = tx.to_bytes()?;
    let id = network_id(passphrase);
    Ok(sha256_multi(&[id.as_slice(), ENVELOPE_TYPE_TX.as_slice(), body.as_slice()]))
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A transaction and its signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub tx: Transaction,
    pub signatures: Vec<DecoratedSignature>,
}

impl Envelope {
    /// Wraps an unsigned transaction.
    pub fn new(tx: Transaction) -> Self {
        Self {
            tx,
            signatures: Vec::new(),
        }
    }

    /// Hash of the inner transaction for the given network.
    pub fn hash(&self, passphrase: &str) -> Result<[u8; 32], EnvelopeError> {
        hash(&self.tx, passphrase)
    }

    /// Hex form of [`Envelope::hash`], as the ledger reports it.
    pub fn hash_hex(&self, passphrase: &str) -> Result<String, EnvelopeError> {
        self.hash(passphrase).map(hex::encode)
    }
}

/// Encodes an envelope for transport.
pub fn encode(envelope: &Envelope) -> Result<String, EnvelopeError> {
    let bytes = bincode::serialize(envelope).map_err(|e| EnvelopeError::Encode(e.to_string()))?;
    Ok(BASE64.encode(bytes))
}

/// Decodes a transport-encoded envelope.
pub fn decode(b64: &str) -> Result<Envelope, EnvelopeError> {
    let bytes = BASE64
        .decode(b64.trim())
        .map_err(|e| EnvelopeError::Base64(e.to_string()))?;
    bincode::deserialize(&bytes).map_err(|e| EnvelopeError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::config::{PUBLIC_PASSPHRASE, TEST_PASSPHRASE};
    use crate::crypto::KeyPair;
    use crate::transaction::types::OperationBody;

    fn sample() -> Transaction {
        let kp = KeyPair::from_raw_seed(&[5u8; 32]);
        Transaction {
            source_account: kp.address(),
            fee: 100,
            sequence: 42,
            time_bounds: None,
            memo: Memo::Text("hello".into()),
            operations: vec![Operation::new(OperationBody::Payment {
                destination: KeyPair::from_raw_seed(&[6u8; 32]).address(),
                asset: Asset::native(),
                amount: 10_000_000,
            })],
        }
    }

    #[test]
    fn encode_decode_preserves_envelope() {
        let kp = KeyPair::from_raw_seed(&[5u8; 32]);
        let mut env = Envelope::new(sample());
        let h = env.hash(TEST_PASSPHRASE).unwrap();
        env.signatures.push(kp.sign_decorated(&h));

        let b64 = encode(&env).unwrap();
        assert_eq!(decode(&b64).unwrap(), env);
    }

    #[test]
    fn hash_is_bound_to_network() {
        let tx = sample();
        assert_ne!(
            hash(&tx, TEST_PASSPHRASE).unwrap(),
            hash(&tx, PUBLIC_PASSPHRASE).unwrap()
        );
    }

    #[test]
    fn hash_ignores_signatures() {
        let kp = KeyPair::random();
        let mut env = Envelope::new(sample());
        let before = env.hash(TEST_PASSPHRASE).unwrap();
        env.signatures.push(kp.sign_decorated(&before));
        assert_eq!(env.hash(TEST_PASSPHRASE).unwrap(), before);
        assert_eq!(env.hash_hex(TEST_PASSPHRASE).unwrap().len(), 64);
    }

    #[test]
    fn hash_changes_with_sequence() {
        let a = sample();
        let mut b = sample();
        b.sequence += 1;
        assert_ne!(
            hash(&a, TEST_PASSPHRASE).unwrap(),
            hash(&b, TEST_PASSPHRASE).unwrap()
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode("!!!not base64"), Err(EnvelopeError::Base64(_))));
        assert!(matches!(decode("AAAA"), Err(EnvelopeError::Decode(_))));
    }
}
