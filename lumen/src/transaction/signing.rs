//! Signing envelopes that were built elsewhere.
//!
//! Multi-party flows pass an encoded envelope around: one party builds it
//! (see [`crate::Client::payload`]), others add their signatures, and
//! whoever holds it last submits. Each step here is decode → hash under
//! the local network passphrase → append → re-encode. Existing
//! signatures are kept as they are.

use tracing::debug;

use super::envelope::{self, Envelope};
use crate::crypto::KeyPair;
use crate::error::{LedgerError, ResultExt};

/// Appends one decorated signature per seed, in argument order.
pub fn sign_envelope(envelope: &mut Envelope, passphrase: &str, seeds: &[&str]) -> Result<(), LedgerError> {
    let hash = envelope.hash(passphrase).stage("hash failed")?;

    for seed in seeds {
        let keypair = KeyPair::from_seed(seed).stage("parse failed")?;
        envelope.signatures.push(keypair.sign_decorated(&hash));
        debug!(signer = %keypair.address(), "added signature");
    }
    Ok(())
}

/// Decodes `b64`, signs it with `seeds`, and re-encodes it.
pub fn sign_encoded(b64: &str, passphrase: &str, seeds: &[&str]) -> Result<String, LedgerError> {
    let mut env = envelope::decode(b64).stage("could not decode transaction")?;
    sign_envelope(&mut env, passphrase, seeds)?;
    envelope::encode(&env).stage("could not encode transaction")
}
