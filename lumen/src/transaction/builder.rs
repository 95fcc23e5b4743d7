//! Transaction construction, signing, and submission.
//!
//! A [`Tx`] owns exactly one ledger transaction from the first operation
//! to the terminal step. Its life is short and one-way:
//!
//! ```text
//! Building --append()*--> Building --sign()--> Signed --submit()/payload()--> Terminal
//! ```
//!
//! Once terminal, nothing can be appended; a new `Tx` is needed. The
//! orchestrator creates one per implicit call, or one per session.
//!
//! Sequence numbers come from the backend (`account sequence + 1`) unless
//! an override was supplied, and the fee is `BASE_FEE × operations` unless
//! overridden.

use tracing::{debug, info, warn};

use super::envelope::{self, Envelope, Transaction};
use super::types::{Operation, OperationBody};
use crate::config::{BASE_FEE_STROOPS, MAX_OPERATIONS_PER_TX};
use crate::crypto::{address_of, Signer};
use crate::error::{LedgerError, ResultExt, SessionError};
use crate::network::{LedgerBackend, TxResponse};
use crate::options::{EnvelopeOptions, Options};

/// Whether a transaction is submitted right away or accumulates a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    /// One operation, signed and submitted by the call that created it.
    Implicit,
    /// Operations accumulate until the caller closes the session.
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Building,
    Signed,
    Terminal,
}

// ---------------------------------------------------------------------------
// Tx
// ---------------------------------------------------------------------------

/// One transaction on its way to the ledger.
#[derive(Debug, Clone)]
pub struct Tx {
    passphrase: String,
    mode: TxMode,
    /// Address or seed of the fee-paying source.
    source: Option<String>,
    options: EnvelopeOptions,
    operations: Vec<Operation>,
    envelope: Option<Envelope>,
    response: Option<TxResponse>,
    state: TxState,
}

impl Tx {
    /// An implicit, single-call transaction for the given network.
    pub fn new(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.to_string(),
            mode: TxMode::Implicit,
            source: None,
            options: EnvelopeOptions::default(),
            operations: Vec::new(),
            envelope: None,
            response: None,
            state: TxState::Building,
        }
    }

    /// A session transaction whose fee and sequence come from `source`.
    pub fn session(passphrase: &str, source: &str, options: Option<&Options>) -> Result<Self, LedgerError> {
        let mut tx = Self::new(passphrase);
        tx.mode = TxMode::Session;
        tx.source = Some(source.to_string());
        if let Some(options) = options {
            if options.has_path_params() {
                return Err(LedgerError::validation(
                    "path payment options are not valid when starting a transaction",
                ));
            }
            tx.merge_options(options)?;
        }
        // Without explicit signers the source signs, and later per-call
        // signers join it rather than replace it.
        if tx.options.signers.is_empty() {
            tx.options.signers.push(source.to_string());
        }
        Ok(tx)
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    pub fn is_session(&self) -> bool {
        self.mode == TxMode::Session
    }

    pub fn is_signed(&self) -> bool {
        self.state != TxState::Building
    }

    pub fn is_terminal(&self) -> bool {
        self.state == TxState::Terminal
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// The fee-paying source as given (address or seed).
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn options(&self) -> &EnvelopeOptions {
        &self.options
    }

    /// Operations in the order they were appended.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The signed envelope, once [`Tx::sign`] has run.
    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    pub fn response(&self) -> Option<&TxResponse> {
        self.response.as_ref()
    }

    /// Folds per-call options into the transaction.
    pub fn merge_options(&mut self, options: &Options) -> Result<(), LedgerError> {
        if self.is_signed() {
            return Err(SessionError::Terminal.into());
        }
        self.options.merge(options)
    }

    /// Appends one operation on behalf of `source` (address or seed).
    ///
    /// In implicit mode the first source becomes the transaction source.
    /// In session mode the operation records its own source account.
    pub fn append(&mut self, source: &str, body: OperationBody) -> Result<(), LedgerError> {
        if self.is_signed() {
            return Err(SessionError::Terminal.into());
        }
        if self.operations.len() >= MAX_OPERATIONS_PER_TX {
            return Err(SessionError::TooManyOperations(MAX_OPERATIONS_PER_TX).into());
        }

        let address = address_of(source)?;
        let op = match self.mode {
            TxMode::Implicit => {
                if self.source.is_none() {
                    self.source = Some(source.to_string());
                }
                Operation::new(body)
            }
            TxMode::Session => Operation::new(body).with_source(&address),
        };

        debug!(
            kind = op.body.kind(),
            source = %address,
            position = self.operations.len(),
            "appending operation"
        );
        self.operations.push(op);
        Ok(())
    }

    /// The keys that will sign: the explicit signers if any, else the source.
    ///
    /// Session transactions always carry their signers explicitly; see
    /// [`Tx::session`].
    pub fn signers(&self) -> Vec<String> {
        if !self.options.signers.is_empty() {
            return self.options.signers.clone();
        }
        self.source.iter().cloned().collect()
    }

    /// Assembles the unsigned transaction.
    pub fn build(&self, backend: &dyn LedgerBackend) -> Result<Transaction, LedgerError> {
        if self.operations.is_empty() {
            return Err(SessionError::Empty.into());
        }
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| LedgerError::validation("transaction has no source account"))?;
        let source_address = address_of(source).stage("invalid source")?;

        let sequence = match self.options.sequence {
            Some(seq) => seq,
            None => backend
                .sequence(&source_address)
                .map_err(|e| e.context("could not load account"))?
                .checked_add(1)
                .ok_or_else(|| LedgerError::validation("sequence number overflow"))?,
        };

        let fee = match self.options.fee {
            Some(fee) => fee,
            None => BASE_FEE_STROOPS
                .checked_mul(self.operations.len() as u32)
                .ok_or_else(|| LedgerError::validation("fee overflow"))?,
        };

        Ok(Transaction {
            source_account: source_address,
            fee,
            sequence,
            time_bounds: self.options.time_bounds,
            memo: self.options.memo.clone(),
            operations: self.operations.clone(),
        })
    }

    /// Builds and signs with every signer, in order.
    pub fn sign(&mut self, backend: &dyn LedgerBackend) -> Result<(), LedgerError> {
        if self.is_signed() {
            return Ok(());
        }

        let tx = self.build(backend)?;
        let hash = envelope::hash(&tx, &self.passphrase).stage("hash failed")?;

        let mut env = Envelope::new(tx);
        for key in self.signers() {
            let signer = Signer::parse(&key).stage("parse failed")?;
            let signature = signer.sign_decorated(&hash).stage("sign failed")?;
            env.signatures.push(signature);
        }

        debug!(
            hash = %hex::encode(hash),
            signatures = env.signatures.len(),
            operations = env.tx.operations.len(),
            "signed transaction"
        );
        self.envelope = Some(env);
        self.state = TxState::Signed;
        Ok(())
    }

    /// Signs if needed and returns the encoded envelope without submitting.
    /// The transaction becomes terminal.
    pub fn payload(&mut self, backend: &dyn LedgerBackend) -> Result<String, LedgerError> {
        if self.is_terminal() {
            return Err(SessionError::Terminal.into());
        }
        self.sign(backend)?;
        let payload = self.encoded()?;
        self.state = TxState::Terminal;
        Ok(payload)
    }

    /// Signs if needed and submits. The transaction becomes terminal
    /// whether or not the ledger accepts it.
    pub fn submit(&mut self, backend: &dyn LedgerBackend) -> Result<&TxResponse, LedgerError> {
        if self.is_terminal() {
            return Err(SessionError::Terminal.into());
        }
        self.sign(backend)?;
        let payload = self.encoded()?;
        self.state = TxState::Terminal;

        match backend.submit_envelope(&payload) {
            Ok(response) => {
                info!(
                    hash = %response.hash,
                    ledger = response.ledger,
                    operations = self.operations.len(),
                    "transaction submitted"
                );
                Ok(self.response.insert(response))
            }
            Err(e) => {
                warn!(error = %e, "transaction submission failed");
                Err(e.context("submit failed"))
            }
        }
    }

    fn encoded(&self) -> Result<String, LedgerError> {
        let env = self
            .envelope
            .as_ref()
            .ok_or_else(|| LedgerError::validation("transaction is not signed"))?;
        envelope::encode(env).stage("could not encode transaction")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Asset;
    use crate::config::TEST_PASSPHRASE;
    use crate::crypto::KeyPair;
    use crate::network::SimulatedLedger;
    use crate::transaction::Memo;

    fn payment(to: &KeyPair) -> OperationBody {
        OperationBody::Payment {
            destination: to.address(),
            asset: Asset::native(),
            amount: 10_000_000,
        }
    }

    #[test]
    fn implicit_tx_takes_first_source() {
        let src = KeyPair::random();
        let dst = KeyPair::random();
        let mut tx = Tx::new(TEST_PASSPHRASE);
        tx.append(&src.seed(), payment(&dst)).unwrap();

        assert_eq!(tx.source(), Some(src.seed().as_str()));
        assert_eq!(tx.signers(), vec![src.seed()]);
        assert!(tx.operations()[0].source_account.is_none());
    }

    #[test]
    fn session_records_operation_sources() {
        let src = KeyPair::random();
        let other = KeyPair::random();
        let mut tx = Tx::session(TEST_PASSPHRASE, &src.seed(), None).unwrap();
        tx.append(&other.seed(), payment(&src)).unwrap();

        assert!(tx.is_session());
        assert_eq!(
            tx.operations()[0].source_account.as_deref(),
            Some(other.address().as_str())
        );
        assert_eq!(tx.signers(), vec![src.seed()]);
    }

    #[test]
    fn session_signers_join_the_source() {
        let src = KeyPair::random();
        let cosigner = KeyPair::random();
        let mut tx = Tx::session(TEST_PASSPHRASE, &src.seed(), None).unwrap();
        tx.merge_options(&Options::new().with_signer(&cosigner.seed()))
            .unwrap();
        tx.merge_options(&Options::new().with_signer(&src.seed()))
            .unwrap();
        assert_eq!(tx.signers(), vec![src.seed(), cosigner.seed()]);
    }

    #[test]
    fn explicit_signers_replace_source() {
        let src = KeyPair::random();
        let signer = KeyPair::random();
        let opts = Options::new().with_signer(&signer.seed());
        let tx = Tx::session(TEST_PASSPHRASE, &src.address(), Some(&opts)).unwrap();
        assert_eq!(tx.signers(), vec![signer.seed()]);
    }

    #[test]
    fn build_uses_sequence_and_fee_rules() {
        let ledger = SimulatedLedger::new(TEST_PASSPHRASE);
        let src = KeyPair::random();
        let dst = KeyPair::random();

        let mut tx = Tx::new(TEST_PASSPHRASE);
        tx.append(&src.seed(), payment(&dst)).unwrap();
        tx.append(&src.seed(), payment(&dst)).unwrap();
        let built = tx.build(&ledger).unwrap();
        let expected_seq = ledger.sequence(&src.address()).unwrap() + 1;

        assert_eq!(built.sequence, expected_seq);
        assert_eq!(built.fee, 2 * BASE_FEE_STROOPS);
        assert_eq!(built.source_account, src.address());

        tx.merge_options(&Options::new().with_fee(1234).with_sequence(77).with_memo_id(3))
            .unwrap();
        let built = tx.build(&ledger).unwrap();
        assert_eq!(built.fee, 1234);
        assert_eq!(built.sequence, 77);
        assert_eq!(built.memo, Memo::Id(3));
    }

    #[test]
    fn empty_tx_does_not_build() {
        let ledger = SimulatedLedger::new(TEST_PASSPHRASE);
        let tx = Tx::session(TEST_PASSPHRASE, &KeyPair::random().seed(), None).unwrap();
        let err = tx.build(&ledger).unwrap_err();
        assert_eq!(err.session(), Some(&SessionError::Empty));
    }

    #[test]
    fn sign_orders_signatures_by_signer() {
        let ledger = SimulatedLedger::new(TEST_PASSPHRASE);
        let src = KeyPair::random();
        let a = KeyPair::random();
        let b = KeyPair::random();

        let mut tx = Tx::new(TEST_PASSPHRASE);
        tx.merge_options(&Options::new().with_signer(&a.seed()).with_signer(&b.seed()))
            .unwrap();
        tx.append(&src.address(), payment(&a)).unwrap();
        tx.sign(&ledger).unwrap();

        let env = tx.envelope().unwrap();
        let hash = env.hash(TEST_PASSPHRASE).unwrap();
        assert_eq!(env.signatures.len(), 2);
        assert_eq!(env.signatures[0].hint, a.public_key().hint());
        assert_eq!(env.signatures[1].hint, b.public_key().hint());
        assert!(b.public_key().verify(&hash, &env.signatures[1].signature));
    }

    #[test]
    fn address_only_signer_fails_to_sign() {
        let ledger = SimulatedLedger::new(TEST_PASSPHRASE);
        let src = KeyPair::random();
        let mut tx = Tx::new(TEST_PASSPHRASE);
        tx.append(&src.address(), payment(&src)).unwrap();

        let err = tx.sign(&ledger).unwrap_err();
        assert!(err.to_string().starts_with("sign failed"));
        assert!(!tx.is_signed());
    }

    #[test]
    fn payload_is_terminal() {
        let ledger = SimulatedLedger::new(TEST_PASSPHRASE);
        let src = KeyPair::random();
        let mut tx = Tx::new(TEST_PASSPHRASE);
        tx.append(&src.seed(), payment(&KeyPair::random())).unwrap();

        let payload = tx.payload(&ledger).unwrap();
        let decoded = envelope::decode(&payload).unwrap();
        assert_eq!(decoded.signatures.len(), 1);

        assert!(tx.is_terminal());
        let err = tx.append(&src.seed(), payment(&src)).unwrap_err();
        assert_eq!(err.session(), Some(&SessionError::Terminal));
        assert!(tx.payload(&ledger).is_err());
    }

    #[test]
    fn operation_cap_is_enforced() {
        let src = KeyPair::random();
        let mut tx = Tx::new(TEST_PASSPHRASE);
        for _ in 0..MAX_OPERATIONS_PER_TX {
            tx.append(&src.seed(), payment(&src)).unwrap();
        }
        let err = tx.append(&src.seed(), payment(&src)).unwrap_err();
        assert_eq!(
            err.session(),
            Some(&SessionError::TooManyOperations(MAX_OPERATIONS_PER_TX))
        );
    }
}
