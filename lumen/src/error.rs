//! Crate-wide error type.
//!
//! Every fallible public operation returns [`LedgerError`]. It is `Clone`
//! so the client handle can keep a copy of the last failure around for
//! [`crate::Client::err`] while still handing one to the caller.
//!
//! Errors raised deep in the stack are wrapped with a stage label on the
//! way up (`"could not load account"`, `"hash failed"`, …) using
//! [`LedgerError::context`]. The original cause survives the wrapping:
//! [`LedgerError::problem`] digs the ledger's problem document back out.

use thiserror::Error;

use crate::amount::AmountError;
use crate::asset::AssetError;
use crate::config::ConfigError;
use crate::crypto::KeyError;
use crate::network::{Problem, ResultCodes};
use crate::transaction::EnvelopeError;

/// Misuse of the session state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no transaction in progress: call start() first")]
    NotOpen,

    #[error("a transaction is already in progress")]
    AlreadyOpen,

    #[error("transaction has no operations")]
    Empty,

    #[error("transaction was already submitted or its payload extracted")]
    Terminal,

    #[error("transaction already has the maximum of {0} operations")]
    TooManyOperations(usize),
}

/// Everything that can go wrong talking to the ledger.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Bad arguments caught before anything was built or sent.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("no paths found from {from} to {to}")]
    NoPathFound { from: String, to: String },

    #[error("{stage}: {source}")]
    Context {
        stage: String,
        #[source]
        source: Box<LedgerError>,
    },

    /// The request never got a ledger verdict: connection, timeout, or an
    /// unreadable response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The ledger answered and said no.
    #[error("ledger rejected request: {0}")]
    Rejected(Problem),

    #[error("federation error: {0}")]
    Federation(String),
}

impl LedgerError {
    /// Shorthand for a [`LedgerError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Wraps `self` with a stage label.
    pub fn context(self, stage: impl Into<String>) -> Self {
        Self::Context {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, past any context wrappers.
    pub fn root(&self) -> &LedgerError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// The ledger's problem document, if this failure carries one.
    pub fn problem(&self) -> Option<&Problem> {
        match self.root() {
            Self::Rejected(problem) => Some(problem),
            _ => None,
        }
    }

    /// Transaction and operation result codes, if the ledger sent them.
    pub fn result_codes(&self) -> Option<&ResultCodes> {
        self.problem().and_then(|p| p.result_codes.as_ref())
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self.root(),
            Self::Validation(_) | Self::Asset(_) | Self::Amount(_)
        )
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.root(), Self::Transport(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self.root(), Self::Rejected(_))
    }

    /// The session error at the root, if any.
    pub fn session(&self) -> Option<&SessionError> {
        match self.root() {
            Self::Session(e) => Some(e),
            _ => None,
        }
    }
}

/// Attaches a stage label to the error side of a `Result`.
pub(crate) trait ResultExt<T> {
    fn stage(self, stage: &str) -> Result<T, LedgerError>;
}

impl<T, E: Into<LedgerError>> ResultExt<T> for Result<T, E> {
    fn stage(self, stage: &str) -> Result<T, LedgerError> {
        self.map_err(|e| e.into().context(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected() -> LedgerError {
        LedgerError::Rejected(Problem {
            kind: "transaction_failed".into(),
            title: "Transaction Failed".into(),
            status: 400,
            detail: "".into(),
            result_codes: Some(ResultCodes {
                transaction: "tx_failed".into(),
                operations: vec!["op_underfunded".into()],
            }),
        })
    }

    #[test]
    fn context_preserves_problem() {
        let err = rejected().context("submit failed").context("can't pay");
        assert!(err.is_rejected());
        let codes = err.result_codes().unwrap();
        assert_eq!(codes.transaction, "tx_failed");
        assert_eq!(codes.operations, vec!["op_underfunded".to_string()]);
        assert!(err.to_string().starts_with("can't pay: submit failed: "));
    }

    #[test]
    fn transport_is_not_rejected() {
        let err = LedgerError::Transport("timed out".into()).context("could not load account");
        assert!(err.is_transport());
        assert!(!err.is_rejected());
        assert!(err.problem().is_none());
    }

    #[test]
    fn stage_wraps_foreign_errors() {
        let res: Result<(), AmountError> = Err(AmountError::Empty);
        let err = res.stage("can't pay").unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "can't pay: amount is empty");
    }

    #[test]
    fn session_errors_are_reachable() {
        let err: LedgerError = SessionError::NotOpen.into();
        assert_eq!(err.session(), Some(&SessionError::NotOpen));
    }
}
