//! # Network Module
//!
//! Everything that leaves the process. The orchestrator only ever talks to
//! two traits:
//!
//! - [`LedgerBackend`] - load accounts, submit envelopes, search paths.
//! - [`FederationResolver`] - turn `name*domain` into an address.
//!
//! ## Architecture
//!
//! ```text
//! horizon.rs    - LedgerBackend over the Horizon HTTP API (blocking reqwest)
//! simulated.rs  - In-memory LedgerBackend for tests and local experiments
//! federation.rs - stellar.toml + federation server lookups, and a static map
//! ```
//!
//! ## Error model
//!
//! Backends report two kinds of failure and never blur them:
//! [`LedgerError::Transport`] when no verdict came back (connection refused,
//! timeout, garbage body) and [`LedgerError::Rejected`] when the ledger
//! answered with a problem document. Result codes inside the problem are
//! preserved verbatim.

pub mod federation;
pub mod horizon;
pub mod simulated;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::account::AccountSnapshot;
use crate::error::LedgerError;
use crate::paths::{PathQuery, PathResult};

pub use federation::{HttpFederation, StaticFederation};
pub use horizon::Horizon;
pub use simulated::SimulatedLedger;

// ---------------------------------------------------------------------------
// Response and problem documents
// ---------------------------------------------------------------------------

/// What the ledger returns for an accepted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxResponse {
    pub hash: String,
    pub ledger: u64,
    #[serde(rename = "envelope_xdr", default)]
    pub envelope: String,
    #[serde(rename = "result_xdr", default)]
    pub result: String,
}

/// Transaction-level and per-operation result codes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultCodes {
    pub transaction: String,
    #[serde(default)]
    pub operations: Vec<String>,
}

/// A ledger-side failure (RFC 7807 style).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub result_codes: Option<ResultCodes>,
}

impl Problem {
    /// A problem for an account that doesn't exist.
    pub fn not_found(resource: &str) -> Self {
        Self {
            kind: "not_found".into(),
            title: "Resource Missing".into(),
            status: 404,
            detail: format!("{} was not found", resource),
            result_codes: None,
        }
    }

    /// A failed transaction with the given codes.
    pub fn transaction_failed(transaction: &str, operations: Vec<String>) -> Self {
        Self {
            kind: "transaction_failed".into(),
            title: "Transaction Failed".into(),
            status: 400,
            detail: String::new(),
            result_codes: Some(ResultCodes {
                transaction: transaction.to_string(),
                operations,
            }),
        }
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title, self.status)?;
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        if let Some(codes) = &self.result_codes {
            write!(f, " [{}", codes.transaction)?;
            if !codes.operations.is_empty() {
                write!(f, ": {}", codes.operations.join(", "))?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// The ledger as the orchestrator sees it.
pub trait LedgerBackend: Send + Sync {
    /// Current state of an account.
    fn load_account(&self, address: &str) -> Result<AccountSnapshot, LedgerError>;

    /// The sequence number a new transaction from `address` builds on.
    fn sequence(&self, address: &str) -> Result<i64, LedgerError> {
        self.load_account(address).map(|account| account.sequence)
    }

    /// Submits a transport-encoded envelope. Never retries.
    fn submit_envelope(&self, envelope_b64: &str) -> Result<TxResponse, LedgerError>;

    /// Candidate conversion paths, best first.
    fn find_paths(&self, query: &PathQuery) -> Result<Vec<PathResult>, LedgerError>;
}

/// Resolves `name*domain` federation addresses.
pub trait FederationResolver: Send + Sync {
    fn lookup_by_address(&self, address: &str) -> Result<String, LedgerError>;
}
