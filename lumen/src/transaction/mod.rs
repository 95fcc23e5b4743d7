//! # Transaction Module
//!
//! Construction, encoding, and signing of ledger transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs    - Operations, memos, flags, time bounds, prices
//! envelope.rs - Transaction + signatures, transport encoding, network-bound hash
//! builder.rs  - Tx: accumulate operations, sign, submit or extract payload
//! signing.rs  - Add signatures to an envelope built elsewhere
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build** - [`Tx::append`] operations (one for implicit calls, many
//!    for sessions).
//! 2. **Sign** - [`Tx::sign`] loads the sequence number and signs the
//!    network-bound hash with every signer.
//! 3. **Close** - [`Tx::submit`] sends it; [`Tx::payload`] hands it back
//!    encoded instead. Either way the `Tx` is finished.
//!
//! ## Design Decisions
//!
//! - The envelope body is `bincode`, wrapped in base64 for transport. It is
//!   self-describing enough for this client and its simulated ledger, and
//!   makes no claim to be the ledger's native binary format.
//! - All amounts are `i64` stroops. No floating point anywhere near money.

pub mod builder;
pub mod envelope;
pub mod signing;
pub mod types;

pub use builder::{Tx, TxMode};
pub use envelope::{decode, encode, hash, Envelope, EnvelopeError, Transaction};
pub use signing::{sign_encoded, sign_envelope};
pub use types::{
    AccountFlags, Memo, Operation, OperationBody, Price, SetOptionsOp, SignerEntry, TimeBounds,
};
