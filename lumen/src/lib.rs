// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Lumen - Ledger Transaction Client
//!
//! Lumen builds, signs, and submits transactions for Stellar-style ledger
//! networks. You call `pay`, `set_flags`, `add_signer`; it worries about
//! sequence numbers, fees, envelopes, and which keys sign what.
//!
//! ## Architecture
//!
//! The crate is layered from pure value types up to the orchestrator:
//!
//! - **amount** - Decimal strings ⇄ integer stroops. No floats near money.
//! - **asset** / **account** - Validated value objects.
//! - **crypto** - Ed25519 keys, StrKey addresses, SHA-256.
//! - **transaction** - Operations, envelopes, the [`Tx`] builder.
//! - **options** - Per-call modifiers and how they merge into a session.
//! - **paths** - Path-payment queries and candidate filtering.
//! - **network** - Horizon over HTTP, an in-memory ledger, federation.
//! - **client** - [`Client`], one method per operation, plus sessions.
//! - **config** - Network constants, [`NetworkConfig`], TOML config.
//! - **error** - [`LedgerError`], which every fallible call returns.
//!
//! ## Two ways to transact
//!
//! Called on its own, every mutating method is one transaction: built,
//! signed, submitted, done. Between [`Client::start`] and
//! [`Client::submit`] the same methods queue operations instead, and the
//! whole batch lands atomically or not at all.

pub mod account;
pub mod amount;
pub mod asset;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod network;
pub mod options;
pub mod paths;
pub mod transaction;

pub use account::{AccountSnapshot, Balance};
pub use amount::{canonical_amount, parse_amount, to_amount_string};
pub use asset::{Asset, AssetType};
pub use client::Client;
pub use config::{ClientConfig, NetworkConfig};
pub use crypto::{is_valid_address, is_valid_address_or_seed, is_valid_seed, KeyPair};
pub use error::{LedgerError, SessionError};
pub use network::{FederationResolver, LedgerBackend, Problem, TxResponse};
pub use options::Options;
pub use paths::{PathQuery, PathResult};
pub use transaction::{AccountFlags, Memo, TimeBounds, Tx};
