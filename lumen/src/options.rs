//! Optional per-call parameters.
//!
//! Every mutating call on [`crate::Client`] takes an `Option<&Options>`.
//! Absent means defaults: the source signs, no memo, base fee, no path.
//!
//! ```
//! use lumen::Options;
//!
//! let opts = Options::new()
//!     .with_memo_text("rent")
//!     .with_signer("GBRPYHIL2CI3FNQ4BXLFMNDLFJUNPU2HY3ZMFSHONUCEOASW7QC7OX2H");
//! assert_eq!(opts.signers.len(), 1);
//! ```
//!
//! Signers listed here *replace* the source as signer rather than joining
//! it. That's what lets the source position hold a bare address while a
//! different key does the signing.
//!
//! Inside a session, each call's options fold into the session's
//! [`EnvelopeOptions`] with [`EnvelopeOptions::merge`]: signers are
//! unioned, and single-valued settings (memo, fee, time bounds, sequence)
//! may be set once and then only repeated, never changed.

use crate::asset::{redact, Asset};
use crate::config::MAX_MEMO_TEXT_LENGTH;
use crate::crypto::is_valid_address_or_seed;
use crate::error::LedgerError;
use crate::transaction::{Memo, TimeBounds};

/// Modifiers for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Seeds (or addresses, which will fail at signing) that sign instead
    /// of the source.
    pub signers: Vec<String>,
    pub memo: Memo,
    /// Marks the transaction as multi-operation with this source account.
    pub multi_op_source: Option<String>,

    /// Path payment: pay with this asset instead of the destination asset.
    pub send_asset: Option<Asset>,
    /// Path payment: spend at most this much of `send_asset`.
    pub max_send: Option<String>,
    /// Path payment: explicit intermediate hops.
    pub path: Vec<Asset>,
    /// Path payment: search for hops from this address when `path` is empty.
    pub path_source: Option<String>,

    pub fee: Option<u32>,
    pub time_bounds: Option<TimeBounds>,
    pub sequence: Option<i64>,
    /// Offers only: create a passive offer.
    pub passive: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memo_text(mut self, text: &str) -> Self {
        self.memo = Memo::Text(text.to_string());
        self
    }

    pub fn with_memo_id(mut self, id: u64) -> Self {
        self.memo = Memo::Id(id);
        self
    }

    pub fn with_memo_hash(mut self, hash: [u8; 32]) -> Self {
        self.memo = Memo::Hash(hash);
        self
    }

    pub fn with_memo_return(mut self, hash: [u8; 32]) -> Self {
        self.memo = Memo::Return(hash);
        self
    }

    /// Adds a signer. Call repeatedly for several.
    pub fn with_signer(mut self, seed: &str) -> Self {
        self.signers.push(seed.to_string());
        self
    }

    /// Pay with `asset`, spending no more than `max_amount`.
    pub fn with_asset(mut self, asset: Asset, max_amount: &str) -> Self {
        self.send_asset = Some(asset);
        self.max_send = Some(max_amount.to_string());
        self
    }

    /// Route a path payment through these assets, in order.
    pub fn through(mut self, hops: &[Asset]) -> Self {
        self.path.extend_from_slice(hops);
        self
    }

    /// Search for a path starting at `address` instead of naming hops.
    pub fn find_path_from(mut self, address: &str) -> Self {
        self.path_source = Some(address.to_string());
        self
    }

    pub fn multi_op(mut self, source: &str) -> Self {
        self.multi_op_source = Some(source.to_string());
        self
    }

    pub fn with_fee(mut self, fee: u32) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn with_time_bounds(mut self, bounds: TimeBounds) -> Self {
        self.time_bounds = Some(bounds);
        self
    }

    pub fn with_sequence(mut self, sequence: i64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn passive(mut self) -> Self {
        self.passive = true;
        self
    }

    /// Whether any path-payment parameter is set.
    pub fn has_path_params(&self) -> bool {
        self.send_asset.is_some() || !self.path.is_empty() || self.path_source.is_some()
    }

    /// Checks the envelope-level settings.
    pub fn validate(&self) -> Result<(), LedgerError> {
        for signer in &self.signers {
            if !is_valid_address_or_seed(signer) {
                return Err(LedgerError::validation(format!(
                    "invalid signer: {}",
                    redact(signer)
                )));
            }
        }

        if let Memo::Text(text) = &self.memo {
            if text.len() > MAX_MEMO_TEXT_LENGTH {
                return Err(LedgerError::validation(format!(
                    "memo text must be at most {} bytes, got {}",
                    MAX_MEMO_TEXT_LENGTH,
                    text.len()
                )));
            }
        }

        if self.fee == Some(0) {
            return Err(LedgerError::validation("fee override must be positive"));
        }

        if let Some(bounds) = &self.time_bounds {
            if !bounds.is_valid() {
                return Err(LedgerError::validation(format!(
                    "time bounds are inverted: {} > {}",
                    bounds.min_time, bounds.max_time
                )));
            }
        }

        if let Some(seq) = self.sequence {
            if seq <= 0 {
                return Err(LedgerError::validation("sequence override must be positive"));
            }
        }

        if let Some(source) = &self.multi_op_source {
            if !is_valid_address_or_seed(source) {
                return Err(LedgerError::validation(format!(
                    "invalid multi-op source: {}",
                    redact(source)
                )));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EnvelopeOptions
// ---------------------------------------------------------------------------

/// The envelope-level settings a transaction has accumulated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvelopeOptions {
    pub signers: Vec<String>,
    pub memo: Memo,
    pub fee: Option<u32>,
    pub time_bounds: Option<TimeBounds>,
    pub sequence: Option<i64>,
}

impl EnvelopeOptions {
    /// Folds `options` in. Fails without modifying `self` if the options
    /// are invalid or conflict with what is already set.
    pub fn merge(&mut self, options: &Options) -> Result<(), LedgerError> {
        options.validate()?;

        let memo = if options.memo.is_none() {
            self.memo.clone()
        } else {
            adopt("memo", &self.memo, &options.memo, Memo::is_none)?
        };
        let fee = merge_single("fee", self.fee, options.fee)?;
        let time_bounds = merge_single("time bounds", self.time_bounds, options.time_bounds)?;
        let sequence = merge_single("sequence", self.sequence, options.sequence)?;

        for signer in &options.signers {
            if !self.signers.contains(signer) {
                self.signers.push(signer.clone());
            }
        }
        self.memo = memo;
        self.fee = fee;
        self.time_bounds = time_bounds;
        self.sequence = sequence;
        Ok(())
    }
}

fn adopt<T: Clone + PartialEq>(
    what: &str,
    current: &T,
    incoming: &T,
    is_unset: impl Fn(&T) -> bool,
) -> Result<T, LedgerError> {
    if is_unset(current) || current == incoming {
        Ok(incoming.clone())
    } else {
        Err(LedgerError::validation(format!(
            "conflicting {} for this transaction",
            what
        )))
    }
}

fn merge_single<T: Copy + PartialEq>(
    what: &str,
    current: Option<T>,
    incoming: Option<T>,
) -> Result<Option<T>, LedgerError> {
    match incoming {
        None => Ok(current),
        Some(value) => adopt(what, &current, &Some(value), Option::is_none),
    }
}
