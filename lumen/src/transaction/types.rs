//! Core type definitions for ledger transactions.
//!
//! These types form the vocabulary of every envelope the client builds:
//! operations, memos, account flags, time bounds, and offer prices. They
//! carry already-validated values (addresses, not seeds; stroops, not
//! decimal strings). Validation happens in the orchestrator before any of
//! these are constructed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

use crate::amount::{parse_amount, AmountError};
use crate::asset::Asset;
use crate::config::STROOPS_PER_UNIT;

// ---------------------------------------------------------------------------
// Memo
// ---------------------------------------------------------------------------

/// Envelope memo. At most one per transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Memo {
    #[default]
    None,
    /// UTF-8 text, at most 28 bytes.
    Text(String),
    Id(u64),
    Hash([u8; 32]),
    /// Hash of the transaction this one refunds.
    Return([u8; 32]),
}

impl Memo {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Text(text) => write!(f, "text:{}", text),
            Self::Id(id) => write!(f, "id:{}", id),
            Self::Hash(hash) => write!(f, "hash:{}", hex::encode(hash)),
            Self::Return(hash) => write!(f, "return:{}", hex::encode(hash)),
        }
    }
}

// ---------------------------------------------------------------------------
// AccountFlags
// ---------------------------------------------------------------------------

/// Account authorization flags, combinable with `|`.
///
/// ```
/// use lumen::transaction::AccountFlags;
///
/// let flags = AccountFlags::AUTH_REQUIRED | AccountFlags::AUTH_REVOCABLE;
/// assert_eq!(flags.bits(), 3);
/// assert!(flags.contains(AccountFlags::AUTH_REVOCABLE));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AccountFlags(u32);

impl AccountFlags {
    pub const NONE: Self = Self(0);
    /// Trust lines to this issuer need explicit authorization.
    pub const AUTH_REQUIRED: Self = Self(1);
    /// The issuer may revoke authorization on existing trust lines.
    pub const AUTH_REVOCABLE: Self = Self(2);
    /// No flag may ever be changed again, and the account can't be merged.
    pub const AUTH_IMMUTABLE: Self = Self(4);

    const ALL: u32 = 1 | 2 | 4;

    /// Builds flags from raw bits, dropping unknown ones.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for AccountFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// TimeBounds
// ---------------------------------------------------------------------------

/// Validity window in Unix seconds. `max_time == 0` means no upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBounds {
    pub min_time: u64,
    pub max_time: u64,
}

impl TimeBounds {
    pub fn new(min_time: u64, max_time: u64) -> Self {
        Self { min_time, max_time }
    }

    /// Valid from now until `seconds` from now.
    pub fn expires_in(seconds: u64) -> Self {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        Self {
            min_time: 0,
            max_time: now + seconds,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.max_time == 0 || self.min_time <= self.max_time
    }
}

// ---------------------------------------------------------------------------
// Price
// ---------------------------------------------------------------------------

/// Offer price as a reduced fraction `n / d` of buying per selling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub n: i32,
    pub d: i32,
}

impl Price {
    /// Parses a decimal price such as `"1.25"` into a reduced fraction.
    ///
    /// Goes through the amount codec, so the same 7-digit precision applies.
    pub fn parse(s: &str) -> Result<Self, AmountError> {
        let n = parse_amount(s)?;
        if n == 0 {
            return Err(AmountError::Malformed(s.to_string()));
        }
        let d = STROOPS_PER_UNIT;
        let g = gcd(n, d);
        let (n, d) = (n / g, d / g);

        let n = i32::try_from(n).map_err(|_| AmountError::Overflow(s.to_string()))?;
        let d = i32::try_from(d).map_err(|_| AmountError::Overflow(s.to_string()))?;
        Ok(Self { n, d })
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.n, self.d)
    }
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.abs().max(1)
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// A new signer, or a weight change for an existing one. Weight 0 removes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerEntry {
    pub key: String,
    pub weight: u32,
}

/// Everything a set-options operation can touch. `None` leaves the
/// account's current value alone.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SetOptionsOp {
    pub clear_flags: Option<AccountFlags>,
    pub set_flags: Option<AccountFlags>,
    pub master_weight: Option<u32>,
    pub low_threshold: Option<u32>,
    pub med_threshold: Option<u32>,
    pub high_threshold: Option<u32>,
    pub home_domain: Option<String>,
    pub signer: Option<SignerEntry>,
}

/// The operation-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationBody {
    CreateAccount {
        destination: String,
        starting_balance: i64,
    },
    Payment {
        destination: String,
        asset: Asset,
        amount: i64,
    },
    PathPayment {
        send_asset: Asset,
        send_max: i64,
        destination: String,
        dest_asset: Asset,
        dest_amount: i64,
        path: Vec<Asset>,
    },
    /// Creates (`offer_id == 0`), updates, or deletes (`amount == 0`) an offer.
    ManageOffer {
        selling: Asset,
        buying: Asset,
        amount: i64,
        price: Price,
        offer_id: u64,
        passive: bool,
    },
    /// A limit of 0 removes the trust line.
    ChangeTrust {
        line: Asset,
        limit: i64,
    },
    AllowTrust {
        trustor: String,
        asset_code: String,
        authorize: bool,
    },
    SetOptions(SetOptionsOp),
    /// `value == None` deletes the entry.
    ManageData {
        name: String,
        value: Option<Vec<u8>>,
    },
}

impl OperationBody {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateAccount { .. } => "create_account",
            Self::Payment { .. } => "payment",
            Self::PathPayment { .. } => "path_payment",
            Self::ManageOffer { .. } => "manage_offer",
            Self::ChangeTrust { .. } => "change_trust",
            Self::AllowTrust { .. } => "allow_trust",
            Self::SetOptions(_) => "set_options",
            Self::ManageData { .. } => "manage_data",
        }
    }
}

/// One operation, with an optional per-operation source account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub source_account: Option<String>,
    pub body: OperationBody,
}

impl Operation {
    pub fn new(body: OperationBody) -> Self {
        Self {
            source_account: None,
            body,
        }
    }

    pub fn with_source(mut self, address: &str) -> Self {
        self.source_account = Some(address.to_string());
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_combine_and_mask() {
        let all = AccountFlags::AUTH_REQUIRED | AccountFlags::AUTH_REVOCABLE | AccountFlags::AUTH_IMMUTABLE;
        assert_eq!(all.bits(), 7);
        assert!(all.contains(AccountFlags::AUTH_IMMUTABLE));
        assert!(!AccountFlags::AUTH_REQUIRED.contains(AccountFlags::AUTH_REVOCABLE));
        assert_eq!(AccountFlags::from_bits(0xFF).bits(), 7);
        assert!(AccountFlags::NONE.is_empty());
    }

    #[test]
    fn price_reduces() {
        assert_eq!(Price::parse("1.5").unwrap(), Price { n: 3, d: 2 });
        assert_eq!(Price::parse("2").unwrap(), Price { n: 2, d: 1 });
        assert_eq!(Price::parse("0.0000001").unwrap(), Price { n: 1, d: 10_000_000 });
    }

    #[test]
    fn price_rejects_zero_and_garbage() {
        assert!(Price::parse("0").is_err());
        assert!(Price::parse("abc").is_err());
        assert!(Price::parse("1.12345678").is_err());
    }

    #[test]
    fn price_overflowing_i32_is_rejected() {
        assert!(matches!(
            Price::parse("3000000000"),
            Err(AmountError::Overflow(_))
        ));
    }

    #[test]
    fn time_bounds_validity() {
        assert!(TimeBounds::new(10, 20).is_valid());
        assert!(TimeBounds::new(10, 0).is_valid());
        assert!(!TimeBounds::new(20, 10).is_valid());
        assert!(TimeBounds::expires_in(60).max_time > 0);
    }

    #[test]
    fn memo_display() {
        assert_eq!(Memo::Text("hi".into()).to_string(), "text:hi");
        assert_eq!(Memo::Id(7).to_string(), "id:7");
        assert!(Memo::default().is_none());
    }

    #[test]
    fn operation_kinds() {
        let op = Operation::new(OperationBody::ManageData {
            name: "k".into(),
            value: None,
        })
        .with_source("GABC");
        assert_eq!(op.body.kind(), "manage_data");
        assert_eq!(op.source_account.as_deref(), Some("GABC"));
    }
}
