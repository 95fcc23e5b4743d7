//! Asset descriptors.
//!
//! An asset is either the native lumen or a credit issued by some account,
//! identified by `(code, issuer)`. Credit codes come in two widths:
//! `Credit4` for 1–4 character codes and `Credit12` for 5–12.
//!
//! The issuer may be given as an address or as the issuer's seed (handy
//! when the same program issues and spends); [`Asset::issuer_address`]
//! normalizes either to the address that goes on the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::crypto::{address_of, is_valid_address_or_seed};

/// Errors raised by [`Asset::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("asset code must not be empty")]
    EmptyCode,

    #[error("asset code {code:?} must be {min}-{max} alphanumeric characters for {kind}")]
    InvalidCode {
        code: String,
        kind: AssetType,
        min: usize,
        max: usize,
    },

    #[error("invalid issuer {0:?} for asset")]
    InvalidIssuer(String),

    #[error("native asset must not carry a code or issuer")]
    NativeWithIssuer,
}

/// The kind of asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetType {
    Native,
    Credit4,
    Credit12,
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Credit4 => write!(f, "credit_alphanum4"),
            Self::Credit12 => write!(f, "credit_alphanum12"),
        }
    }
}

impl AssetType {
    /// Parses Horizon's `asset_type` field.
    pub fn from_horizon(s: &str) -> Option<Self> {
        match s {
            "native" => Some(Self::Native),
            "credit_alphanum4" => Some(Self::Credit4),
            "credit_alphanum12" => Some(Self::Credit12),
            _ => None,
        }
    }
}

/// An asset on the ledger.
///
/// ```
/// use lumen::asset::{Asset, AssetType};
/// use lumen::crypto::KeyPair;
///
/// let issuer = KeyPair::random();
/// let usd = Asset::new("USD", &issuer.address(), AssetType::Credit4);
/// assert!(usd.validate().is_ok());
/// assert!(Asset::native().is_native());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub code: String,
    pub issuer: String,
    pub asset_type: AssetType,
}

impl Asset {
    /// Creates a credit asset. Not validated until [`Asset::validate`].
    pub fn new(code: &str, issuer: &str, asset_type: AssetType) -> Self {
        Self {
            code: code.to_string(),
            issuer: issuer.to_string(),
            asset_type,
        }
    }

    /// Creates a credit asset, picking `Credit4` or `Credit12` by code length.
    pub fn credit(code: &str, issuer: &str) -> Self {
        let asset_type = if code.len() <= 4 {
            AssetType::Credit4
        } else {
            AssetType::Credit12
        };
        Self::new(code, issuer, asset_type)
    }

    /// The native asset.
    pub fn native() -> Self {
        Self {
            code: String::new(),
            issuer: String::new(),
            asset_type: AssetType::Native,
        }
    }

    /// Returns `true` for the native asset.
    pub fn is_native(&self) -> bool {
        self.asset_type == AssetType::Native
    }

    /// Checks code width, code alphabet, and issuer key.
    pub fn validate(&self) -> Result<(), AssetError> {
        let (min, max) = match self.asset_type {
            AssetType::Native => {
                if !self.code.is_empty() || !self.issuer.is_empty() {
                    return Err(AssetError::NativeWithIssuer);
                }
                return Ok(());
            }
            AssetType::Credit4 => (1, 4),
            AssetType::Credit12 => (5, 12),
        };

        if self.code.is_empty() {
            return Err(AssetError::EmptyCode);
        }

        let len = self.code.len();
        if len < min || len > max || !self.code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(AssetError::InvalidCode {
                code: self.code.clone(),
                kind: self.asset_type,
                min,
                max,
            });
        }

        if !is_valid_address_or_seed(&self.issuer) {
            return Err(AssetError::InvalidIssuer(redact(&self.issuer)));
        }

        Ok(())
    }

    /// The issuer as an address, converting a seed if one was supplied.
    pub fn issuer_address(&self) -> Result<String, AssetError> {
        address_of(&self.issuer).map_err(|_| AssetError::InvalidIssuer(redact(&self.issuer)))
    }

    /// A validated copy whose issuer is an address, ready for the ledger.
    pub fn to_ledger(&self) -> Result<Self, AssetError> {
        self.validate()?;
        if self.is_native() {
            return Ok(Self::native());
        }
        Ok(Self {
            code: self.code.clone(),
            issuer: self.issuer_address()?,
            asset_type: self.asset_type,
        })
    }

    /// Compares two assets by ledger identity (seed and address issuers
    /// for the same account compare equal).
    pub fn same_as(&self, other: &Asset) -> bool {
        match (self.to_ledger(), other.to_ledger()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "native")
        } else {
            let issuer = self.issuer_address().unwrap_or_else(|_| "?".to_string());
            write!(f, "{}:{}", self.code, issuer)
        }
    }
}

/// Seeds must never end up in an error message.
pub(crate) fn redact(s: &str) -> String {
    if s.starts_with('S') {
        "S…(redacted)".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    #[test]
    fn native_validates() {
        assert!(Asset::native().validate().is_ok());
        let bogus = Asset {
            code: "XLM".to_string(),
            issuer: String::new(),
            asset_type: AssetType::Native,
        };
        assert_eq!(bogus.validate(), Err(AssetError::NativeWithIssuer));
    }

    #[test]
    fn credit_code_widths() {
        let issuer = KeyPair::random().address();
        assert!(Asset::new("USD", &issuer, AssetType::Credit4).validate().is_ok());
        assert!(Asset::new("LONGCODE", &issuer, AssetType::Credit12).validate().is_ok());
        assert!(Asset::new("USDXX", &issuer, AssetType::Credit4).validate().is_err());
        assert!(Asset::new("USD", &issuer, AssetType::Credit12).validate().is_err());
        assert!(Asset::new("US-D", &issuer, AssetType::Credit4).validate().is_err());
        assert_eq!(
            Asset::new("", &issuer, AssetType::Credit4).validate(),
            Err(AssetError::EmptyCode)
        );
    }

    #[test]
    fn credit_picks_width() {
        let issuer = KeyPair::random().address();
        assert_eq!(Asset::credit("EUR", &issuer).asset_type, AssetType::Credit4);
        assert_eq!(Asset::credit("EUROS", &issuer).asset_type, AssetType::Credit12);
    }

    #[test]
    fn issuer_must_be_a_key() {
        let asset = Asset::new("USD", "not-a-key", AssetType::Credit4);
        assert!(matches!(asset.validate(), Err(AssetError::InvalidIssuer(_))));
    }

    #[test]
    fn seed_issuer_normalizes_to_address() {
        let kp = KeyPair::random();
        let by_seed = Asset::new("USD", &kp.seed(), AssetType::Credit4);
        let by_address = Asset::new("USD", &kp.address(), AssetType::Credit4);

        assert_eq!(by_seed.to_ledger().unwrap(), by_address);
        assert!(by_seed.same_as(&by_address));
        assert!(!by_seed.to_string().contains(&kp.seed()));
    }

    #[test]
    fn invalid_seed_issuer_is_redacted() {
        let asset = Asset::new("USD", "SBOGUS", AssetType::Credit4);
        let err = asset.validate().unwrap_err().to_string();
        assert!(!err.contains("SBOGUS"));
    }

    #[test]
    fn horizon_type_names() {
        assert_eq!(AssetType::from_horizon("native"), Some(AssetType::Native));
        assert_eq!(
            AssetType::from_horizon("credit_alphanum12"),
            Some(AssetType::Credit12)
        );
        assert_eq!(AssetType::from_horizon("liquidity_pool_shares"), None);
        assert_eq!(AssetType::Credit4.to_string(), "credit_alphanum4");
    }
}
