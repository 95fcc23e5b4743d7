//! # Network Configuration & Constants
//!
//! Every magic number the client depends on lives here: network
//! passphrases, Horizon endpoints, fee and size limits. If you're
//! hardcoding one of these somewhere else, move it here.
//!
//! The passphrase is the most important value in this file. It is mixed
//! into every transaction hash, so a transaction signed for the test
//! network is worthless on the public one (and vice versa). Getting it
//! wrong doesn't lose money, it just makes every submission fail with
//! `tx_bad_auth`, which is arguably worse for your afternoon.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Network Identifiers
// ---------------------------------------------------------------------------

/// Passphrase of the public (production) network.
pub const PUBLIC_PASSPHRASE: &str = "Public Global Stellar Network ; September 2015";

/// Passphrase of the public test network.
pub const TEST_PASSPHRASE: &str = "Test SDF Network ; September 2015";

/// Passphrase used by the in-process simulated ledger. Never reaches a
/// real network, so it only has to be distinct from the two above.
pub const SIMULATED_PASSPHRASE: &str = "Lumen Simulated Network ; local";

/// Horizon endpoint for the public network.
pub const PUBLIC_HORIZON_URL: &str = "https://horizon.stellar.org";

/// Horizon endpoint for the test network.
pub const TEST_HORIZON_URL: &str = "https://horizon-testnet.stellar.org";

// ---------------------------------------------------------------------------
// Amounts & Fees
// ---------------------------------------------------------------------------

/// Number of stroops in one whole unit. Amounts are fixed-point with
/// seven fractional digits; there is no floating point anywhere near them.
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// Maximum fractional digits accepted in an amount string.
pub const AMOUNT_DECIMALS: usize = 7;

/// Base fee per operation, in stroops.
pub const BASE_FEE_STROOPS: u32 = 100;

// ---------------------------------------------------------------------------
// Field Limits
// ---------------------------------------------------------------------------

/// Maximum byte length of a data entry key and of its value.
pub const MAX_DATA_ENTRY_LENGTH: usize = 64;

/// Maximum byte length of a text memo.
pub const MAX_MEMO_TEXT_LENGTH: usize = 28;

/// Maximum byte length of an account home domain.
pub const MAX_HOME_DOMAIN_LENGTH: usize = 32;

/// Maximum number of operations in one transaction envelope.
pub const MAX_OPERATIONS_PER_TX: usize = 100;

/// Default timeout for a single HTTP round trip to Horizon or a
/// federation server.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while selecting or loading a network configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The network name is not one of `public`, `test`, `simulated`, `custom`.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    /// A custom network was requested without the named parameter.
    #[error("custom network requires a {0}")]
    MissingParameter(&'static str),

    /// The configuration file could not be read.
    #[error("could not read config file {path}: {reason}")]
    Io { path: String, reason: String },

    /// The configuration file is not valid TOML for [`ClientConfig`].
    #[error("invalid config file: {0}")]
    Parse(String),
}

// ---------------------------------------------------------------------------
// NetworkConfig
// ---------------------------------------------------------------------------

/// Which ledger network a client talks to.
///
/// Each variant carries exactly the parameters it needs. Named presets
/// need nothing; a custom network needs an endpoint and a passphrase;
/// the simulated network runs entirely in-process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "network", rename_all = "lowercase")]
pub enum NetworkConfig {
    /// The public production network.
    Public,
    /// The public test network.
    Test,
    /// An in-memory ledger for tests and dry runs.
    Simulated,
    /// A self-hosted Horizon endpoint.
    Custom { url: String, passphrase: String },
}

impl NetworkConfig {
    /// Selects a network by name.
    ///
    /// `url` and `passphrase` are only consulted for `"custom"`, where both
    /// are required. `"fake"` is accepted as an alias for `"simulated"`.
    pub fn from_name(
        name: &str,
        url: Option<&str>,
        passphrase: Option<&str>,
    ) -> Result<Self, ConfigError> {
        match name.to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "test" => Ok(Self::Test),
            "simulated" | "fake" => Ok(Self::Simulated),
            "custom" => {
                let url = url
                    .filter(|u| !u.is_empty())
                    .ok_or(ConfigError::MissingParameter("url"))?;
                let passphrase = passphrase
                    .filter(|p| !p.is_empty())
                    .ok_or(ConfigError::MissingParameter("passphrase"))?;
                Ok(Self::Custom {
                    url: url.trim_end_matches('/').to_string(),
                    passphrase: passphrase.to_string(),
                })
            }
            other => Err(ConfigError::UnknownNetwork(other.to_string())),
        }
    }

    /// Parses a compact, semicolon-separated network spec.
    ///
    /// ```text
    /// "test"                                  -> Test
    /// "public"                                -> Public
    /// "custom;https://horizon.example;my pass" -> Custom
    /// ""                                      -> Test
    /// ```
    pub fn from_spec(spec: &str) -> Result<Self, ConfigError> {
        let mut parts = spec.splitn(3, ';');
        let name = match parts.next().map(str::trim) {
            Some("") | None => "test",
            Some(name) => name,
        };
        let url = parts.next();
        let passphrase = parts.next();
        Self::from_name(name, url, passphrase)
    }

    /// The passphrase bound into every transaction hash on this network.
    pub fn passphrase(&self) -> &str {
        match self {
            Self::Public => PUBLIC_PASSPHRASE,
            Self::Test => TEST_PASSPHRASE,
            Self::Simulated => SIMULATED_PASSPHRASE,
            Self::Custom { passphrase, .. } => passphrase,
        }
    }

    /// The Horizon base URL, or `None` for the simulated network.
    pub fn horizon_url(&self) -> Option<&str> {
        match self {
            Self::Public => Some(PUBLIC_HORIZON_URL),
            Self::Test => Some(TEST_HORIZON_URL),
            Self::Simulated => None,
            Self::Custom { url, .. } => Some(url),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Test => "test",
            Self::Simulated => "simulated",
            Self::Custom { .. } => "custom",
        }
    }

    /// Returns `true` for the in-process simulated network.
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated)
    }
}

// ---------------------------------------------------------------------------
// ClientConfig
// ---------------------------------------------------------------------------

/// File-level client configuration.
///
/// ```toml
/// network = "custom"
/// url = "https://horizon.example.org"
/// passphrase = "Example Network ; 2024"
/// timeout_secs = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Network name, as accepted by [`NetworkConfig::from_name`].
    pub network: String,
    /// Horizon URL for custom networks.
    pub url: Option<String>,
    /// Passphrase for custom networks.
    pub passphrase: Option<String>,
    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: "test".to_string(),
            url: None,
            passphrase: None,
            timeout_secs: DEFAULT_HTTP_TIMEOUT.as_secs(),
        }
    }
}

impl ClientConfig {
    /// Parses a TOML document.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&source)
    }

    /// Resolves the network selection.
    pub fn network(&self) -> Result<NetworkConfig, ConfigError> {
        NetworkConfig::from_name(
            &self.network,
            self.url.as_deref(),
            self.passphrase.as_deref(),
        )
    }

    /// HTTP timeout as a [`Duration`]. Zero falls back to the default.
    pub fn timeout(&self) -> Duration {
        if self.timeout_secs == 0 {
            DEFAULT_HTTP_TIMEOUT
        } else {
            Duration::from_secs(self.timeout_secs)
        }
    }
}
