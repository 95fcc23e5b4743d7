//! Federation address resolution.
//!
//! A federation address looks like `alice*example.com`. Resolving it is a
//! two-hop lookup:
//!
//! 1. Fetch `https://example.com/.well-known/stellar.toml` and read its
//!    `FEDERATION_SERVER` key.
//! 2. Ask that server `?q=alice*example.com&type=name` for the account ID.
//!
//! [`StaticFederation`] skips the network entirely and is what simulated
//! clients get.

use parking_lot::RwLock;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::horizon::read;
use super::FederationResolver;
use crate::crypto::is_valid_address;
use crate::error::LedgerError;

/// Splits `name*domain`, rejecting anything else.
pub fn split_federation_address(address: &str) -> Result<(&str, &str), LedgerError> {
    match address.rsplit_once('*') {
        Some((name, domain)) if !name.is_empty() && !domain.is_empty() && !domain.contains('/') => {
            Ok((name, domain))
        }
        _ => Err(LedgerError::Federation(format!(
            "not a federation address: {}",
            address
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct StellarToml {
    #[serde(rename = "FEDERATION_SERVER")]
    federation_server: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FederationRecord {
    account_id: String,
}

// ---------------------------------------------------------------------------
// HttpFederation
// ---------------------------------------------------------------------------

/// Resolves federation addresses over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFederation {
    http: HttpClient,
    scheme: String,
}

impl HttpFederation {
    pub fn new(timeout: Duration) -> Result<Self, LedgerError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self::with_client(http))
    }

    /// Reuses an existing HTTP client.
    pub fn with_client(http: HttpClient) -> Self {
        Self {
            http,
            scheme: "https".to_string(),
        }
    }

    /// Overrides the scheme used to fetch `stellar.toml`. Only local test
    /// servers should need `"http"`.
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// The `FEDERATION_SERVER` advertised by `domain`.
    pub fn federation_server(&self, domain: &str) -> Result<String, LedgerError> {
        let url = format!("{}://{}/.well-known/stellar.toml", self.scheme, domain);
        debug!(%url, "fetching stellar.toml");

        let resp = self
            .http
            .get(&url)
            .send()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(LedgerError::Federation(format!(
                "stellar.toml for {} returned HTTP {}",
                domain,
                resp.status().as_u16()
            )));
        }
        let body = resp.text().map_err(|e| LedgerError::Transport(e.to_string()))?;

        let parsed: StellarToml = toml::from_str(&body)
            .map_err(|e| LedgerError::Federation(format!("invalid stellar.toml for {}: {}", domain, e)))?;
        parsed
            .federation_server
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LedgerError::Federation(format!("{} has no FEDERATION_SERVER", domain)))
    }
}

impl FederationResolver for HttpFederation {
    fn lookup_by_address(&self, address: &str) -> Result<String, LedgerError> {
        let (_, domain) = split_federation_address(address)?;
        let server = self.federation_server(domain)?;

        debug!(%server, address, "querying federation server");
        let resp = self
            .http
            .get(&server)
            .query(&[("q", address), ("type", "name")])
            .send()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        let record: FederationRecord = read(resp)?;

        if !is_valid_address(&record.account_id) {
            return Err(LedgerError::Federation(format!(
                "federation server returned an invalid account id for {}",
                address
            )));
        }
        Ok(record.account_id)
    }
}

// ---------------------------------------------------------------------------
// StaticFederation
// ---------------------------------------------------------------------------

/// An in-memory federation table.
#[derive(Debug, Default)]
pub struct StaticFederation {
    entries: RwLock<HashMap<String, String>>,
}

impl StaticFederation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `name*domain` to `address`.
    pub fn insert(&self, federation_address: &str, address: &str) {
        self.entries
            .write()
            .insert(federation_address.to_string(), address.to_string());
    }
}

impl FederationResolver for StaticFederation {
    fn lookup_by_address(&self, address: &str) -> Result<String, LedgerError> {
        split_federation_address(address)?;
        self.entries
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| LedgerError::Federation(format!("no federation record for {}", address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_accepts_name_star_domain() {
        assert_eq!(
            split_federation_address("alice*example.com").unwrap(),
            ("alice", "example.com")
        );
        assert_eq!(
            split_federation_address("alice@mail.com*example.com").unwrap(),
            ("alice@mail.com", "example.com")
        );
        assert!(split_federation_address("alice").is_err());
        assert!(split_federation_address("*example.com").is_err());
        assert!(split_federation_address("alice*").is_err());
    }

    #[test]
    fn stellar_toml_parses_federation_server() {
        let parsed: StellarToml =
            toml::from_str("VERSION = \"2.0.0\"\nFEDERATION_SERVER = \"https://fed.example.com/federation\"\n")
                .unwrap();
        assert_eq!(
            parsed.federation_server.as_deref(),
            Some("https://fed.example.com/federation")
        );
    }

    #[test]
    fn static_table_resolves() {
        let fed = StaticFederation::new();
        fed.insert("bob*example.com", "GBOB");
        assert_eq!(fed.lookup_by_address("bob*example.com").unwrap(), "GBOB");
        assert!(matches!(
            fed.lookup_by_address("carol*example.com"),
            Err(LedgerError::Federation(_))
        ));
    }
}
