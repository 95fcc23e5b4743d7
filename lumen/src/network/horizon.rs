//! Horizon HTTP backend.
//!
//! A thin blocking client over three Horizon endpoints:
//!
//! | Method | Path              | Used for                      |
//! |--------|-------------------|-------------------------------|
//! | GET    | `/accounts/{id}`  | account snapshot, sequence    |
//! | POST   | `/transactions`   | envelope submission (`tx=`)   |
//! | GET    | `/paths`          | path-payment candidates       |
//!
//! Amounts arrive as decimal strings and are parsed with the same codec
//! the public API uses. Problem documents (`application/problem+json`)
//! become [`LedgerError::Rejected`] with the result codes from
//! `extras.result_codes`; anything else that goes wrong is a
//! [`LedgerError::Transport`].

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::{LedgerBackend, Problem, ResultCodes, TxResponse};
use crate::account::{AccountSigner, AccountSnapshot, Balance, Thresholds};
use crate::amount::{parse_amount, to_amount_string};
use crate::asset::{Asset, AssetType};
use crate::error::LedgerError;
use crate::paths::{PathQuery, PathResult};
use crate::transaction::AccountFlags;

/// A [`LedgerBackend`] talking to a Horizon server.
#[derive(Debug, Clone)]
pub struct Horizon {
    base_url: String,
    http: HttpClient,
}

impl Horizon {
    /// Creates a client for `base_url` with the given request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .user_agent(concat!("lumen/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(transport)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The underlying HTTP client, shared with the federation resolver.
    pub fn http_client(&self) -> &HttpClient {
        &self.http
    }
}

impl LedgerBackend for Horizon {
    fn load_account(&self, address: &str) -> Result<AccountSnapshot, LedgerError> {
        let url = format!("{}/accounts/{}", self.base_url, address);
        debug!(%url, "loading account");
        let resp = self.http.get(&url).send().map_err(transport)?;
        let account: HorizonAccount = read(resp)?;
        account.into_snapshot()
    }

    fn submit_envelope(&self, envelope_b64: &str) -> Result<TxResponse, LedgerError> {
        let url = format!("{}/transactions", self.base_url);
        debug!(%url, bytes = envelope_b64.len(), "submitting transaction");
        let resp = self
            .http
            .post(&url)
            .form(&[("tx", envelope_b64)])
            .send()
            .map_err(transport)?;
        read(resp)
    }

    fn find_paths(&self, query: &PathQuery) -> Result<Vec<PathResult>, LedgerError> {
        let url = format!("{}/paths", self.base_url);
        let mut params = vec![
            ("source_account", query.source_account.clone()),
            ("destination_account", query.destination_account.clone()),
            ("destination_amount", to_amount_string(query.destination_amount)),
        ];
        params.extend(destination_asset_params(&query.destination_asset)?);

        debug!(%url, "searching paths");
        let resp = self.http.get(&url).query(&params).send().map_err(transport)?;
        let page: Page<HorizonPath> = read(resp)?;
        page.embedded
            .records
            .into_iter()
            .map(HorizonPath::into_result)
            .collect()
    }
}

fn transport(e: reqwest::Error) -> LedgerError {
    if e.is_timeout() {
        LedgerError::Transport(format!("request timed out: {}", e))
    } else {
        LedgerError::Transport(e.to_string())
    }
}

/// Decodes a success body, or turns an error body into the right failure.
pub(crate) fn read<T: DeserializeOwned>(resp: Response) -> Result<T, LedgerError> {
    let status = resp.status();
    let body = resp.text().map_err(transport)?;

    if status.is_success() {
        return serde_json::from_str(&body)
            .map_err(|e| LedgerError::Transport(format!("unreadable response: {}", e)));
    }

    match serde_json::from_str::<HorizonProblem>(&body) {
        Ok(problem) => Err(LedgerError::Rejected(problem.into_problem(status.as_u16()))),
        Err(_) => Err(LedgerError::Transport(format!(
            "unexpected HTTP {} from server",
            status.as_u16()
        ))),
    }
}

fn destination_asset_params(asset: &Asset) -> Result<Vec<(&'static str, String)>, LedgerError> {
    let mut params = vec![("destination_asset_type", asset.asset_type.to_string())];
    if !asset.is_native() {
        params.push(("destination_asset_code", asset.code.clone()));
        params.push(("destination_asset_issuer", asset.issuer_address()?));
    }
    Ok(params)
}

// ---------------------------------------------------------------------------
// Wire documents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HorizonProblem {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    status: Option<u16>,
    #[serde(default)]
    detail: String,
    #[serde(default)]
    extras: Option<ProblemExtras>,
}

#[derive(Debug, Deserialize)]
struct ProblemExtras {
    #[serde(default)]
    result_codes: Option<ResultCodes>,
}

impl HorizonProblem {
    fn into_problem(self, http_status: u16) -> Problem {
        Problem {
            kind: self.kind,
            title: self.title,
            status: self.status.unwrap_or(http_status),
            detail: self.detail,
            result_codes: self.extras.and_then(|e| e.result_codes),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HorizonAccount {
    account_id: String,
    sequence: String,
    #[serde(default)]
    balances: Vec<HorizonBalance>,
    #[serde(default)]
    signers: Vec<HorizonSigner>,
    #[serde(default)]
    thresholds: HorizonThresholds,
    #[serde(default)]
    flags: HorizonFlags,
    #[serde(default)]
    home_domain: String,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct HorizonBalance {
    balance: String,
    #[serde(default)]
    limit: Option<String>,
    asset_type: String,
    #[serde(default)]
    asset_code: String,
    #[serde(default)]
    asset_issuer: String,
    #[serde(default)]
    is_authorized: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct HorizonSigner {
    key: String,
    weight: u32,
}

#[derive(Debug, Default, Deserialize)]
struct HorizonThresholds {
    #[serde(default)]
    low_threshold: u32,
    #[serde(default)]
    med_threshold: u32,
    #[serde(default)]
    high_threshold: u32,
}

#[derive(Debug, Default, Deserialize)]
struct HorizonFlags {
    #[serde(default)]
    auth_required: bool,
    #[serde(default)]
    auth_revocable: bool,
    #[serde(default)]
    auth_immutable: bool,
}

impl HorizonFlags {
    fn to_flags(&self) -> AccountFlags {
        let mut flags = AccountFlags::NONE;
        if self.auth_required {
            flags = flags | AccountFlags::AUTH_REQUIRED;
        }
        if self.auth_revocable {
            flags = flags | AccountFlags::AUTH_REVOCABLE;
        }
        if self.auth_immutable {
            flags = flags | AccountFlags::AUTH_IMMUTABLE;
        }
        flags
    }
}

fn parse_asset(asset_type: &str, code: &str, issuer: &str) -> Result<Asset, LedgerError> {
    match AssetType::from_horizon(asset_type) {
        Some(AssetType::Native) => Ok(Asset::native()),
        Some(kind) => Ok(Asset::new(code, issuer, kind)),
        None => Err(LedgerError::Transport(format!(
            "unsupported asset type {:?} in response",
            asset_type
        ))),
    }
}

fn parse_wire_amount(s: &str) -> Result<i64, LedgerError> {
    parse_amount(s).map_err(|e| LedgerError::Transport(format!("bad amount in response: {}", e)))
}

impl HorizonAccount {
    fn into_snapshot(self) -> Result<AccountSnapshot, LedgerError> {
        let sequence = self
            .sequence
            .parse::<i64>()
            .map_err(|_| LedgerError::Transport(format!("bad sequence {:?} in response", self.sequence)))?;

        let mut balances = Vec::with_capacity(self.balances.len());
        for b in &self.balances {
            // Pool shares and other exotic lines are skipped.
            if AssetType::from_horizon(&b.asset_type).is_none() {
                continue;
            }
            balances.push(Balance {
                asset: parse_asset(&b.asset_type, &b.asset_code, &b.asset_issuer)?,
                amount: parse_wire_amount(&b.balance)?,
                limit: b.limit.as_deref().map(parse_wire_amount).transpose()?,
                authorized: b.is_authorized.unwrap_or(true),
            });
        }

        let mut master_weight = 0;
        let mut signers = Vec::new();
        for s in self.signers {
            if s.key == self.account_id {
                master_weight = s.weight;
            } else {
                signers.push(AccountSigner {
                    key: s.key,
                    weight: s.weight,
                });
            }
        }

        let mut data = BTreeMap::new();
        for (key, value) in self.data {
            let bytes = BASE64
                .decode(value.as_bytes())
                .map_err(|e| LedgerError::Transport(format!("bad data entry {:?}: {}", key, e)))?;
            data.insert(key, bytes);
        }

        Ok(AccountSnapshot {
            address: self.account_id,
            sequence,
            balances,
            signers,
            thresholds: Thresholds {
                low: self.thresholds.low_threshold,
                medium: self.thresholds.med_threshold,
                high: self.thresholds.high_threshold,
                master_weight,
            },
            flags: self.flags.to_flags(),
            home_domain: self.home_domain,
            data,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(rename = "_embedded")]
    embedded: Embedded<T>,
}

#[derive(Debug, Deserialize)]
struct Embedded<T> {
    records: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HorizonPathAsset {
    asset_type: String,
    #[serde(default)]
    asset_code: String,
    #[serde(default)]
    asset_issuer: String,
}

#[derive(Debug, Deserialize)]
struct HorizonPath {
    source_asset_type: String,
    #[serde(default)]
    source_asset_code: String,
    #[serde(default)]
    source_asset_issuer: String,
    source_amount: String,
    destination_asset_type: String,
    #[serde(default)]
    destination_asset_code: String,
    #[serde(default)]
    destination_asset_issuer: String,
    destination_amount: String,
    #[serde(default)]
    path: Vec<HorizonPathAsset>,
}

impl HorizonPath {
    fn into_result(self) -> Result<PathResult, LedgerError> {
        let hops = self
            .path
            .iter()
            .map(|a| parse_asset(&a.asset_type, &a.asset_code, &a.asset_issuer))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PathResult {
            source_asset: parse_asset(
                &self.source_asset_type,
                &self.source_asset_code,
                &self.source_asset_issuer,
            )?,
            source_amount: parse_wire_amount(&self.source_amount)?,
            destination_asset: parse_asset(
                &self.destination_asset_type,
                &self.destination_asset_code,
                &self.destination_asset_issuer,
            )?,
            destination_amount: parse_wire_amount(&self.destination_amount)?,
            hops,
        })
    }
}
