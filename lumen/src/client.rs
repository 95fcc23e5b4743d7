//! # Client
//!
//! The handle applications hold. Each public method is one ledger
//! operation, and each decides where its operation goes:
//!
//! - **No session open**: a fresh [`Tx`] is built, the operation
//!   appended, and the transaction signed and submitted before the call
//!   returns.
//! - **Session open** (after [`Client::start`]): the operation is appended
//!   to the open transaction. Nothing touches the network until
//!   [`Client::submit`] or [`Client::payload`] closes the session.
//!
//! ```text
//!   Idle ──start──▶ Open ──op──▶ Open
//!    ▲               │
//!    └─submit/payload/abort─┘
//! ```
//!
//! Every call records its outcome: [`Client::err`] holds the last error
//! (cleared on success) and [`Client::last_transaction`] the most recent
//! transaction.
//!
//! ## Example
//!
//! ```
//! use lumen::{Client, NetworkConfig};
//!
//! let mut client = Client::new(NetworkConfig::Simulated).unwrap();
//! let alice = client.create_keypair();
//! let bob = client.create_keypair();
//!
//! client.fund_account(&alice.seed(), &bob.address(), "100", None).unwrap();
//! client
//!     .start(&alice.seed(), None)
//!     .unwrap()
//!     .pay_native(&alice.seed(), &bob.address(), "1.5", None)
//!     .unwrap();
//! client.set_home_domain(&alice.seed(), "example.com", None).unwrap();
//! client.submit().unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::account::AccountSnapshot;
use crate::amount::parse_amount;
use crate::asset::{redact, Asset};
use crate::config::{
    ClientConfig, NetworkConfig, DEFAULT_HTTP_TIMEOUT, MAX_DATA_ENTRY_LENGTH,
    MAX_HOME_DOMAIN_LENGTH,
};
use crate::crypto::{address_of, is_valid_address, is_valid_address_or_seed, KeyPair};
use crate::error::{LedgerError, ResultExt, SessionError};
use crate::network::{
    FederationResolver, Horizon, HttpFederation, LedgerBackend, SimulatedLedger,
    StaticFederation, TxResponse,
};
use crate::options::Options;
use crate::paths::{filter_candidates, PathQuery, PathResult};
use crate::transaction::{
    sign_encoded, AccountFlags, OperationBody, Price, SetOptionsOp, SignerEntry, Tx,
};

/// Largest signer weight or threshold the ledger stores.
const MAX_WEIGHT: u32 = 255;

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
enum Session {
    #[default]
    Idle,
    Open(Tx),
}

#[derive(Debug)]
enum Event {
    Start(Tx),
    Close,
    Abort,
}

impl Session {
    /// Applies `event`. Close and abort hand back the transaction that was
    /// open; a rejected event leaves the state as it was.
    fn transition(&mut self, event: Event) -> Result<Option<Tx>, SessionError> {
        let (next, outcome) = match (std::mem::take(self), event) {
            (Session::Idle, Event::Start(tx)) => (Session::Open(tx), Ok(None)),
            (open @ Session::Open(_), Event::Start(_)) => (open, Err(SessionError::AlreadyOpen)),
            (Session::Open(tx), Event::Close) if tx.operations().is_empty() => {
                (Session::Open(tx), Err(SessionError::Empty))
            }
            (Session::Open(tx), Event::Close | Event::Abort) => (Session::Idle, Ok(Some(tx))),
            (Session::Idle, Event::Close | Event::Abort) => (Session::Idle, Err(SessionError::NotOpen)),
        };
        *self = next;
        outcome
    }

    fn open_tx(&self) -> Option<&Tx> {
        match self {
            Session::Open(tx) => Some(tx),
            Session::Idle => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A connection to one ledger network.
///
/// Methods take `&mut self`; use one handle per concurrent flow.
pub struct Client {
    network: NetworkConfig,
    backend: Arc<dyn LedgerBackend>,
    federation: Arc<dyn FederationResolver>,
    session: Session,
    last_tx: Option<Tx>,
    last_err: Option<LedgerError>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("network", &self.network.name())
            .field("session_open", &self.session.open_tx().is_some())
            .field("last_err", &self.last_err)
            .finish()
    }
}

impl Client {
    /// Connects to `network` with the default HTTP timeout.
    ///
    /// The simulated network gets a fresh in-memory ledger and an empty
    /// static federation table.
    pub fn new(network: NetworkConfig) -> Result<Self, LedgerError> {
        Self::with_timeout(network, DEFAULT_HTTP_TIMEOUT)
    }

    /// Connects using a loaded configuration file.
    pub fn from_config(config: &ClientConfig) -> Result<Self, LedgerError> {
        Self::with_timeout(config.network()?, config.timeout())
    }

    /// Connects to `network`, bounding every HTTP request by `timeout`.
    pub fn with_timeout(network: NetworkConfig, timeout: Duration) -> Result<Self, LedgerError> {
        let Some(url) = network.horizon_url().map(str::to_string) else {
            let ledger = Arc::new(SimulatedLedger::new(network.passphrase()));
            return Ok(Self::with_backend(network, ledger, Arc::new(StaticFederation::new())));
        };

        let horizon = Horizon::new(&url, timeout)?;
        let federation = HttpFederation::with_client(horizon.http_client().clone());
        Ok(Self::with_backend(network, Arc::new(horizon), Arc::new(federation)))
    }

    /// Uses caller-supplied collaborators.
    pub fn with_backend(
        network: NetworkConfig,
        backend: Arc<dyn LedgerBackend>,
        federation: Arc<dyn FederationResolver>,
    ) -> Self {
        debug!(network = network.name(), "client created");
        Self {
            network,
            backend,
            federation,
            session: Session::Idle,
            last_tx: None,
            last_err: None,
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn backend(&self) -> &Arc<dyn LedgerBackend> {
        &self.backend
    }

    // -- Introspection -------------------------------------------------------

    /// The error from the most recent call, or `None` if it succeeded.
    pub fn err(&self) -> Option<&LedgerError> {
        self.last_err.as_ref()
    }

    /// The ledger's response to the most recent transaction, if it was
    /// accepted.
    pub fn response(&self) -> Option<&TxResponse> {
        self.last_transaction().and_then(Tx::response)
    }

    /// The open session's transaction, or else the last one closed.
    pub fn last_transaction(&self) -> Option<&Tx> {
        self.session.open_tx().or(self.last_tx.as_ref())
    }

    /// Whether a session is open.
    pub fn in_session(&self) -> bool {
        self.session.open_tx().is_some()
    }

    // -- Accounts and lookups ------------------------------------------------

    /// A fresh random keypair. Nothing is created on the ledger.
    pub fn create_keypair(&self) -> KeyPair {
        let keypair = KeyPair::random();
        debug!(address = %keypair.address(), "created keypair");
        keypair
    }

    /// Creates `address_or_seed` on the ledger with `amount` native units
    /// taken from `source`.
    pub fn fund_account(
        &mut self,
        source: &str,
        address_or_seed: &str,
        amount: &str,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_source(source)?;
            let destination = if is_valid_address_or_seed(address_or_seed) {
                address_of(address_or_seed)?
            } else {
                self.resolve_target(address_or_seed)?
            };
            let starting_balance = parse_amount(amount)?;
            debug!(%destination, starting_balance, "funding account");
            self.execute(
                source,
                OperationBody::CreateAccount {
                    destination,
                    starting_balance,
                },
                options,
            )
        })();
        self.record(result)
    }

    /// Current state of an account. Accepts a seed in place of an address.
    pub fn load_account(&mut self, address: &str) -> Result<AccountSnapshot, LedgerError> {
        let result = (|| -> Result<AccountSnapshot, LedgerError> {
            if !is_valid_address_or_seed(address) {
                return Err(LedgerError::validation(format!(
                    "invalid address: {}",
                    redact(address)
                )));
            }
            let address = address_of(address)?;
            debug!(%address, "loading account");
            self.backend
                .load_account(&address)
                .map_err(|e| e.context("could not load account"))
        })();
        self.record(result)
    }

    /// Resolves a `name*domain` federation address to an account address.
    pub fn resolve(&mut self, federation_address: &str) -> Result<String, LedgerError> {
        let result = self
            .federation
            .lookup_by_address(federation_address)
            .stage("resolve error");
        if let Ok(address) = &result {
            debug!(federation_address, %address, "resolved");
        }
        self.record(result)
    }

    // -- Payments ------------------------------------------------------------

    /// Pays `amount` of the native asset.
    pub fn pay_native(
        &mut self,
        source: &str,
        target: &str,
        amount: &str,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        self.pay(source, target, amount, &Asset::native(), options)
    }

    /// Pays `amount` of `asset` to `target`.
    ///
    /// With [`Options::with_asset`] the payer sends a different asset and
    /// the payment becomes a path payment. Hops come from
    /// [`Options::through`] if given; otherwise they are searched from
    /// [`Options::find_path_from`] and the first acceptable candidate wins.
    pub fn pay(
        &mut self,
        source: &str,
        target: &str,
        amount: &str,
        asset: &Asset,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_source(source)?;
            let destination = self.resolve_target(target)?;
            let dest_asset = asset.to_ledger()?;
            let dest_amount = parse_amount(amount)?;

            let body = match options.filter(|o| o.has_path_params()) {
                None => OperationBody::Payment {
                    destination,
                    asset: dest_asset,
                    amount: dest_amount,
                },
                Some(opts) => self.path_payment(destination, dest_asset, dest_amount, opts)?,
            };
            self.execute(source, body, options)
        })();
        self.record(result)
    }

    fn path_payment(
        &self,
        destination: String,
        dest_asset: Asset,
        dest_amount: i64,
        options: &Options,
    ) -> Result<OperationBody, LedgerError> {
        let send_asset = options
            .send_asset
            .as_ref()
            .ok_or_else(|| LedgerError::validation("path payment requires a send asset"))?
            .to_ledger()?;
        let send_max = options
            .max_send
            .as_deref()
            .ok_or_else(|| LedgerError::validation("path payment requires a maximum send amount"))
            .and_then(|max| parse_amount(max).map_err(LedgerError::from))?;

        let path = if !options.path.is_empty() {
            options
                .path
                .iter()
                .map(Asset::to_ledger)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let from = options
                .path_source
                .as_deref()
                .filter(|s| is_valid_address_or_seed(s))
                .ok_or_else(|| LedgerError::validation("not a valid source address for path search"))?;
            let query = PathQuery {
                source_account: address_of(from)?,
                destination_account: destination.clone(),
                destination_asset: dest_asset.clone(),
                destination_amount: dest_amount,
                send_asset: Some(send_asset.clone()),
                max_send: Some(send_max),
            };
            let candidates = self.search_paths(&query)?;
            let chosen = candidates.into_iter().next().ok_or_else(|| LedgerError::NoPathFound {
                from: send_asset.to_string(),
                to: dest_asset.to_string(),
            })?;
            debug!(
                hops = chosen.hops.len(),
                source_amount = chosen.source_amount,
                "selected path"
            );
            chosen.hops
        };

        Ok(OperationBody::PathPayment {
            send_asset,
            send_max,
            destination,
            dest_asset,
            dest_amount,
            path,
        })
    }

    /// Candidate paths for delivering `dest_amount` of `dest_asset` to
    /// `destination`, paid by `source`. A send asset and limit in `options`
    /// narrow the results.
    pub fn find_paths(
        &mut self,
        source: &str,
        destination: &str,
        dest_asset: &Asset,
        dest_amount: &str,
        options: Option<&Options>,
    ) -> Result<Vec<PathResult>, LedgerError> {
        let result = (|| -> Result<Vec<PathResult>, LedgerError> {
            if !is_valid_address_or_seed(source) {
                return Err(LedgerError::validation(format!(
                    "not a valid source address: {}",
                    redact(source)
                )));
            }
            let query = PathQuery {
                source_account: address_of(source)?,
                destination_account: self.resolve_target(destination)?,
                destination_asset: dest_asset.to_ledger()?,
                destination_amount: parse_amount(dest_amount)?,
                send_asset: options
                    .and_then(|o| o.send_asset.as_ref())
                    .map(Asset::to_ledger)
                    .transpose()?,
                max_send: options
                    .and_then(|o| o.max_send.as_deref())
                    .map(parse_amount)
                    .transpose()?,
            };
            self.search_paths(&query)
        })();
        self.record(result)
    }

    fn search_paths(&self, query: &PathQuery) -> Result<Vec<PathResult>, LedgerError> {
        debug!(
            source = %query.source_account,
            destination = %query.destination_account,
            asset = %query.destination_asset,
            amount = query.destination_amount,
            "searching paths"
        );
        let candidates = self
            .backend
            .find_paths(query)
            .map_err(|e| e.context("path finding error"))?;
        let total = candidates.len();
        let kept = filter_candidates(query, candidates);
        debug!(total, kept = kept.len(), "path candidates");
        Ok(kept)
    }

    // -- Trust lines ---------------------------------------------------------

    /// Lets `source` hold `asset`, up to `limit` units. An empty limit
    /// means the maximum.
    pub fn create_trust_line(
        &mut self,
        source: &str,
        asset: &Asset,
        limit: &str,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_source(source)?;
            let line = credit_asset(asset)?;
            let limit = if limit.is_empty() {
                i64::MAX
            } else {
                parse_amount(limit)?
            };
            self.execute(source, OperationBody::ChangeTrust { line, limit }, options)
        })();
        self.record(result)
    }

    /// Removes the trust line. The balance must already be zero.
    pub fn remove_trust_line(
        &mut self,
        source: &str,
        asset: &Asset,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_source(source)?;
            let line = credit_asset(asset)?;
            self.execute(source, OperationBody::ChangeTrust { line, limit: 0 }, options)
        })();
        self.record(result)
    }

    /// As issuer `source`, authorizes or deauthorizes `trustor` to hold the
    /// asset with code `asset_code`.
    pub fn allow_trust(
        &mut self,
        source: &str,
        trustor: &str,
        asset_code: &str,
        authorize: bool,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_source(source)?;
            check_address("trustor", trustor)?;
            Asset::credit(asset_code, source).validate()?;
            self.execute(
                source,
                OperationBody::AllowTrust {
                    trustor: trustor.to_string(),
                    asset_code: asset_code.to_string(),
                    authorize,
                },
                options,
            )
        })();
        self.record(result)
    }

    // -- Account options -----------------------------------------------------

    /// Sets the weight of the account's own key. Zero disables it.
    pub fn set_master_weight(
        &mut self,
        source: &str,
        weight: u32,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_weight("master weight", weight)?;
            self.set_options(
                source,
                SetOptionsOp {
                    master_weight: Some(weight),
                    ..Default::default()
                },
                options,
            )
        })();
        self.record(result)
    }

    pub fn set_flags(
        &mut self,
        source: &str,
        flags: AccountFlags,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = self.set_options(
            source,
            SetOptionsOp {
                set_flags: Some(flags),
                ..Default::default()
            },
            options,
        );
        self.record(result)
    }

    pub fn clear_flags(
        &mut self,
        source: &str,
        flags: AccountFlags,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = self.set_options(
            source,
            SetOptionsOp {
                clear_flags: Some(flags),
                ..Default::default()
            },
            options,
        );
        self.record(result)
    }

    pub fn set_home_domain(
        &mut self,
        source: &str,
        domain: &str,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            if domain.len() > MAX_HOME_DOMAIN_LENGTH {
                return Err(LedgerError::validation(format!(
                    "home domain must be at most {} bytes, got {}",
                    MAX_HOME_DOMAIN_LENGTH,
                    domain.len()
                )));
            }
            self.set_options(
                source,
                SetOptionsOp {
                    home_domain: Some(domain.to_string()),
                    ..Default::default()
                },
                options,
            )
        })();
        self.record(result)
    }

    /// Adds `signer` to the account with `weight`, or changes its weight.
    pub fn add_signer(
        &mut self,
        source: &str,
        signer: &str,
        weight: u32,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_address("signer", signer)?;
            check_weight("signer weight", weight)?;
            self.set_options(
                source,
                SetOptionsOp {
                    signer: Some(SignerEntry {
                        key: signer.to_string(),
                        weight,
                    }),
                    ..Default::default()
                },
                options,
            )
        })();
        self.record(result)
    }

    pub fn remove_signer(
        &mut self,
        source: &str,
        signer: &str,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_address("signer", signer)?;
            self.set_options(
                source,
                SetOptionsOp {
                    signer: Some(SignerEntry {
                        key: signer.to_string(),
                        weight: 0,
                    }),
                    ..Default::default()
                },
                options,
            )
        })();
        self.record(result)
    }

    pub fn set_thresholds(
        &mut self,
        source: &str,
        low: u32,
        medium: u32,
        high: u32,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_weight("low threshold", low)?;
            check_weight("medium threshold", medium)?;
            check_weight("high threshold", high)?;
            self.set_options(
                source,
                SetOptionsOp {
                    low_threshold: Some(low),
                    med_threshold: Some(medium),
                    high_threshold: Some(high),
                    ..Default::default()
                },
                options,
            )
        })();
        self.record(result)
    }

    fn set_options(
        &mut self,
        source: &str,
        op: SetOptionsOp,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        check_source(source)?;
        self.execute(source, OperationBody::SetOptions(op), options)
    }

    // -- Data entries --------------------------------------------------------

    /// Attaches `value` under `key`. Both are limited to 64 bytes.
    pub fn set_data(
        &mut self,
        source: &str,
        key: &str,
        value: &[u8],
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_source(source)?;
            check_data_key(key)?;
            if value.len() > MAX_DATA_ENTRY_LENGTH {
                return Err(LedgerError::validation(format!(
                    "data value must be at most {} bytes, got {}",
                    MAX_DATA_ENTRY_LENGTH,
                    value.len()
                )));
            }
            self.execute(
                source,
                OperationBody::ManageData {
                    name: key.to_string(),
                    value: Some(value.to_vec()),
                },
                options,
            )
        })();
        self.record(result)
    }

    pub fn clear_data(
        &mut self,
        source: &str,
        key: &str,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_source(source)?;
            check_data_key(key)?;
            self.execute(
                source,
                OperationBody::ManageData {
                    name: key.to_string(),
                    value: None,
                },
                options,
            )
        })();
        self.record(result)
    }

    // -- Offers --------------------------------------------------------------

    /// Offers to sell `amount` of `selling` for `buying` at `price`
    /// (units of `buying` per unit of `selling`). [`Options::passive`]
    /// makes it a passive offer.
    pub fn create_offer(
        &mut self,
        source: &str,
        selling: &Asset,
        buying: &Asset,
        price: &str,
        amount: &str,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = self.manage_offer(source, 0, selling, buying, price, Some(amount), options);
        self.record(result)
    }

    /// Replaces the terms of an existing offer.
    #[allow(clippy::too_many_arguments)]
    pub fn update_offer(
        &mut self,
        source: &str,
        offer_id: u64,
        selling: &Asset,
        buying: &Asset,
        price: &str,
        amount: &str,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_offer_id(offer_id)?;
            self.manage_offer(source, offer_id, selling, buying, price, Some(amount), options)
        })();
        self.record(result)
    }

    pub fn delete_offer(
        &mut self,
        source: &str,
        offer_id: u64,
        selling: &Asset,
        buying: &Asset,
        price: &str,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_offer_id(offer_id)?;
            self.manage_offer(source, offer_id, selling, buying, price, None, options)
        })();
        self.record(result)
    }

    #[allow(clippy::too_many_arguments)]
    fn manage_offer(
        &mut self,
        source: &str,
        offer_id: u64,
        selling: &Asset,
        buying: &Asset,
        price: &str,
        amount: Option<&str>,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        check_source(source)?;
        let selling = selling.to_ledger()?;
        let buying = buying.to_ledger()?;
        if selling.same_as(&buying) {
            return Err(LedgerError::validation("offer must trade two different assets"));
        }
        let price = Price::parse(price)?;
        let amount = amount.map(parse_amount).transpose()?.unwrap_or(0);
        let passive = options.is_some_and(|o| o.passive);

        self.execute(
            source,
            OperationBody::ManageOffer {
                selling,
                buying,
                amount,
                price,
                offer_id,
                passive,
            },
            options,
        )
    }

    // -- Raw envelopes -------------------------------------------------------

    /// Adds one signature per seed, in order, to an encoded transaction.
    pub fn sign_transaction(&mut self, envelope_b64: &str, seeds: &[&str]) -> Result<String, LedgerError> {
        let result = sign_encoded(envelope_b64, self.network.passphrase(), seeds);
        self.record(result)
    }

    /// Submits an encoded transaction exactly as given.
    pub fn submit_transaction(&mut self, envelope_b64: &str) -> Result<TxResponse, LedgerError> {
        let result = self
            .backend
            .submit_envelope(envelope_b64)
            .map_err(|e| e.context("submit failed"));
        if let Ok(response) = &result {
            info!(hash = %response.hash, ledger = response.ledger, "raw transaction submitted");
        }
        self.record(result)
    }

    // -- Sessions ------------------------------------------------------------

    /// Opens a multi-operation session paid for by `source`.
    ///
    /// Signers in `options` sign instead of `source`; without them
    /// `source` must be a seed. Returns `self` for chaining.
    pub fn start(&mut self, source: &str, options: Option<&Options>) -> Result<&mut Self, LedgerError> {
        let result = (|| -> Result<(), LedgerError> {
            check_source(source)?;
            let tx = Tx::session(self.network.passphrase(), source, options)?;
            self.session.transition(Event::Start(tx))?;
            debug!(source = %redact(source), "session started");
            Ok(())
        })();
        self.record(result)?;
        Ok(self)
    }

    /// Signs and submits the open session.
    pub fn submit(&mut self) -> Result<(), LedgerError> {
        let result = self.close(|tx, backend| tx.submit(backend).map(|_| ()));
        self.record(result)
    }

    /// Signs the open session and returns the encoded envelope without
    /// submitting it.
    pub fn payload(&mut self) -> Result<String, LedgerError> {
        let result = self.close(|tx, backend| tx.payload(backend));
        self.record(result)
    }

    /// Discards the open session.
    pub fn abort(&mut self) -> Result<(), LedgerError> {
        let result = self
            .session
            .transition(Event::Abort)
            .map(|tx| {
                let dropped = tx.map_or(0, |tx| tx.operations().len());
                debug!(operations = dropped, "session aborted");
            })
            .map_err(LedgerError::from);
        self.record(result)
    }

    fn close<T>(
        &mut self,
        finish: impl FnOnce(&mut Tx, &dyn LedgerBackend) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut tx = self
            .session
            .transition(Event::Close)?
            .ok_or(SessionError::NotOpen)?;
        debug!(operations = tx.operations().len(), "closing session");
        let result = finish(&mut tx, self.backend.as_ref());
        self.last_tx = Some(tx);
        result
    }

    // -- Plumbing ------------------------------------------------------------

    /// Routes one operation to the open session, or builds, signs and
    /// submits it on its own.
    fn execute(
        &mut self,
        source: &str,
        body: OperationBody,
        options: Option<&Options>,
    ) -> Result<(), LedgerError> {
        if let Some(opts) = options {
            let is_payment = matches!(
                body,
                OperationBody::Payment { .. } | OperationBody::PathPayment { .. }
            );
            if opts.has_path_params() && !is_payment {
                return Err(LedgerError::validation(format!(
                    "path payment options are not valid for {}",
                    body.kind()
                )));
            }
        }

        if let Session::Open(tx) = &mut self.session {
            if let Some(opts) = options {
                tx.merge_options(opts)?;
            }
            let kind = body.kind();
            tx.append(source, body)?;
            debug!(kind, queued = tx.operations().len(), "operation added to session");
            return Ok(());
        }

        let mut tx = self.implicit_tx(source, options)?;
        tx.append(source, body)?;
        let result = tx.submit(self.backend.as_ref()).map(|_| ());
        self.last_tx = Some(tx);
        result
    }

    /// A one-shot transaction. A multi-op source in `options` becomes the
    /// transaction source and each operation records its own. Unless
    /// signers are given, both the multi-op source and `source` sign.
    fn implicit_tx(&self, source: &str, options: Option<&Options>) -> Result<Tx, LedgerError> {
        let passphrase = self.network.passphrase();
        let Some(opts) = options else {
            return Ok(Tx::new(passphrase));
        };

        let mut tx = match opts.multi_op_source.as_deref() {
            Some(multi_op_source) => {
                let signers = if opts.signers.is_empty() {
                    Options::new().with_signer(multi_op_source).with_signer(source)
                } else {
                    Options {
                        signers: opts.signers.clone(),
                        ..Options::default()
                    }
                };
                Tx::session(passphrase, multi_op_source, Some(&signers))?
            }
            None => Tx::new(passphrase),
        };
        tx.merge_options(opts)?;
        Ok(tx)
    }

    /// An address for `target`, resolving federation addresses.
    fn resolve_target(&self, target: &str) -> Result<String, LedgerError> {
        if target.contains('*') {
            return self.federation.lookup_by_address(target).stage("resolve error");
        }
        check_address("target", target)?;
        Ok(target.to_string())
    }

    fn record<T>(&mut self, result: Result<T, LedgerError>) -> Result<T, LedgerError> {
        if let Err(e) = &result {
            debug!(error = %e, "call failed");
        }
        self.last_err = result.as_ref().err().cloned();
        result
    }
}

// ---------------------------------------------------------------------------
// Argument checks
// ---------------------------------------------------------------------------

fn check_source(source: &str) -> Result<(), LedgerError> {
    if is_valid_address_or_seed(source) {
        Ok(())
    } else {
        Err(LedgerError::validation(format!(
            "invalid source address or seed: {}",
            redact(source)
        )))
    }
}

fn check_address(what: &str, address: &str) -> Result<(), LedgerError> {
    if is_valid_address(address) {
        Ok(())
    } else {
        Err(LedgerError::validation(format!(
            "invalid {} address: {}",
            what,
            redact(address)
        )))
    }
}

fn check_weight(what: &str, weight: u32) -> Result<(), LedgerError> {
    if weight > MAX_WEIGHT {
        return Err(LedgerError::validation(format!(
            "{} must be at most {}, got {}",
            what, MAX_WEIGHT, weight
        )));
    }
    Ok(())
}

fn check_data_key(key: &str) -> Result<(), LedgerError> {
    if key.is_empty() {
        return Err(LedgerError::validation("data key must not be empty"));
    }
    if key.len() > MAX_DATA_ENTRY_LENGTH {
        return Err(LedgerError::validation(format!(
            "data key must be at most {} bytes, got {}",
            MAX_DATA_ENTRY_LENGTH,
            key.len()
        )));
    }
    Ok(())
}

fn check_offer_id(offer_id: u64) -> Result<(), LedgerError> {
    if offer_id == 0 {
        return Err(LedgerError::validation("offer id must be non-zero"));
    }
    Ok(())
}

fn credit_asset(asset: &Asset) -> Result<Asset, LedgerError> {
    if asset.is_native() {
        return Err(LedgerError::validation("native asset needs no trust line"));
    }
    Ok(asset.to_ledger()?)
}
