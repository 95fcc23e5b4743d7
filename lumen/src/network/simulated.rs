//! In-memory ledger.
//!
//! A small, strict stand-in for the real network. It decodes every
//! envelope it receives, checks sequence numbers, fees, time bounds and
//! signatures, and applies operations atomically against an in-memory
//! account table. What it doesn't do is consensus, order matching, or
//! reserve accounting: path payments settle at their `send_max`, and
//! offers just sit in the book.
//!
//! ## Design
//!
//! - One `parking_lot::Mutex` guards all state so the ledger can be shared
//!   behind `&self` (and behind an `Arc` between a client and a test).
//! - Unknown accounts asked for a sequence number are provisioned with a
//!   starting balance, like a built-in friendbot. `load_account` does not
//!   provision; a missing account is a 404 problem.
//! - Fee and sequence are consumed even when an operation fails, matching
//!   the real ledger. Operation effects are all-or-nothing.
//! - Every submitted payload is recorded verbatim, accepted or not.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::debug;

use super::{LedgerBackend, Problem, TxResponse};
use crate::account::{AccountSigner, AccountSnapshot, Balance};
use crate::asset::Asset;
use crate::config::{BASE_FEE_STROOPS, STROOPS_PER_UNIT};
use crate::crypto::{DecoratedSignature, PublicKey};
use crate::error::LedgerError;
use crate::paths::{PathQuery, PathResult};
use crate::transaction::{envelope, AccountFlags, Envelope, OperationBody, Price, SetOptionsOp};

/// Balance given to auto-provisioned accounts.
pub const DEFAULT_STARTING_BALANCE: i64 = 10_000 * STROOPS_PER_UNIT;

/// Tunables for [`SimulatedLedger`].
#[derive(Debug, Clone)]
pub struct SimulatedConfig {
    /// Provision unknown transaction sources on first use.
    pub auto_provision: bool,
    /// Native balance for provisioned accounts, in stroops.
    pub starting_balance: i64,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            auto_provision: true,
            starting_balance: DEFAULT_STARTING_BALANCE,
        }
    }
}

/// An open offer in the simulated book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferEntry {
    pub id: u64,
    pub seller: String,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: i64,
    pub price: Price,
    pub passive: bool,
}

#[derive(Debug, Clone, Default)]
struct LedgerState {
    accounts: BTreeMap<String, AccountSnapshot>,
    offers: BTreeMap<u64, OfferEntry>,
    next_offer_id: u64,
    ledger: u64,
}

#[derive(Debug, Default)]
struct Inner {
    state: LedgerState,
    submissions: Vec<String>,
    paths: Vec<PathResult>,
    path_queries: Vec<PathQuery>,
}

// ---------------------------------------------------------------------------
// SimulatedLedger
// ---------------------------------------------------------------------------

/// A [`LedgerBackend`] that lives entirely in memory.
#[derive(Debug)]
pub struct SimulatedLedger {
    passphrase: String,
    config: SimulatedConfig,
    inner: Mutex<Inner>,
}

impl SimulatedLedger {
    pub fn new(passphrase: &str) -> Self {
        Self::with_config(passphrase, SimulatedConfig::default())
    }

    pub fn with_config(passphrase: &str, config: SimulatedConfig) -> Self {
        let mut inner = Inner::default();
        inner.state.ledger = 1;
        inner.state.next_offer_id = 1;
        Self {
            passphrase: passphrase.to_string(),
            config,
            inner: Mutex::new(inner),
        }
    }

    /// Creates `address` with `stroops` of native balance, or tops it up.
    pub fn fund(&self, address: &str, stroops: i64) {
        let mut inner = self.inner.lock();
        let ledger = inner.state.ledger;
        let account = inner
            .state
            .accounts
            .entry(address.to_string())
            .or_insert_with(|| new_account(address, ledger));
        if let Some(native) = native_line(account) {
            native.amount = native.amount.saturating_add(stroops);
        }
    }

    /// Sets the candidates returned by `find_paths`.
    pub fn set_paths(&self, paths: Vec<PathResult>) {
        self.inner.lock().paths = paths;
    }

    /// Every path query received so far.
    pub fn path_queries(&self) -> Vec<PathQuery> {
        self.inner.lock().path_queries.clone()
    }

    /// Every payload submitted so far, in order.
    pub fn submissions(&self) -> Vec<String> {
        self.inner.lock().submissions.clone()
    }

    /// Open offers placed by `seller`.
    pub fn offers_of(&self, seller: &str) -> Vec<OfferEntry> {
        self.inner
            .lock()
            .state
            .offers
            .values()
            .filter(|o| o.seller == seller)
            .cloned()
            .collect()
    }

    /// Number of the last closed ledger.
    pub fn ledger_sequence(&self) -> u64 {
        self.inner.lock().state.ledger
    }

    fn apply(&self, state: &mut LedgerState, env: &Envelope, b64: &str) -> Result<TxResponse, Problem> {
        let tx = &env.tx;
        let hash = env
            .hash(&self.passphrase)
            .map_err(|_| Problem::transaction_failed("tx_malformed", vec![]))?;

        if env.signatures.is_empty() {
            return Err(Problem::transaction_failed("tx_bad_auth", vec![]));
        }
        if tx.operations.is_empty() {
            return Err(Problem::transaction_failed("tx_missing_operation", vec![]));
        }

        let source = state
            .accounts
            .get(&tx.source_account)
            .ok_or_else(|| Problem::transaction_failed("tx_no_source_account", vec![]))?;

        if tx.sequence != source.sequence + 1 {
            return Err(Problem::transaction_failed("tx_bad_seq", vec![]));
        }

        let min_fee = i64::from(BASE_FEE_STROOPS) * tx.operations.len() as i64;
        if i64::from(tx.fee) < min_fee {
            return Err(Problem::transaction_failed("tx_insufficient_fee", vec![]));
        }
        if source.native_balance() < i64::from(tx.fee) {
            return Err(Problem::transaction_failed("tx_insufficient_balance", vec![]));
        }

        if let Some(bounds) = tx.time_bounds {
            let now = chrono::Utc::now().timestamp().max(0) as u64;
            if now < bounds.min_time {
                return Err(Problem::transaction_failed("tx_too_early", vec![]));
            }
            if bounds.max_time != 0 && now > bounds.max_time {
                return Err(Problem::transaction_failed("tx_too_late", vec![]));
            }
        }

        if !is_authorized(source, &env.signatures, &hash) {
            return Err(Problem::transaction_failed("tx_bad_auth", vec![]));
        }
        for op in &tx.operations {
            if let Some(op_source) = op.source_account.as_ref().and_then(|a| state.accounts.get(a)) {
                if !is_authorized(op_source, &env.signatures, &hash) {
                    return Err(Problem::transaction_failed("tx_bad_auth", vec![]));
                }
            }
        }

        // Sequence and fee are spent from here on.
        if let Some(account) = state.accounts.get_mut(&tx.source_account) {
            account.sequence = tx.sequence;
            if let Some(native) = native_line(account) {
                native.amount -= i64::from(tx.fee);
            }
        }

        let mut scratch = state.clone();
        let mut codes = Vec::with_capacity(tx.operations.len());
        for op in &tx.operations {
            let op_source = op.source_account.as_deref().unwrap_or(&tx.source_account);
            match apply_operation(&mut scratch, op_source, &op.body) {
                Ok(()) => codes.push("op_success".to_string()),
                Err(code) => {
                    codes.push(code.to_string());
                    debug!(kind = op.body.kind(), code, "simulated operation failed");
                    return Err(Problem::transaction_failed("tx_failed", codes));
                }
            }
        }

        scratch.ledger += 1;
        *state = scratch;

        Ok(TxResponse {
            hash: hex::encode(hash),
            ledger: state.ledger,
            envelope: b64.to_string(),
            result: BASE64.encode(codes.join(",")),
        })
    }
}

impl LedgerBackend for SimulatedLedger {
    fn load_account(&self, address: &str) -> Result<AccountSnapshot, LedgerError> {
        self.inner
            .lock()
            .state
            .accounts
            .get(address)
            .cloned()
            .ok_or_else(|| LedgerError::Rejected(Problem::not_found(&format!("account {}", address))))
    }

    fn sequence(&self, address: &str) -> Result<i64, LedgerError> {
        let mut inner = self.inner.lock();
        let ledger = inner.state.ledger;
        if let Some(account) = inner.state.accounts.get(address) {
            return Ok(account.sequence);
        }
        if !self.config.auto_provision {
            return Err(LedgerError::Rejected(Problem::not_found(&format!(
                "account {}",
                address
            ))));
        }

        debug!(address, "provisioning simulated account");
        let mut account = new_account(address, ledger);
        if let Some(native) = native_line(&mut account) {
            native.amount = self.config.starting_balance;
        }
        let sequence = account.sequence;
        inner.state.accounts.insert(address.to_string(), account);
        Ok(sequence)
    }

    fn submit_envelope(&self, envelope_b64: &str) -> Result<TxResponse, LedgerError> {
        let mut inner = self.inner.lock();
        inner.submissions.push(envelope_b64.to_string());

        let env = envelope::decode(envelope_b64).map_err(|e| {
            let mut problem = Problem::transaction_failed("tx_malformed", vec![]);
            problem.detail = e.to_string();
            LedgerError::Rejected(problem)
        })?;

        self.apply(&mut inner.state, &env, envelope_b64)
            .map_err(LedgerError::Rejected)
    }

    fn find_paths(&self, query: &PathQuery) -> Result<Vec<PathResult>, LedgerError> {
        let mut inner = self.inner.lock();
        inner.path_queries.push(query.clone());
        Ok(inner.paths.clone())
    }
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

fn is_authorized(account: &AccountSnapshot, signatures: &[DecoratedSignature], hash: &[u8; 32]) -> bool {
    let master = (account.thresholds.master_weight > 0).then(|| account.address.clone());
    let keys = master
        .into_iter()
        .chain(account.signers.iter().filter(|s| s.weight > 0).map(|s| s.key.clone()));

    keys.filter_map(|key| PublicKey::from_address(&key).ok())
        .any(|pk| {
            signatures
                .iter()
                .any(|sig| sig.hint == pk.hint() && pk.verify(hash, &sig.signature))
        })
}

// ---------------------------------------------------------------------------
// Operation application
// ---------------------------------------------------------------------------

fn new_account(address: &str, ledger: u64) -> AccountSnapshot {
    AccountSnapshot::new(address, (ledger as i64) << 32)
}

fn native_line(account: &mut AccountSnapshot) -> Option<&mut Balance> {
    account.balances.iter_mut().find(|b| b.asset.is_native())
}

fn trust_line<'a>(account: &'a mut AccountSnapshot, asset: &Asset) -> Option<&'a mut Balance> {
    account.balances.iter_mut().find(|b| b.asset.same_as(asset))
}

fn issuer_of(asset: &Asset) -> Option<String> {
    asset.issuer_address().ok()
}

fn account_mut<'a>(
    state: &'a mut LedgerState,
    address: &str,
    missing: &'static str,
) -> Result<&'a mut AccountSnapshot, &'static str> {
    state.accounts.get_mut(address).ok_or(missing)
}

fn debit(state: &mut LedgerState, from: &str, asset: &Asset, amount: i64) -> Result<(), &'static str> {
    let account = account_mut(state, from, "op_no_source_account")?;
    if asset.is_native() {
        let line = native_line(account).ok_or("op_underfunded")?;
        if line.amount < amount {
            return Err("op_underfunded");
        }
        line.amount -= amount;
        return Ok(());
    }
    if issuer_of(asset).as_deref() == Some(from) {
        return Ok(());
    }
    let line = trust_line(account, asset).ok_or("op_src_no_trust")?;
    if !line.authorized {
        return Err("op_src_not_authorized");
    }
    if line.amount < amount {
        return Err("op_underfunded");
    }
    line.amount -= amount;
    Ok(())
}

fn credit(state: &mut LedgerState, to: &str, asset: &Asset, amount: i64) -> Result<(), &'static str> {
    let account = account_mut(state, to, "op_no_destination")?;
    if asset.is_native() {
        let line = native_line(account).ok_or("op_no_destination")?;
        line.amount = line.amount.checked_add(amount).ok_or("op_line_full")?;
        return Ok(());
    }
    if issuer_of(asset).as_deref() == Some(to) {
        return Ok(());
    }
    let line = trust_line(account, asset).ok_or("op_no_trust")?;
    if !line.authorized {
        return Err("op_not_authorized");
    }
    let total = line.amount.checked_add(amount).ok_or("op_line_full")?;
    if total > line.limit.unwrap_or(i64::MAX) {
        return Err("op_line_full");
    }
    line.amount = total;
    Ok(())
}

fn apply_operation(state: &mut LedgerState, source: &str, body: &OperationBody) -> Result<(), &'static str> {
    if !state.accounts.contains_key(source) {
        return Err("op_no_source_account");
    }

    match body {
        OperationBody::CreateAccount {
            destination,
            starting_balance,
        } => {
            if *starting_balance <= 0 {
                return Err("op_malformed");
            }
            if state.accounts.contains_key(destination) {
                return Err("op_already_exists");
            }
            debit(state, source, &Asset::native(), *starting_balance)?;
            let mut account = new_account(destination, state.ledger);
            if let Some(native) = native_line(&mut account) {
                native.amount = *starting_balance;
            }
            state.accounts.insert(destination.clone(), account);
            Ok(())
        }

        OperationBody::Payment {
            destination,
            asset,
            amount,
        } => {
            if *amount <= 0 {
                return Err("op_malformed");
            }
            if !state.accounts.contains_key(destination) {
                return Err("op_no_destination");
            }
            debit(state, source, asset, *amount)?;
            credit(state, destination, asset, *amount)
        }

        OperationBody::PathPayment {
            send_asset,
            send_max,
            destination,
            dest_asset,
            dest_amount,
            ..
        } => {
            if *send_max <= 0 || *dest_amount <= 0 {
                return Err("op_malformed");
            }
            if !state.accounts.contains_key(destination) {
                return Err("op_no_destination");
            }
            debit(state, source, send_asset, *send_max)?;
            credit(state, destination, dest_asset, *dest_amount)
        }

        OperationBody::ManageOffer {
            selling,
            buying,
            amount,
            price,
            offer_id,
            passive,
        } => manage_offer(state, source, selling, buying, *amount, *price, *offer_id, *passive),

        OperationBody::ChangeTrust { line, limit } => change_trust(state, source, line, *limit),

        OperationBody::AllowTrust {
            trustor,
            asset_code,
            authorize,
        } => {
            let issuer = account_mut(state, source, "op_no_source_account")?;
            if !issuer.flags.contains(AccountFlags::AUTH_REQUIRED) {
                return Err("op_trust_not_required");
            }
            if !*authorize && !issuer.flags.contains(AccountFlags::AUTH_REVOCABLE) {
                return Err("op_cant_revoke");
            }
            let account = account_mut(state, trustor, "op_no_trust_line")?;
            let line = account
                .balances
                .iter_mut()
                .find(|b| !b.asset.is_native() && b.asset.code == *asset_code && b.asset.issuer == source)
                .ok_or("op_no_trust_line")?;
            line.authorized = *authorize;
            Ok(())
        }

        OperationBody::SetOptions(set) => set_options(state, source, set),

        OperationBody::ManageData { name, value } => {
            let account = account_mut(state, source, "op_no_source_account")?;
            match value {
                Some(value) => {
                    account.data.insert(name.clone(), value.clone());
                }
                None => {
                    account.data.remove(name).ok_or("op_data_name_not_found")?;
                }
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn manage_offer(
    state: &mut LedgerState,
    source: &str,
    selling: &Asset,
    buying: &Asset,
    amount: i64,
    price: Price,
    offer_id: u64,
    passive: bool,
) -> Result<(), &'static str> {
    if amount < 0 || price.n <= 0 || price.d <= 0 || selling.same_as(buying) {
        return Err("op_malformed");
    }

    if offer_id != 0 {
        match state.offers.get(&offer_id) {
            Some(offer) if offer.seller == source => {}
            _ => return Err("op_offer_not_found"),
        }
        if amount == 0 {
            state.offers.remove(&offer_id);
            return Ok(());
        }
    } else if amount == 0 {
        return Err("op_malformed");
    }

    let account = account_mut(state, source, "op_no_source_account")?;
    let holds = if selling.is_native() {
        account.native_balance()
    } else if issuer_of(selling).as_deref() == Some(source) {
        i64::MAX
    } else {
        account.balance(selling).ok_or("op_sell_no_trust")?
    };
    if holds < amount {
        return Err("op_underfunded");
    }
    if !buying.is_native() && issuer_of(buying).as_deref() != Some(source) && account.balance(buying).is_none() {
        return Err("op_buy_no_trust");
    }

    let id = if offer_id == 0 {
        let id = state.next_offer_id;
        state.next_offer_id += 1;
        id
    } else {
        offer_id
    };
    state.offers.insert(
        id,
        OfferEntry {
            id,
            seller: source.to_string(),
            selling: selling.clone(),
            buying: buying.clone(),
            amount,
            price,
            passive,
        },
    );
    Ok(())
}

fn change_trust(state: &mut LedgerState, source: &str, line: &Asset, limit: i64) -> Result<(), &'static str> {
    if line.is_native() || limit < 0 {
        return Err("op_malformed");
    }
    let issuer_address = issuer_of(line).ok_or("op_malformed")?;
    if issuer_address == source {
        return Err("op_self_not_allowed");
    }
    let auth_required = state
        .accounts
        .get(&issuer_address)
        .ok_or("op_no_issuer")?
        .flags
        .contains(AccountFlags::AUTH_REQUIRED);

    let account = account_mut(state, source, "op_no_source_account")?;
    if limit == 0 {
        let pos = account
            .balances
            .iter()
            .position(|b| b.asset.same_as(line))
            .ok_or("op_invalid_limit")?;
        if account.balances[pos].amount > 0 {
            return Err("op_invalid_limit");
        }
        account.balances.remove(pos);
        return Ok(());
    }

    if let Some(existing) = trust_line(account, line) {
        if limit < existing.amount {
            return Err("op_invalid_limit");
        }
        existing.limit = Some(limit);
        return Ok(());
    }

    account.balances.push(Balance {
        asset: Asset {
            code: line.code.clone(),
            issuer: issuer_address,
            asset_type: line.asset_type,
        },
        amount: 0,
        limit: Some(limit),
        authorized: !auth_required,
    });
    Ok(())
}

fn set_options(state: &mut LedgerState, source: &str, set: &SetOptionsOp) -> Result<(), &'static str> {
    let account = account_mut(state, source, "op_no_source_account")?;

    let touches_flags = set.set_flags.is_some() || set.clear_flags.is_some();
    if touches_flags && account.flags.contains(AccountFlags::AUTH_IMMUTABLE) {
        return Err("op_cant_change");
    }
    let weights = [
        set.master_weight,
        set.low_threshold,
        set.med_threshold,
        set.high_threshold,
    ];
    if weights.iter().flatten().any(|w| *w > 255) {
        return Err("op_threshold_out_of_range");
    }

    if let Some(flags) = set.set_flags {
        account.flags = account.flags | flags;
    }
    if let Some(flags) = set.clear_flags {
        account.flags = AccountFlags::from_bits(account.flags.bits() & !flags.bits());
    }
    if let Some(w) = set.master_weight {
        account.thresholds.master_weight = w;
    }
    if let Some(t) = set.low_threshold {
        account.thresholds.low = t;
    }
    if let Some(t) = set.med_threshold {
        account.thresholds.medium = t;
    }
    if let Some(t) = set.high_threshold {
        account.thresholds.high = t;
    }
    if let Some(domain) = &set.home_domain {
        account.home_domain = domain.clone();
    }
    if let Some(signer) = &set.signer {
        if signer.key == account.address || signer.weight > 255 {
            return Err("op_bad_signer");
        }
        account.signers.retain(|s| s.key != signer.key);
        if signer.weight > 0 {
            account.signers.push(AccountSigner {
                key: signer.key.clone(),
                weight: signer.weight,
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
