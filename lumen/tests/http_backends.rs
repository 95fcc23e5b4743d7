//! HTTP-level tests for the Horizon backend and the federation resolver.
//!
//! Each test runs its own `mockito` server, so they are independent and
//! can run in parallel.

use std::time::Duration;

use mockito::{Matcher, Server};

use lumen::network::{FederationResolver, Horizon, HttpFederation, StaticFederation};
use lumen::transaction::decode;
use lumen::{Asset, Client, KeyPair, LedgerBackend, NetworkConfig, PathQuery};

const PASSPHRASE: &str = "Mock Network ; 2026";

fn horizon(server: &Server) -> Horizon {
    Horizon::new(&server.url(), Duration::from_secs(5)).expect("client builds")
}

fn custom_client(server: &Server) -> Client {
    let horizon = horizon(server);
    Client::with_backend(
        NetworkConfig::Custom {
            url: server.url(),
            passphrase: PASSPHRASE.to_string(),
        },
        std::sync::Arc::new(horizon),
        std::sync::Arc::new(StaticFederation::new()),
    )
}

fn account_json(address: &str, sequence: i64) -> String {
    format!(
        r#"{{
            "account_id": "{address}",
            "sequence": "{sequence}",
            "balances": [{{"balance": "250.0000000", "asset_type": "native"}}],
            "signers": [{{"key": "{address}", "weight": 1, "type": "ed25519_public_key"}}],
            "thresholds": {{"low_threshold": 0, "med_threshold": 0, "high_threshold": 0}},
            "flags": {{"auth_required": false, "auth_revocable": false, "auth_immutable": false}},
            "data": {{}}
        }}"#
    )
}

// ---------------------------------------------------------------------------
// Horizon
// ---------------------------------------------------------------------------

#[test]
fn loads_an_account() {
    let mut server = Server::new();
    let kp = KeyPair::random();
    let mock = server
        .mock("GET", format!("/accounts/{}", kp.address()).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(account_json(&kp.address(), 77))
        .create();

    let account = horizon(&server).load_account(&kp.address()).unwrap();
    mock.assert();
    assert_eq!(account.sequence, 77);
    assert_eq!(account.native_balance(), 2_500_000_000);
    assert_eq!(account.master_weight(), 1);
}

#[test]
fn missing_account_is_rejected_not_transport() {
    let mut server = Server::new();
    let kp = KeyPair::random();
    server
        .mock("GET", format!("/accounts/{}", kp.address()).as_str())
        .with_status(404)
        .with_body(r#"{"type": "https://stellar.org/horizon-errors/not_found", "title": "Resource Missing", "status": 404}"#)
        .create();

    let err = horizon(&server).load_account(&kp.address()).unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(err.problem().unwrap().status, 404);
}

#[test]
fn server_errors_without_a_problem_are_transport() {
    let mut server = Server::new();
    server
        .mock("GET", Matcher::Any)
        .with_status(502)
        .with_body("<html>bad gateway</html>")
        .create();

    let err = horizon(&server)
        .load_account(&KeyPair::random().address())
        .unwrap_err();
    assert!(err.is_transport());
}

#[test]
fn path_search_sends_destination_and_reads_records() {
    let mut server = Server::new();
    let source = KeyPair::random();
    let destination = KeyPair::random();
    let issuer = KeyPair::random();
    let body = format!(
        r#"{{"_embedded": {{"records": [{{
            "source_asset_type": "native",
            "source_amount": "20.0000000",
            "destination_asset_type": "credit_alphanum4",
            "destination_asset_code": "INR",
            "destination_asset_issuer": "{issuer}",
            "destination_amount": "2000.0000000",
            "path": [{{"asset_type": "credit_alphanum4", "asset_code": "USD", "asset_issuer": "{issuer}"}}]
        }}]}}}}"#,
        issuer = issuer.address()
    );
    let mock = server
        .mock("GET", "/paths")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("source_account".into(), source.address()),
            Matcher::UrlEncoded("destination_account".into(), destination.address()),
            Matcher::UrlEncoded("destination_amount".into(), "2000.0000000".into()),
            Matcher::UrlEncoded("destination_asset_type".into(), "credit_alphanum4".into()),
            Matcher::UrlEncoded("destination_asset_code".into(), "INR".into()),
        ]))
        .with_status(200)
        .with_body(body)
        .create();

    let query = PathQuery {
        source_account: source.address(),
        destination_account: destination.address(),
        destination_asset: Asset::credit("INR", &issuer.address()),
        destination_amount: 20_000_000_000,
        send_asset: None,
        max_send: None,
    };
    let paths = horizon(&server).find_paths(&query).unwrap();
    mock.assert();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].source_asset.is_native());
    assert_eq!(paths[0].hops[0].code, "USD");
}

#[test]
fn client_pays_through_horizon() {
    let mut server = Server::new();
    let alice = KeyPair::random();
    let bob = KeyPair::random();

    let load = server
        .mock("GET", format!("/accounts/{}", alice.address()).as_str())
        .with_status(200)
        .with_body(account_json(&alice.address(), 100))
        .create();
    let submit = server
        .mock("POST", "/transactions")
        .match_body(Matcher::Regex("^tx=".into()))
        .with_status(200)
        .with_body(r#"{"hash": "abcd", "ledger": 12, "envelope_xdr": "", "result_xdr": ""}"#)
        .create();

    let mut client = custom_client(&server);
    client.pay_native(&alice.seed(), &bob.address(), "1", None).unwrap();
    load.assert();
    submit.assert();

    let response = client.response().expect("response captured");
    assert_eq!(response.ledger, 12);
    let env = client.last_transaction().and_then(|tx| tx.envelope()).unwrap();
    assert_eq!(env.tx.sequence, 101);
    assert_eq!(env.signatures.len(), 1);
}

#[test]
fn ledger_rejection_keeps_result_codes() {
    let mut server = Server::new();
    let alice = KeyPair::random();
    server
        .mock("GET", format!("/accounts/{}", alice.address()).as_str())
        .with_status(200)
        .with_body(account_json(&alice.address(), 5))
        .create();
    server
        .mock("POST", "/transactions")
        .with_status(400)
        .with_body(
            r#"{
                "type": "https://stellar.org/horizon-errors/transaction_failed",
                "title": "Transaction Failed",
                "status": 400,
                "extras": {"result_codes": {"transaction": "tx_bad_seq"}}
            }"#,
        )
        .create();

    let mut client = custom_client(&server);
    let err = client
        .set_home_domain(&alice.seed(), "example.com", None)
        .unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(err.result_codes().unwrap().transaction, "tx_bad_seq");
    assert!(err.result_codes().unwrap().operations.is_empty());
}

#[test]
fn raw_submit_posts_the_envelope_verbatim() {
    let mut server = Server::new();
    let payload = "AAAAexamplepayload";
    let mock = server
        .mock("POST", "/transactions")
        .match_body(Matcher::UrlEncoded("tx".into(), payload.into()))
        .with_status(200)
        .with_body(r#"{"hash": "ff", "ledger": 3, "envelope_xdr": "", "result_xdr": ""}"#)
        .create();

    let mut client = custom_client(&server);
    let response = client.submit_transaction(payload).unwrap();
    mock.assert();
    assert_eq!(response.hash, "ff");
    assert!(decode(payload).is_err(), "nothing was validated locally");
}

// ---------------------------------------------------------------------------
// Federation
// ---------------------------------------------------------------------------

#[test]
fn federation_goes_through_stellar_toml() {
    let mut server = Server::new();
    let bob = KeyPair::random();
    let domain = server.host_with_port();
    let address = format!("bob*{}", domain);

    let toml = server
        .mock("GET", "/.well-known/stellar.toml")
        .with_status(200)
        .with_body(format!("FEDERATION_SERVER = \"{}/federation\"\n", server.url()))
        .create();
    let lookup = server
        .mock("GET", "/federation")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), address.clone()),
            Matcher::UrlEncoded("type".into(), "name".into()),
        ]))
        .with_status(200)
        .with_body(format!(
            r#"{{"stellar_address": "{}", "account_id": "{}"}}"#,
            address,
            bob.address()
        ))
        .create();

    let federation = HttpFederation::new(Duration::from_secs(5))
        .unwrap()
        .with_scheme("http");
    assert_eq!(federation.lookup_by_address(&address).unwrap(), bob.address());
    toml.assert();
    lookup.assert();
}

#[test]
fn federation_without_server_entry_fails() {
    let mut server = Server::new();
    server
        .mock("GET", "/.well-known/stellar.toml")
        .with_status(200)
        .with_body("VERSION = \"2.0.0\"\n")
        .create();

    let federation = HttpFederation::new(Duration::from_secs(5))
        .unwrap()
        .with_scheme("http");
    let err = federation
        .lookup_by_address(&format!("bob*{}", server.host_with_port()))
        .unwrap_err();
    assert!(err.to_string().contains("FEDERATION_SERVER"));
}

#[test]
fn federation_rejects_bad_account_ids() {
    let mut server = Server::new();
    server
        .mock("GET", "/.well-known/stellar.toml")
        .with_status(200)
        .with_body(format!("FEDERATION_SERVER = \"{}/fed\"\n", server.url()))
        .create();
    server
        .mock("GET", "/fed")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"account_id": "GNOPE"}"#)
        .create();

    let federation = HttpFederation::new(Duration::from_secs(5))
        .unwrap()
        .with_scheme("http");
    let err = federation
        .lookup_by_address(&format!("bob*{}", server.host_with_port()))
        .unwrap_err();
    assert!(err.to_string().contains("invalid account id"));
}
