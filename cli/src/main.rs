// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Lumen CLI
//!
//! Entry point for the `lumen` binary. Parses arguments, initializes
//! logging, builds a [`Client`] for the selected network, and runs one
//! subcommand.
//!
//! Network selection, highest precedence first:
//!
//! 1. `--network` / `LUMEN_NETWORK`
//! 2. the `network` key of `--config` / `LUMEN_CONFIG`
//! 3. the test network

mod cli;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;

use lumen::{Client, ClientConfig, NetworkConfig, Options};

use cli::{Commands, GlobalArgs, LumenCli, PayArgs};

fn main() -> Result<()> {
    let cli = LumenCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, cli.global.log_format);

    let mut client = build_client(&cli.global)?;
    tracing::debug!(network = client.network().name(), "client ready");

    match cli.command {
        Commands::Keypair => {
            let keypair = client.create_keypair();
            println!("address: {}", keypair.address());
            println!("seed:    {}", keypair.seed());
        }
        Commands::Account(args) => {
            let account = client
                .load_account(&args.address)
                .with_context(|| format!("failed to load {}", args.address))?;
            println!("{}", serde_json::to_string_pretty(&account)?);
        }
        Commands::Fund(args) => {
            client
                .fund_account(&args.from, &args.to, &args.amount, None)
                .context("failed to fund account")?;
            print_response(&client);
        }
        Commands::Pay(args) => pay(&mut client, args)?,
        Commands::Paths(args) => {
            let paths = client
                .find_paths(&args.from, &args.to, &args.asset, &args.amount, None)
                .context("path search failed")?;
            println!("{}", serde_json::to_string_pretty(&paths)?);
        }
        Commands::Sign(args) => {
            let seeds: Vec<&str> = args.seeds.iter().map(String::as_str).collect();
            let signed = client
                .sign_transaction(&args.envelope, &seeds)
                .context("failed to sign transaction")?;
            println!("{}", signed);
        }
        Commands::Submit(args) => {
            let response = client
                .submit_transaction(&args.envelope)
                .context("failed to submit transaction")?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Resolve(args) => {
            let address = client
                .resolve(&args.address)
                .with_context(|| format!("failed to resolve {}", args.address))?;
            println!("{}", address);
        }
    }

    Ok(())
}

/// Builds the client from flags, config file, and defaults.
fn build_client(args: &GlobalArgs) -> Result<Client> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(secs) = args.timeout {
        config.timeout_secs = secs;
    }

    let network = match &args.network {
        Some(spec) => NetworkConfig::from_spec(spec).context("invalid --network")?,
        None => config.network().context("invalid network in config")?,
    };
    tracing::info!(network = network.name(), "selected network");

    Client::with_timeout(network, config.timeout()).context("failed to create client")
}

/// Sends a payment, or with `--dry-run` prints the signed envelope.
fn pay(client: &mut Client, args: PayArgs) -> Result<()> {
    let mut envelope = Options::new();
    if let Some(memo) = &args.memo {
        envelope = envelope.with_memo_text(memo);
    }
    for signer in &args.signers {
        envelope = envelope.with_signer(signer);
    }
    let mut path = Options::new();
    if let (Some(send_asset), Some(max_send)) = (args.send_asset, &args.max_send) {
        path = path.with_asset(send_asset, max_send).find_path_from(&args.from);
    }

    if args.dry_run {
        // Signers and memo bind to the session; path parameters belong to the payment.
        client
            .start(&args.from, Some(&envelope))
            .context("failed to start transaction")?;
        let paid = client.pay(&args.from, &args.to, &args.amount, &args.asset, Some(&path));
        if let Err(e) = paid {
            client.abort().ok();
            return Err(e).context("payment failed");
        }
        let payload = client.payload().context("failed to sign transaction")?;
        println!("{}", payload);
        return Ok(());
    }

    let options = Options {
        send_asset: path.send_asset,
        max_send: path.max_send,
        path_source: path.path_source,
        ..envelope
    };
    client
        .pay(&args.from, &args.to, &args.amount, &args.asset, Some(&options))
        .context("payment failed")?;
    print_response(client);
    Ok(())
}

fn print_response(client: &Client) {
    if let Some(response) = client.response() {
        println!("hash:   {}", response.hash);
        println!("ledger: {}", response.ledger);
    }
}
