//! # CLI Interface
//!
//! Defines the command-line argument structure for `lumen` using `clap`
//! derive. Global flags pick the network and log format; each subcommand
//! maps onto one client call.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use lumen::Asset;

use crate::logging::LogFormat;

/// Ledger transaction client.
///
/// Generates keys, inspects accounts, and builds, signs, and submits
/// transactions against public, test, custom, or simulated networks.
#[derive(Parser, Debug)]
#[command(
    name = "lumen",
    about = "Ledger transaction client",
    version,
    propagate_version = true
)]
pub struct LumenCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Network spec: `public`, `test`, `simulated`, or
    /// `custom;<horizon url>;<passphrase>`.
    ///
    /// Overrides the network named in the config file.
    #[arg(long, short = 'n', global = true, env = "LUMEN_NETWORK")]
    pub network: Option<String>,

    /// Path to a TOML client configuration file.
    #[arg(long, short = 'c', global = true, env = "LUMEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP timeout in seconds.
    #[arg(long, global = true, env = "LUMEN_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Log output format.
    #[arg(
        long,
        global = true,
        env = "LUMEN_LOG_FORMAT",
        value_enum,
        ignore_case = true,
        default_value_t = LogFormat::Pretty
    )]
    pub log_format: LogFormat,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a random keypair. Nothing is created on the ledger.
    Keypair,
    /// Print an account as JSON.
    Account(AccountArgs),
    /// Create and fund a new account.
    Fund(FundArgs),
    /// Send a payment.
    Pay(PayArgs),
    /// Search for payment paths.
    Paths(PathsArgs),
    /// Add signatures to an encoded transaction.
    Sign(SignArgs),
    /// Submit an encoded transaction as-is.
    Submit(SubmitArgs),
    /// Resolve a `name*domain` federation address.
    Resolve(ResolveArgs),
}

#[derive(Args, Debug)]
pub struct AccountArgs {
    /// Account address.
    pub address: String,
}

#[derive(Args, Debug)]
pub struct FundArgs {
    /// Seed of the funding account.
    #[arg(long, env = "LUMEN_SOURCE_SEED", hide_env_values = true)]
    pub from: String,

    /// Address (or seed) of the account to create.
    #[arg(long)]
    pub to: String,

    /// Starting balance in native units.
    #[arg(long)]
    pub amount: String,
}

#[derive(Args, Debug)]
pub struct PayArgs {
    /// Seed (or address, with `--signer`) of the paying account.
    #[arg(long, env = "LUMEN_SOURCE_SEED", hide_env_values = true)]
    pub from: String,

    /// Destination address or federation address.
    #[arg(long)]
    pub to: String,

    /// Amount the destination receives.
    #[arg(long)]
    pub amount: String,

    /// Asset the destination receives: `native` or `CODE:ISSUER`.
    #[arg(long, default_value = "native", value_parser = parse_asset)]
    pub asset: Asset,

    /// Pay with this asset instead, through a path payment.
    #[arg(long, value_parser = parse_asset, requires = "max_send")]
    pub send_asset: Option<Asset>,

    /// Most of `--send-asset` to spend.
    #[arg(long)]
    pub max_send: Option<String>,

    /// Text memo.
    #[arg(long)]
    pub memo: Option<String>,

    /// Seed that signs instead of the source. Repeatable.
    #[arg(long = "signer")]
    pub signers: Vec<String>,

    /// Print the signed envelope instead of submitting it.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct PathsArgs {
    /// Paying account.
    #[arg(long)]
    pub from: String,

    /// Receiving account.
    #[arg(long)]
    pub to: String,

    /// Asset the destination receives.
    #[arg(long, value_parser = parse_asset)]
    pub asset: Asset,

    /// Amount the destination receives.
    #[arg(long)]
    pub amount: String,
}

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Base64 transaction envelope.
    pub envelope: String,

    /// Seed to sign with. Repeatable; signatures are added in order.
    #[arg(long = "seed", required = true)]
    pub seeds: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Base64 transaction envelope.
    pub envelope: String,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Federation address, e.g. `alice*example.com`.
    pub address: String,
}

/// Parses `native` or `CODE:ISSUER`.
pub fn parse_asset(s: &str) -> Result<Asset, String> {
    if s.eq_ignore_ascii_case("native") {
        return Ok(Asset::native());
    }
    let (code, issuer) = s
        .split_once(':')
        .ok_or_else(|| format!("expected `native` or CODE:ISSUER, got {:?}", s))?;
    let asset = Asset::credit(code, issuer);
    asset.validate().map_err(|e| e.to_string())?;
    Ok(asset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use lumen::KeyPair;

    #[test]
    fn verify_cli_structure() {
        LumenCli::command().debug_assert();
    }

    #[test]
    fn asset_argument_forms() {
        assert!(parse_asset("native").unwrap().is_native());
        let issuer = KeyPair::random().address();
        let usd = parse_asset(&format!("USD:{}", issuer)).unwrap();
        assert_eq!(usd.code, "USD");
        assert!(parse_asset("USD").is_err());
        assert!(parse_asset("USD:GBAD").is_err());
    }

    #[test]
    fn pay_parses_repeated_signers() {
        let cli = LumenCli::try_parse_from([
            "lumen", "--network", "simulated", "pay", "--from", "SX", "--to", "GY", "--amount", "1",
            "--signer", "S1", "--signer", "S2",
        ])
        .unwrap();
        assert_eq!(cli.global.network.as_deref(), Some("simulated"));
        assert_eq!(cli.global.log_format, LogFormat::Pretty);
        match cli.command {
            Commands::Pay(args) => {
                assert_eq!(args.signers, vec!["S1", "S2"]);
                assert!(args.asset.is_native());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
