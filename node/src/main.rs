// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Shadow Ledger Node
//!
//! Entry point for the `shadow-node` binary. Parses CLI arguments, loads
//! the TOML configuration, initializes logging, and runs one command
//! against the ledger database.
//!
//! - `init`           — create the database and write genesis
//! - `keygen`         — generate a key pair
//! - `address`        — encode a public key's address
//! - `decode-address` — validate an encoded address
//! - `check-tx`       — admission dry run for one transaction
//! - `apply-block`    — apply and persist an ordered block
//! - `balance`, `utxos`, `status` — queries
//! - `version`        — print build version information

mod cli;
mod config;
mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::json;

use shadow_protocol::address::{decode, derive, AddressKind};
use shadow_protocol::crypto::{Ed25519Scheme, KeyPair};
use shadow_protocol::storage::SledStore;
use shadow_protocol::transaction::TokenId;
use shadow_protocol::Ledger;

use cli::{Commands, ShadowNodeCli};
use config::NodeConfig;

fn main() -> Result<()> {
    let cli = ShadowNodeCli::parse();

    let mut cfg = NodeConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        cfg.data_dir = dir;
    }
    if let Some(format) = cli.log_format {
        cfg.log_format = format;
    }

    match cli.command {
        Commands::Version => {
            print_version();
            return Ok(());
        }
        Commands::Keygen(args) => return keygen(args.out.as_deref()),
        Commands::Address(args) => return encode_address(&args),
        Commands::DecodeAddress(args) => return decode_address(&args.address),
        _ => {}
    }

    logging::init_logging(&cfg.log_level, cfg.log_format());

    match cli.command {
        Commands::Init => init(&cfg),
        Commands::CheckTx(args) => check_tx(&cfg, &args.raw),
        Commands::ApplyBlock(args) => apply_block(&cfg, &args.file),
        Commands::Balance(args) => balance(&cfg, &args.address, &args.token),
        Commands::Utxos(args) => utxos(&cfg, &args.address, args.token.as_deref()),
        Commands::Status => status(&cfg),
        Commands::Version | Commands::Keygen(_) | Commands::Address(_) | Commands::DecodeAddress(_) => {
            Ok(())
        }
    }
}

fn open_store(cfg: &NodeConfig) -> Result<SledStore> {
    let path = cfg.db_path();
    std::fs::create_dir_all(&path)
        .with_context(|| format!("failed to create database directory {}", path.display()))?;
    SledStore::open(&path).with_context(|| format!("failed to open database at {}", path.display()))
}

fn open_ledger(cfg: &NodeConfig) -> Result<Ledger<SledStore>> {
    let store = open_store(cfg)?;
    Ledger::open(store, cfg.ledger.clone(), Arc::new(Ed25519Scheme))
        .context("failed to open ledger (has `init` been run?)")
}

/// Token argument: `native`, 64 hex characters, or an active ticker.
fn resolve_token(ledger: &Ledger<SledStore>, token: &str) -> Result<TokenId> {
    if token.eq_ignore_ascii_case("native") {
        return Ok(TokenId::NATIVE);
    }
    if token.len() == 64 {
        if let Ok(id) = token.parse::<TokenId>() {
            return Ok(id);
        }
    }
    match ledger.token_by_ticker(token) {
        Some(info) => Ok(info.token_id),
        None => bail!("unknown token {}", token),
    }
}

fn init(cfg: &NodeConfig) -> Result<()> {
    let allocations = cfg.allocations()?;
    let store = open_store(cfg)?;
    let ledger = Ledger::genesis(store, cfg.ledger.clone(), Arc::new(Ed25519Scheme), &allocations)
        .context("failed to write genesis")?;
    let status = ledger.status()?;

    tracing::info!(
        data_dir = %cfg.data_dir.display(),
        allocations = allocations.len(),
        "ledger initialized"
    );
    println!("Ledger initialized.");
    println!("  Data directory : {}", cfg.data_dir.display());
    println!("  Allocations    : {}", allocations.len());
    println!("  Digest         : {}", hex::encode(status.digest));
    Ok(())
}

fn keygen(out: Option<&Path>) -> Result<()> {
    let keypair = KeyPair::generate();
    let secret = hex::encode(keypair.secret_key_bytes());

    match out {
        Some(path) => {
            std::fs::write(path, &secret)
                .with_context(|| format!("failed to write key to {}", path.display()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
            }
            println!("secret key : written to {}", path.display());
        }
        None => println!("secret key : {}", secret),
    }
    println!("public key : {}", keypair.public_key_hex());
    println!("address    : {}", keypair.address());
    Ok(())
}

fn encode_address(args: &cli::AddressArgs) -> Result<()> {
    let public_key = hex::decode(&args.public_key).context("public key is not hex")?;
    let kind: AddressKind = args.kind.parse()?;
    println!("{}", derive(&public_key).encode(kind));
    Ok(())
}

fn decode_address(encoded: &str) -> Result<()> {
    let (address, kind) = decode(encoded)?;
    println!("kind  : {}", kind);
    println!("bytes : {}", address.to_hex());
    Ok(())
}

fn check_tx(cfg: &NodeConfig, raw_hex: &str) -> Result<()> {
    let ledger = open_ledger(cfg)?;
    let raw = hex::decode(raw_hex.trim()).context("transaction is not hex")?;
    let tx_id = ledger.check_tx(&raw)?;
    println!("{}", json!({ "accepted": true, "tx_id": tx_id.to_hex() }));
    Ok(())
}

fn apply_block(cfg: &NodeConfig, file: &Path) -> Result<()> {
    let ledger = open_ledger(cfg)?;
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read block file {}", file.display()))?;
    let entries: Vec<String> = serde_json::from_str(&text).context("block file must be a JSON array of hex strings")?;
    let raw_txs = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| hex::decode(entry.trim()).with_context(|| format!("entry {} is not hex", i)))
        .collect::<Result<Vec<_>>>()?;

    let summary = ledger.apply_block(&raw_txs)?;
    let results: Vec<_> = summary
        .results
        .iter()
        .map(|r| json!({ "tx_id": r.tx_id.to_hex(), "success": r.success, "error": r.error }))
        .collect();
    let report = json!({
        "height": summary.height,
        "digest": hex::encode(summary.digest),
        "applied": summary.applied_count(),
        "results": results,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn balance(cfg: &NodeConfig, address: &str, token: &str) -> Result<()> {
    let ledger = open_ledger(cfg)?;
    let (owner, _) = decode(address)?;
    let token_id = resolve_token(&ledger, token)?;
    println!("{}", ledger.balance(&owner, &token_id));
    Ok(())
}

fn utxos(cfg: &NodeConfig, address: &str, token: Option<&str>) -> Result<()> {
    let ledger = open_ledger(cfg)?;
    let (owner, _) = decode(address)?;
    let token_id = token.map(|t| resolve_token(&ledger, t)).transpose()?;
    let list: Vec<_> = ledger
        .list_utxos(&owner, token_id.as_ref())
        .into_iter()
        .map(|u| {
            json!({
                "out_point": u.out_point.to_string(),
                "amount": u.amount(),
                "token_id": u.token_id().to_hex(),
                "block_height": u.block_height,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}

fn status(cfg: &NodeConfig) -> Result<()> {
    let ledger = open_ledger(cfg)?;
    let status = ledger.status()?;
    let report = json!({
        "height": status.height,
        "digest": hex::encode(status.digest),
        "unspent_outputs": status.unspent_outputs,
        "tokens": status.tokens,
        "pools": status.pools,
        "validators": status.validators,
        "fees_burned": status.fees_burned.to_string(),
        "halted": status.halted,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_version() {
    println!("shadow-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", shadow_protocol::config::PROTOCOL_VERSION);
}
