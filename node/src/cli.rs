//! # CLI Interface
//!
//! Command-line structure of `shadow-node`, defined with `clap` derive.
//! Global flags override the config file; most also read an environment
//! variable.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Shadow ledger operator node.
///
/// Initializes and inspects a ledger database, validates transactions
/// against committed state, and applies ordered blocks.
#[derive(Parser, Debug)]
#[command(
    name = "shadow-node",
    about = "Shadow ledger operator node",
    version,
    propagate_version = true
)]
pub struct ShadowNodeCli {
    /// Node configuration file (TOML).
    #[arg(long, short = 'c', env = "SHADOW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory; overrides `data_dir` from the config file.
    #[arg(long, short = 'd', env = "SHADOW_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log format, `pretty` or `json`; overrides the config file.
    #[arg(long, env = "SHADOW_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the database and write genesis from the config's allocations.
    Init,
    /// Generate a key pair and print its wallet address.
    Keygen(KeygenArgs),
    /// Encode the address of a public key.
    Address(AddressArgs),
    /// Validate an encoded address and print its kind and bytes.
    DecodeAddress(DecodeAddressArgs),
    /// Run admission checks for a hex-encoded transaction against the
    /// committed state. Nothing is stored.
    CheckTx(CheckTxArgs),
    /// Apply a block read from a JSON array of hex-encoded transactions.
    ApplyBlock(ApplyBlockArgs),
    /// Print an address's balance of one token.
    Balance(BalanceArgs),
    /// List an address's unspent outputs.
    Utxos(UtxosArgs),
    /// Print height, digest, and record counts.
    Status,
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Write the hex secret key here (mode 0600) instead of printing it.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AddressArgs {
    /// Hex-encoded public key.
    #[arg(long)]
    pub public_key: String,

    /// wallet, liquidity, exchange, or nft.
    #[arg(long, default_value = "wallet")]
    pub kind: String,
}

#[derive(Args, Debug)]
pub struct DecodeAddressArgs {
    pub address: String,
}

#[derive(Args, Debug)]
pub struct CheckTxArgs {
    /// Wire-encoded transaction as hex.
    pub raw: String,
}

#[derive(Args, Debug)]
pub struct ApplyBlockArgs {
    /// JSON file holding `["<hex tx>", ...]` in block order.
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct BalanceArgs {
    pub address: String,

    /// Token id (hex), ticker, or `native`.
    #[arg(long, default_value = "native")]
    pub token: String,
}

#[derive(Args, Debug)]
pub struct UtxosArgs {
    pub address: String,

    /// Restrict to one token: id (hex), ticker, or `native`.
    #[arg(long)]
    pub token: Option<String>,
}
