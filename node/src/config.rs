//! # Node Configuration
//!
//! Operator settings loaded from a TOML file. Every field has a default, so
//! an empty file (or none at all) yields a working devnet node.
//!
//! ```toml
//! data_dir = "/var/lib/shadow"
//! log_level = "shadow_node=info,shadow_protocol=info"
//! log_format = "json"
//!
//! [ledger]
//! min_fee = 1000
//! block_reward = 5000000000
//!
//! [[genesis]]
//! address = "S…"
//! amount = 100000000000
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shadow_protocol::address::{decode, Address};
use shadow_protocol::LedgerConfig;

use crate::logging::LogFormat;

/// One genesis allocation: an encoded address and its base-asset amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAllocation {
    pub address: String,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory holding the sled database.
    pub data_dir: PathBuf,

    /// Default `EnvFilter` directives; `RUST_LOG` overrides them.
    pub log_level: String,

    /// `pretty` or `json`.
    pub log_format: String,

    pub ledger: LedgerConfig,

    pub genesis: Vec<GenesisAllocation>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".shadow"),
            log_level: "shadow_node=info,shadow_protocol=info".to_string(),
            log_format: "pretty".to_string(),
            ledger: LedgerConfig::default(),
            genesis: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Parse a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load `path` if given; otherwise defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::from_str_lossy(&self.log_format)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("db")
    }

    /// Decode every genesis address.
    pub fn allocations(&self) -> Result<Vec<(Address, u64)>> {
        self.genesis
            .iter()
            .map(|alloc| {
                let (address, _) = decode(&alloc.address)
                    .with_context(|| format!("bad genesis address {}", alloc.address))?;
                Ok((address, alloc.amount))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shadow_protocol::address::{derive, AddressKind};

    #[test]
    fn empty_file_is_default() {
        assert_eq!(NodeConfig::from_toml("").unwrap(), NodeConfig::default());
    }

    #[test]
    fn parses_ledger_and_genesis() {
        let encoded = derive(b"treasury").encode(AddressKind::Wallet);
        let text = format!(
            r#"
            data_dir = "/tmp/shadow"
            log_format = "json"

            [ledger]
            min_fee = 5

            [[genesis]]
            address = "{encoded}"
            amount = 42
            "#
        );
        let cfg = NodeConfig::from_toml(&text).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/shadow"));
        assert_eq!(cfg.log_format(), LogFormat::Json);
        assert_eq!(cfg.ledger.min_fee, 5);
        assert_eq!(cfg.ledger.block_reward, LedgerConfig::default().block_reward);
        assert_eq!(cfg.allocations().unwrap(), vec![(derive(b"treasury"), 42)]);
    }

    #[test]
    fn bad_genesis_address_is_reported() {
        let cfg = NodeConfig {
            genesis: vec![GenesisAllocation {
                address: "S123".into(),
                amount: 1,
            }],
            ..NodeConfig::default()
        };
        let err = cfg.allocations().unwrap_err();
        assert!(err.to_string().contains("bad genesis address"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.toml");
        std::fs::write(&path, "log_level = \"debug\"\n").unwrap();
        assert_eq!(NodeConfig::load(&path).unwrap().log_level, "debug");
        assert!(NodeConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
