//! Configuration management for devledger

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CHAIN_ID: u64 = 31337;
pub const DEFAULT_MNEMONIC: &str = "test test test test test test test test test test test junk";
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/60'/0'/0";
/// 10000 ether in wei.
pub const DEFAULT_ACCOUNT_BALANCE: u128 = 10_000 * 1_000_000_000_000_000_000;
pub const IN_PROCESS_NETWORK: &str = "hardhat";
pub const LOCALHOST_NETWORK: &str = "localhost";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_network_name")]
    pub default_network: String,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_true")]
    pub automine: bool,
    /// Unix seconds for the genesis block; wall-clock time when absent.
    #[serde(default)]
    pub initial_timestamp: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    #[serde(default = "default_mnemonic")]
    pub mnemonic: String,
    #[serde(default = "default_derivation_path")]
    pub path: String,
    #[serde(default = "default_account_count")]
    pub count: u32,
    /// Initial native balance per account, in wei.
    #[serde(default = "default_account_balance", deserialize_with = "deserialize_u128")]
    pub balance: u128,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_token_name")]
    pub name: String,
    #[serde(default = "default_token_symbol")]
    pub symbol: String,
    #[serde(default = "default_total_supply", deserialize_with = "deserialize_u128")]
    pub total_supply: u128,
    /// Index of the dev account that deploys the token and receives the supply.
    #[serde(default)]
    pub owner_index: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// SQLite file the node loads at start and saves at shutdown.
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkConfig {
    pub url: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chain: ChainConfig::default(),
            accounts: AccountsConfig::default(),
            token: TokenConfig::default(),
            node: NodeConfig::default(),
            logging: LoggingConfig::default(),
            default_network: default_network_name(),
            networks: BTreeMap::new(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            automine: true,
            initial_timestamp: None,
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            mnemonic: default_mnemonic(),
            path: default_derivation_path(),
            count: default_account_count(),
            balance: default_account_balance(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: default_token_name(),
            symbol: default_token_symbol(),
            total_supply: default_total_supply(),
            owner_index: 0,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            state_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl NodeConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.chain.chain_id == 0 {
            return Err(LedgerError::Config("chain.chain_id must be non-zero".to_string()));
        }
        if self.accounts.mnemonic.trim().is_empty() {
            return Err(LedgerError::Config("accounts.mnemonic must be set".to_string()));
        }
        if self.accounts.count == 0 {
            return Err(LedgerError::Config("accounts.count must be at least 1".to_string()));
        }
        if self.token.owner_index >= self.accounts.count {
            return Err(LedgerError::Config(format!(
                "token.owner_index {} is out of range for {} accounts",
                self.token.owner_index, self.accounts.count
            )));
        }
        if self.token.total_supply == 0 {
            return Err(LedgerError::Config("token.total_supply must be non-zero".to_string()));
        }
        crate::logging::parse_level(&self.logging.level)?;
        for (name, network) in &self.networks {
            if name == IN_PROCESS_NETWORK {
                return Err(LedgerError::Config(format!(
                    "networks.{} is reserved for the in-process network",
                    name
                )));
            }
            if network.url.trim().is_empty() {
                return Err(LedgerError::Config(format!("networks.{}.url must be set", name)));
            }
        }
        Ok(())
    }
}

/// Reads `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    if config_str.trim().is_empty() {
        return Ok(Config::default());
    }
    Config::from_toml_str(&config_str)
}

/// Accepts a TOML integer or a decimal string, since TOML integers stop at i64.
fn deserialize_u128<'de, D>(deserializer: D) -> std::result::Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(u128::from(n)),
        Raw::Text(s) => s
            .replace('_', "")
            .parse::<u128>()
            .map_err(|e| serde::de::Error::custom(format!("invalid amount {:?}: {}", s, e))),
    }
}

fn default_true() -> bool {
    true
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_mnemonic() -> String {
    DEFAULT_MNEMONIC.to_string()
}

fn default_derivation_path() -> String {
    DEFAULT_DERIVATION_PATH.to_string()
}

fn default_account_count() -> u32 {
    20
}

fn default_account_balance() -> u128 {
    DEFAULT_ACCOUNT_BALANCE
}

fn default_token_name() -> String {
    "My Hardhat Token".to_string()
}

fn default_token_symbol() -> String {
    "MHT".to_string()
}

fn default_total_supply() -> u128 {
    1_000_000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8545
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_network_name() -> String {
    IN_PROCESS_NETWORK.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chain.chain_id, 31337);
        assert!(config.chain.automine);
        assert_eq!(config.accounts.count, 20);
        assert_eq!(config.accounts.balance, 10_000_000_000_000_000_000_000);
        assert_eq!(config.token.total_supply, 1_000_000);
        assert_eq!(config.node.url(), "http://127.0.0.1:8545");
        assert_eq!(config.default_network, "hardhat");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config("/nonexistent/devledger.toml").unwrap();
        assert_eq!(config.token.symbol, "MHT");
    }

    #[test]
    fn test_parse_partial_file() {
        let config = Config::from_toml_str(
            r#"
            default_network = "localhost"

            [chain]
            automine = false
            initial_timestamp = 1700000000

            [accounts]
            count = 3
            balance = "5000000000000000000000"

            [token]
            name = "Test Token"
            symbol = "TST"
            total_supply = 500

            [networks.staging]
            url = "http://10.0.0.2:8545"
            chain_id = 1337
            "#,
        )
        .unwrap();

        assert!(!config.chain.automine);
        assert_eq!(config.chain.initial_timestamp, Some(1_700_000_000));
        assert_eq!(config.accounts.count, 3);
        assert_eq!(config.accounts.balance, 5_000_000_000_000_000_000_000);
        assert_eq!(config.accounts.mnemonic, DEFAULT_MNEMONIC);
        assert_eq!(config.token.total_supply, 500);
        assert_eq!(config.networks["staging"].chain_id, 1337);
        assert_eq!(config.default_network, "localhost");
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "[accounts]\ncount = 0",
            "[chain]\nchain_id = 0",
            "[token]\ntotal_supply = 0",
            "[token]\nowner_index = 20",
            "[accounts]\nmnemonic = \"  \"",
            "[networks.empty]\nurl = \"\"",
            "[networks.hardhat]\nurl = \"http://127.0.0.1:8545\"",
            "[logging]\nlevel = \"loud\"",
        ];
        for case in cases {
            assert!(
                matches!(Config::from_toml_str(case), Err(LedgerError::Config(_))),
                "{} should be rejected",
                case
            );
        }
    }

    #[test]
    fn test_bad_amount_rejected() {
        let result = Config::from_toml_str("[accounts]\nbalance = \"lots\"");
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }
}
