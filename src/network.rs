//! Named networks and script runs
//!
//! `hardhat` is always the in-process network: each run gets a fresh ledger
//! that is thrown away afterwards. Every other network is an endpoint served by
//! a running [`Node`](crate::node::Node).

use crate::config::{Config, IN_PROCESS_NETWORK, LOCALHOST_NETWORK};
use crate::error::{LedgerError, Result};
use crate::ledger::{Genesis, Ledger};
use crate::node::NodeHandle;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkKind {
    InProcess,
    Endpoint { url: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub name: String,
    pub chain_id: u64,
    pub kind: NetworkKind,
}

impl Network {
    pub fn is_in_process(&self) -> bool {
        self.kind == NetworkKind::InProcess
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NetworkKind::InProcess => write!(f, "{} (in-process, chain {})", self.name, self.chain_id),
            NetworkKind::Endpoint { url } => write!(f, "{} ({}, chain {})", self.name, url, self.chain_id),
        }
    }
}

/// Every network the configuration knows about: the built-in `hardhat` and
/// `localhost` entries plus `[networks.*]`. A configured `localhost` replaces
/// the built-in one.
pub fn networks(config: &Config) -> BTreeMap<String, Network> {
    let mut networks = BTreeMap::new();
    networks.insert(
        IN_PROCESS_NETWORK.to_string(),
        Network {
            name: IN_PROCESS_NETWORK.to_string(),
            chain_id: config.chain.chain_id,
            kind: NetworkKind::InProcess,
        },
    );
    networks.insert(
        LOCALHOST_NETWORK.to_string(),
        Network {
            name: LOCALHOST_NETWORK.to_string(),
            chain_id: config.chain.chain_id,
            kind: NetworkKind::Endpoint {
                url: config.node.url(),
            },
        },
    );
    for (name, network) in &config.networks {
        if name == IN_PROCESS_NETWORK {
            continue;
        }
        networks.insert(
            name.clone(),
            Network {
                name: name.clone(),
                chain_id: network.chain_id,
                kind: NetworkKind::Endpoint {
                    url: network.url.trim_end_matches('/').to_string(),
                },
            },
        );
    }
    networks
}

/// Looks up `name`, or the configured default network when `name` is `None`.
pub fn resolve_network(config: &Config, name: Option<&str>) -> Result<Network> {
    let name = name.unwrap_or(config.default_network.as_str());
    networks(config)
        .remove(name)
        .ok_or_else(|| LedgerError::UnknownNetwork(name.to_string()))
}

/// Runs `script` against the selected network.
///
/// On the in-process network the script gets its own ledger built from
/// `config`. On an endpoint network it runs against `node`, which must be
/// serving that network's url and chain id.
pub fn run_script<T, F>(
    config: &Config,
    network: Option<&str>,
    node: Option<&NodeHandle>,
    script: F,
) -> Result<T>
where
    F: FnOnce(&mut Ledger) -> Result<T>,
{
    let network = resolve_network(config, network)?;
    info!(network = %network, "Running script");

    let result = match &network.kind {
        NetworkKind::InProcess => {
            let mut ledger = Ledger::new(Genesis::from_config(config)?)?;
            script(&mut ledger)
        }
        NetworkKind::Endpoint { url } => {
            let node = node.ok_or_else(|| {
                LedgerError::NetworkUnavailable(format!("No node is running at {}", url))
            })?;
            if node.url() != url.as_str() || node.chain_id() != network.chain_id {
                return Err(LedgerError::NetworkUnavailable(format!(
                    "Network {} expects {} (chain {}), the node serves {} (chain {})",
                    network.name,
                    url,
                    network.chain_id,
                    node.url(),
                    node.chain_id()
                )));
            }
            node.execute(script)?
        }
    };

    if let Err(e) = &result {
        warn!(network = %network.name, error = %e, "Script failed");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;

    fn small_config() -> Config {
        let mut config = Config::default();
        config.accounts.count = 2;
        config
    }

    #[test]
    fn test_builtin_networks() {
        let config = small_config();
        let hardhat = resolve_network(&config, None).unwrap();
        assert!(hardhat.is_in_process());
        assert_eq!(hardhat.chain_id, 31337);

        let localhost = resolve_network(&config, Some("localhost")).unwrap();
        assert_eq!(
            localhost.kind,
            NetworkKind::Endpoint {
                url: "http://127.0.0.1:8545".to_string()
            }
        );
    }

    #[test]
    fn test_configured_networks() {
        let mut config = small_config();
        config.networks.insert(
            "staging".to_string(),
            NetworkConfig {
                url: "http://10.0.0.2:8545/".to_string(),
                chain_id: 1337,
            },
        );
        config.default_network = "staging".to_string();

        let staging = resolve_network(&config, None).unwrap();
        assert_eq!(staging.chain_id, 1337);
        assert_eq!(staging.to_string(), "staging (http://10.0.0.2:8545, chain 1337)");
        assert_eq!(networks(&config).len(), 3);
    }

    #[test]
    fn test_unknown_network() {
        let result = run_script(&small_config(), Some("mainnet"), None, |_| Ok(()));
        assert_eq!(result, Err(LedgerError::UnknownNetwork("mainnet".to_string())));
    }

    #[test]
    fn test_in_process_runs_are_ephemeral() {
        let config = small_config();
        for _ in 0..2 {
            let balance = run_script(&config, None, None, |ledger| {
                let owner = ledger.token().owner;
                let addr1 = ledger.dev_accounts()[1].address;
                ledger.transfer(owner, addr1, 50)?;
                ledger.token_balance(addr1)
            })
            .unwrap();
            // each run starts from genesis
            assert_eq!(balance, 50);
        }
    }

    #[test]
    fn test_endpoint_without_node() {
        let result = run_script(&small_config(), Some("localhost"), None, |_| Ok(()));
        assert!(matches!(result, Err(LedgerError::NetworkUnavailable(_))));
    }

    #[test]
    fn test_script_errors_propagate() {
        let result: Result<()> = run_script(&small_config(), None, None, |ledger| {
            let addr1 = ledger.dev_accounts()[1].address;
            let owner = ledger.token().owner;
            ledger.transfer(addr1, owner, 1).map(|_| ())
        });
        assert!(matches!(result, Err(LedgerError::InsufficientBalance { .. })));
    }
}
