use crate::accounts::Denomination;
use crate::config::Config;
use crate::error::{LedgerError, Result};
use crate::ledger::{Genesis, Ledger};
use crate::persistence::{Database, InMemoryPersistence, Persistence};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Booting,
    Ready,
    Stopped,
}

struct Inner {
    state: NodeState,
    ledger: Ledger,
}

/// A ledger that outlives single script runs. Every access goes through
/// one lock, so there is exactly one writer at a time.
pub struct Node {
    config: Config,
    persistence: Option<Arc<dyn Persistence>>,
    inner: Arc<Mutex<Inner>>,
    url: String,
    chain_id: u64,
}

/// Cloneable access to a running node.
#[derive(Clone)]
pub struct NodeHandle {
    inner: Arc<Mutex<Inner>>,
    url: String,
    chain_id: u64,
}

impl Node {
    /// Starts a node from `config`, loading saved state from
    /// `node.state_path` when it is set.
    pub fn start(config: Config) -> Result<Self> {
        crate::logging::init(&config.logging)?;

        let persistence: Option<Arc<dyn Persistence>> = match &config.node.state_path {
            Some(path) => match Database::open(path) {
                Ok(db) => Some(Arc::new(db)),
                Err(e) => {
                    warn!(
                        "Failed to open state file {}: {}. Falling back to in-memory persistence.",
                        path.display(),
                        e
                    );
                    Some(Arc::new(InMemoryPersistence::new()))
                }
            },
            None => None,
        };
        Self::start_with(config, persistence)
    }

    pub fn start_with(config: Config, persistence: Option<Arc<dyn Persistence>>) -> Result<Self> {
        let url = config.node.url();
        info!("Starting devledger node at {} (chain_id = {})", url, config.chain.chain_id);

        let genesis = Genesis::from_config(&config)?;
        let saved = match &persistence {
            Some(persistence) => persistence.load_ledger()?,
            None => None,
        };
        let ledger = match saved {
            Some(image) => {
                info!(blocks = image.blocks.len(), "Resuming from saved state");
                Ledger::from_image(genesis, image)?
            }
            None => Ledger::new(genesis)?,
        };
        let chain_id = ledger.chain_id();
        let inner = Arc::new(Mutex::new(Inner {
            state: NodeState::Booting,
            ledger,
        }));

        {
            let mut inner = inner.lock();
            info!("Accounts\n{}", accounts_banner(&inner.ledger));
            warn!("These accounts and their private keys are publicly known. Never send real funds to them.");
            inner.state = NodeState::Ready;
            info!("Node ready at {} (block {})", url, inner.ledger.block_number());
        }

        Ok(Node {
            config,
            persistence,
            inner,
            url,
            chain_id,
        })
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            inner: Arc::clone(&self.inner),
            url: self.url.clone(),
            chain_id: self.chain_id,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> NodeState {
        self.inner.lock().state
    }

    /// Saves the ledger when a persistence backend is set, then stops the
    /// node. Handles fail with `NetworkUnavailable` afterwards. A failed save
    /// leaves the node running so shutdown can be retried.
    pub fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state == NodeState::Stopped {
            return Ok(());
        }
        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.save_ledger(&inner.ledger.image()) {
                warn!("Failed to save state for node at {}: {}", self.url, e);
                return Err(e);
            }
        }
        inner.state = NodeState::Stopped;
        info!("Node at {} stopped at block {}", self.url, inner.ledger.block_number());
        Ok(())
    }
}

impl NodeHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Runs `f` with exclusive access to the node's ledger.
    pub fn execute<R>(&self, f: impl FnOnce(&mut Ledger) -> R) -> Result<R> {
        let mut inner = self.inner.lock();
        if inner.state != NodeState::Ready {
            warn!("Rejected request: node at {} is {:?}", self.url, inner.state);
            return Err(LedgerError::NetworkUnavailable(format!(
                "Node at {} is not running",
                self.url
            )));
        }
        Ok(f(&mut inner.ledger))
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().state == NodeState::Ready
    }
}

/// Dev accounts table printed at startup.
pub fn accounts_banner(ledger: &Ledger) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Address", "Private Key", "Balance (ETH)"]);

    for account in ledger.dev_accounts() {
        let balance = ledger
            .accounts()
            .balance_of(&account.address, Denomination::Native);
        table.add_row(vec![
            Cell::new(account.index),
            Cell::new(account.address),
            Cell::new(account.keypair.secret_hex()),
            Cell::new(format_ether(balance)),
        ]);
    }
    table.to_string()
}

/// Formats a wei amount in ether, trimming trailing zeros.
pub fn format_ether(wei: u128) -> String {
    let whole = wei / WEI_PER_ETHER;
    let fraction = wei % WEI_PER_ETHER;
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:018}", fraction);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}
