//! Named fixtures built on snapshots
//!
//! The first load of a fixture runs its setup and snapshots the result. Later
//! loads rewind the ledger to that snapshot instead of running setup again.

use crate::error::Result;
use crate::ledger::Ledger;
use crate::snapshot::SnapshotId;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct Fixture<T> {
    snapshot: SnapshotId,
    value: T,
}

#[derive(Debug, Clone)]
pub struct FixtureCache<T> {
    fixtures: HashMap<String, Fixture<T>>,
}

impl<T> Default for FixtureCache<T> {
    fn default() -> Self {
        Self {
            fixtures: HashMap::new(),
        }
    }
}

impl<T: Clone> FixtureCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `setup` once per name. Restoring consumes the snapshot, so every
    /// later load takes a fresh one. If the snapshot was lost to a restore of an
    /// earlier snapshot, this fails with `UnknownSnapshot`.
    pub fn load_fixture<F>(&mut self, ledger: &mut Ledger, name: &str, setup: F) -> Result<T>
    where
        F: FnOnce(&mut Ledger) -> Result<T>,
    {
        if let Some(fixture) = self.fixtures.get_mut(name) {
            ledger.restore(fixture.snapshot)?;
            fixture.snapshot = ledger.capture();
            debug!(fixture = name, snapshot = %fixture.snapshot, "Fixture restored");
            return Ok(fixture.value.clone());
        }

        let value = setup(ledger)?;
        let snapshot = ledger.capture();
        debug!(fixture = name, %snapshot, "Fixture created");
        self.fixtures.insert(
            name.to_string(),
            Fixture {
                snapshot,
                value: value.clone(),
            },
        );
        Ok(value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fixtures.contains_key(name)
    }

    pub fn forget(&mut self, name: &str) -> bool {
        self.fixtures.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::config::Config;
    use crate::error::LedgerError;
    use crate::ledger::Genesis;

    fn ledger() -> Ledger {
        let mut config = Config::default();
        config.accounts.count = 2;
        Ledger::new(Genesis::from_config(&config).unwrap()).unwrap()
    }

    fn deploy_fixture(ledger: &mut Ledger) -> Result<(Address, Address)> {
        let owner = ledger.token().owner;
        let addr1 = ledger.dev_accounts()[1].address;
        ledger.transfer(owner, addr1, 100)?;
        Ok((owner, addr1))
    }

    #[test]
    fn test_setup_runs_once() {
        let mut ledger = ledger();
        let mut cache = FixtureCache::new();
        let mut runs = 0;

        for _ in 0..3 {
            let (owner, addr1) = cache
                .load_fixture(&mut ledger, "deploy", |ledger| {
                    runs += 1;
                    deploy_fixture(ledger)
                })
                .unwrap();
            assert_eq!(ledger.token_balance(addr1).unwrap(), 100);
            // mutate after loading; the next load must undo it
            ledger.transfer(owner, addr1, 1).unwrap();
        }

        assert_eq!(runs, 1);
        assert!(cache.contains("deploy"));
    }

    #[test]
    fn test_load_rewinds_events_and_blocks() {
        let mut ledger = ledger();
        let mut cache = FixtureCache::new();
        let (owner, addr1) = cache.load_fixture(&mut ledger, "deploy", deploy_fixture).unwrap();
        let events = ledger.events().len();
        let block = ledger.block_number();

        ledger.transfer(addr1, owner, 10).unwrap();
        ledger.mine_blocks(5);

        cache.load_fixture(&mut ledger, "deploy", deploy_fixture).unwrap();
        assert_eq!(ledger.events().len(), events);
        assert_eq!(ledger.block_number(), block);
    }

    #[test]
    fn test_setup_error_caches_nothing() {
        let mut ledger = ledger();
        let mut cache: FixtureCache<()> = FixtureCache::new();
        let result = cache.load_fixture(&mut ledger, "broken", |_| Err(LedgerError::ZeroAmount));
        assert_eq!(result, Err(LedgerError::ZeroAmount));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stale_fixture_snapshot() {
        let mut ledger = ledger();
        let mut cache = FixtureCache::new();
        let base = ledger.capture();
        cache.load_fixture(&mut ledger, "deploy", deploy_fixture).unwrap();

        // restoring an earlier snapshot drops the fixture's snapshot too
        ledger.restore(base).unwrap();
        assert!(matches!(
            cache.load_fixture(&mut ledger, "deploy", deploy_fixture),
            Err(LedgerError::UnknownSnapshot(_))
        ));

        assert!(cache.forget("deploy"));
        cache.load_fixture(&mut ledger, "deploy", deploy_fixture).unwrap();
    }
}
