//! Snapshot manager: numbered checkpoints of ledger state
//!
//! Restoring a snapshot consumes it together with every snapshot captured
//! after it; earlier snapshots stay valid. Ids are never reused.

use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId(u64);

impl SnapshotId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId(0x{:x})", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| LedgerError::Config(format!("Snapshot id {} is missing the 0x prefix", s)))?;
        u64::from_str_radix(digits, 16)
            .map(SnapshotId)
            .map_err(|e| LedgerError::Config(format!("Invalid snapshot id {}: {}", s, e)))
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotManager<T> {
    snapshots: BTreeMap<SnapshotId, T>,
    next_id: u64,
}

impl<T> Default for SnapshotManager<T> {
    fn default() -> Self {
        Self {
            snapshots: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T> SnapshotManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, checkpoint: T) -> SnapshotId {
        let id = SnapshotId(self.next_id);
        self.next_id += 1;
        self.snapshots.insert(id, checkpoint);
        debug!("Captured snapshot {}", id);
        id
    }

    /// Removes and returns the checkpoint for `id`, discarding every later one.
    pub fn restore(&mut self, id: SnapshotId) -> Result<T> {
        let checkpoint = self
            .snapshots
            .remove(&id)
            .ok_or(LedgerError::UnknownSnapshot(id))?;
        let discarded = self.snapshots.split_off(&id);
        if !discarded.is_empty() {
            debug!("Restoring {} discarded {} later snapshot(s)", id, discarded.len());
        }
        Ok(checkpoint)
    }

    pub fn discard(&mut self, id: SnapshotId) -> bool {
        self.snapshots.remove(&id).is_some()
    }

    pub fn contains(&self, id: SnapshotId) -> bool {
        self.snapshots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
