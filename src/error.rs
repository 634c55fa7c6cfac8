//! Error types for devledger

use crate::address::Address;
use crate::snapshot::SnapshotId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Insufficient balance: {address} holds {available}, needs {required}")]
    InsufficientBalance {
        address: Address,
        available: u128,
        required: u128,
    },
    #[error("Unknown snapshot: {0}")]
    UnknownSnapshot(SnapshotId),
    #[error("Transfer amount must be greater than zero")]
    ZeroAmount,
    #[error("Balance overflow for {0}")]
    BalanceOverflow(Address),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Cryptographic error: {0}")]
    Crypto(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for LedgerError {
    fn from(err: toml::de::Error) -> Self {
        LedgerError::Config(err.to_string())
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        LedgerError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Database(format!("Serialization failed: {}", err))
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, LedgerError>;
