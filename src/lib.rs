//! devledger - A deterministic in-memory ledger for local development and tests
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`ledger`] - Ledger state machine, blocks, transactions and validation
//! - [`accounts`] - Account store (native balance, token balance, nonce)
//! - [`events`] - Append-only event log and filtered queries
//! - [`snapshot`] - Numbered checkpoints with restore
//! - [`token`] - Fixed-supply token metadata
//!
//! ## Cryptography
//! - [`address`] - 20-byte addresses with EIP-55 checksums
//! - [`crypto`] - Keccak-256, secp256k1 keys and BIP-39/BIP-32 dev accounts
//!
//! ## Test Support & Hosting
//! - [`fixtures`] - Snapshot-backed fixtures
//! - [`network`] - Named networks and script runs
//! - [`node`] - Long-lived ledger host
//! - [`persistence`] - Database layer (SQLite)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`logging`] - Tracing subscriber setup
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod accounts;
pub mod events;
pub mod ledger;
pub mod snapshot;
pub mod token;

// ============================================================================
// Cryptography
// ============================================================================
pub mod address;
pub mod crypto;

// ============================================================================
// Test Support & Hosting
// ============================================================================
pub mod fixtures;
pub mod network;
pub mod node;
pub mod persistence;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod logging;

pub use address::Address;
pub use error::{LedgerError, Result};
pub use ledger::{Genesis, Ledger};
pub use snapshot::SnapshotId;
