//! Metadata for the fixed-supply token deployed at genesis

use crate::address::Address;
use crate::config::TokenConfig;
use crate::crypto::contract_address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub total_supply: u128,
    pub owner: Address,
    /// Contract address, derived from the owner and its deployment nonce.
    pub address: Address,
}

impl TokenInfo {
    pub fn deploy(config: &TokenConfig, owner: Address, owner_nonce: u64) -> Self {
        TokenInfo {
            name: config.name.clone(),
            symbol: config.symbol.clone(),
            total_supply: config.total_supply,
            owner,
            address: contract_address(&owner, owner_nonce),
        }
    }
}
