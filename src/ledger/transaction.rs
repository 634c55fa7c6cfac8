/// Transaction types for the ledger
use crate::address::Address;
use crate::crypto::H256;
use crate::events::Event;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// A transaction recorded in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transaction {
    Deploy(DeployTx),
    TokenTransfer(TokenTransferTx),
    ValueTransfer(ValueTransferTx),
}

impl Transaction {
    pub fn hash(&self) -> H256 {
        let mut hasher = Keccak256::new();
        match self {
            Transaction::Deploy(tx) => {
                hasher.update(b"deploy");
                hasher.update(tx.deployer.as_bytes());
                hasher.update(tx.contract.as_bytes());
                hasher.update(tx.initial_supply.to_le_bytes());
                hasher.update(tx.nonce.to_le_bytes());
            }
            Transaction::TokenTransfer(tx) => {
                hasher.update(b"token_transfer");
                hasher.update(tx.token.as_bytes());
                hasher.update(tx.from.as_bytes());
                hasher.update(tx.to.as_bytes());
                hasher.update(tx.amount.to_le_bytes());
                hasher.update(tx.nonce.to_le_bytes());
            }
            Transaction::ValueTransfer(tx) => {
                hasher.update(b"value_transfer");
                hasher.update(tx.from.as_bytes());
                hasher.update(tx.to.as_bytes());
                hasher.update(tx.value.to_le_bytes());
                hasher.update(tx.nonce.to_le_bytes());
            }
        }
        H256(hasher.finalize().into())
    }

    pub fn sender(&self) -> Address {
        match self {
            Transaction::Deploy(tx) => tx.deployer,
            Transaction::TokenTransfer(tx) => tx.from,
            Transaction::ValueTransfer(tx) => tx.from,
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Transaction::Deploy(tx) => tx.nonce,
            Transaction::TokenTransfer(tx) => tx.nonce,
            Transaction::ValueTransfer(tx) => tx.nonce,
        }
    }
}

/// Token contract creation; credits the whole supply to the deployer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTx {
    pub deployer: Address,
    pub contract: Address,
    pub initial_supply: u128,
    pub nonce: u64,
}

/// Token transfer between two accounts; emits a Transfer event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransferTx {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub amount: u128,
    pub nonce: u64,
}

/// Native currency transfer; emits no event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueTransferTx {
    pub from: Address,
    pub to: Address,
    pub value: u128,
    pub nonce: u64,
}

/// Outcome of an accepted transfer, with the post-transfer balances of both parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub transaction_hash: H256,
    pub block_number: u64,
    pub transaction_index: u32,
    /// False while the transaction sits in the pending block (automine off).
    pub mined: bool,
    pub from_balance: u128,
    pub to_balance: u128,
    pub event: Option<Event>,
}

/// Where a transaction ended up, looked up by hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionLookup<'a> {
    pub transaction: &'a Transaction,
    pub block_number: u64,
    pub transaction_index: u32,
    pub mined: bool,
}
