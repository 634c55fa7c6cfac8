use crate::crypto::H256;
use crate::ledger::transaction::Transaction;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: H256,
    /// Unix seconds.
    pub timestamp: u64,
    pub transactions_root: H256,
}

impl BlockHeader {
    pub fn hash(&self) -> H256 {
        let mut hasher = Keccak256::new();
        hasher.update(self.number.to_le_bytes());
        hasher.update(self.parent_hash.as_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update(self.transactions_root.as_bytes());
        H256(hasher.finalize().into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(number: u64, parent_hash: H256, timestamp: u64, transactions: Vec<Transaction>) -> Self {
        let transactions_root = Block::calculate_transactions_root(&transactions);
        Block {
            header: BlockHeader {
                number,
                parent_hash,
                timestamp,
                transactions_root,
            },
            transactions,
        }
    }

    pub fn hash(&self) -> H256 {
        self.header.hash()
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }

    pub fn calculate_transactions_root(transactions: &[Transaction]) -> H256 {
        let mut hasher = Keccak256::new();
        for tx in transactions {
            hasher.update(tx.hash().as_bytes());
        }
        H256(hasher.finalize().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::ledger::transaction::ValueTransferTx;

    #[test]
    fn test_block_hash_links_parent() {
        let genesis = Block::new(0, H256::ZERO, 1_700_000_000, vec![]);
        let tx = Transaction::ValueTransfer(ValueTransferTx {
            from: Address::new([1; 20]),
            to: Address::new([2; 20]),
            value: 1,
            nonce: 0,
        });
        let next = Block::new(1, genesis.hash(), 1_700_000_001, vec![tx]);

        assert_eq!(next.header.parent_hash, genesis.hash());
        assert_ne!(next.hash(), genesis.hash());
        assert_eq!(
            next.header.transactions_root,
            Block::calculate_transactions_root(&next.transactions)
        );
    }
}
