use crate::accounts::{AccountStore, Denomination};
use crate::address::{Address, AddressLike};
use crate::crypto::{DevAccount, H256};
use crate::error::{LedgerError, Result};
use crate::events::{Event, EventFilter, EventLog, EventQuery};
use crate::ledger::block::Block;
use crate::ledger::genesis::Genesis;
use crate::ledger::transaction::{
    DeployTx, TokenTransferTx, Transaction, TransactionLookup, TransferReceipt, ValueTransferTx,
};
use crate::ledger::validation::{validate_next_timestamp, validate_transfer, MAX_TIMESTAMP};
use crate::snapshot::{SnapshotId, SnapshotManager};
use crate::token::TokenInfo;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// State captured by a snapshot. Accounts are copied; the event log and the
/// chain are append-only between restores, so their lengths are enough.
#[derive(Debug, Clone)]
struct Checkpoint {
    accounts: AccountStore,
    event_len: usize,
    block_len: usize,
    pending: Vec<Transaction>,
    time_offset: i64,
    next_timestamp: Option<u64>,
}

/// Serializable ledger contents, used by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerImage {
    pub chain_id: u64,
    pub token: TokenInfo,
    pub accounts: AccountStore,
    pub events: EventLog,
    pub blocks: Vec<Block>,
    pub pending: Vec<Transaction>,
    pub time_offset: i64,
}

#[derive(Debug)]
pub struct Ledger {
    chain_id: u64,
    automine: bool,
    dev_accounts: Vec<DevAccount>,
    token: TokenInfo,
    accounts: AccountStore,
    events: EventLog,
    blocks: Vec<Block>,
    pending: Vec<Transaction>,
    snapshots: SnapshotManager<Checkpoint>,
    /// Seconds added to the wall clock when stamping blocks.
    time_offset: i64,
    next_timestamp: Option<u64>,
}

fn wall_clock() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Ledger {
    /// Builds block 0, funds the dev accounts, and deploys the token from the
    /// owner account in block 1 with the whole supply credited to the owner.
    pub fn new(genesis: Genesis) -> Result<Self> {
        let owner = genesis.owner()?.address;
        let token = TokenInfo::deploy(&genesis.token, owner, 0);
        let time_offset = match genesis.chain.initial_timestamp {
            Some(ts) => {
                validate_next_timestamp(0, ts)?;
                ts as i64 - wall_clock()
            }
            None => 0,
        };

        let mut accounts = AccountStore::new();
        for account in &genesis.dev_accounts {
            accounts.set_balance(account.address, Denomination::Native, genesis.account_balance)?;
        }

        let mut ledger = Ledger {
            chain_id: genesis.chain.chain_id,
            automine: genesis.chain.automine,
            dev_accounts: genesis.dev_accounts,
            token,
            accounts,
            events: EventLog::new(),
            blocks: Vec::new(),
            pending: Vec::new(),
            snapshots: SnapshotManager::new(),
            time_offset,
            next_timestamp: None,
        };
        ledger.seal_block();

        let nonce = ledger.accounts.increment_nonce(&owner);
        ledger
            .accounts
            .credit(&owner, Denomination::Token, ledger.token.total_supply)?;
        ledger.pending.push(Transaction::Deploy(DeployTx {
            deployer: owner,
            contract: ledger.token.address,
            initial_supply: ledger.token.total_supply,
            nonce,
        }));
        ledger.seal_block();

        info!(
            chain_id = ledger.chain_id,
            token = %ledger.token.address,
            owner = %owner,
            supply = ledger.token.total_supply,
            "Ledger initialized"
        );
        Ok(ledger)
    }

    /// Rebuilds a ledger from a persisted image. Dev accounts come from
    /// `genesis`; balances, events and blocks come from the image.
    pub fn from_image(genesis: Genesis, image: LedgerImage) -> Result<Self> {
        if image.chain_id != genesis.chain.chain_id {
            return Err(LedgerError::Config(format!(
                "State belongs to chain {}, configured chain is {}",
                image.chain_id, genesis.chain.chain_id
            )));
        }
        if image.blocks.is_empty() {
            return Err(LedgerError::Database("State image has no blocks".to_string()));
        }
        for (index, block) in image.blocks.iter().enumerate() {
            let parent_hash = match index {
                0 => H256::ZERO,
                _ => image.blocks[index - 1].hash(),
            };
            if block.header.number != index as u64 || block.header.parent_hash != parent_hash {
                return Err(LedgerError::Database(format!(
                    "State image block {} does not link to the chain at position {}",
                    block.header.number, index
                )));
            }
        }
        let supply = image.accounts.token_supply();
        if supply != image.token.total_supply {
            return Err(LedgerError::Database(format!(
                "State image token balances sum to {} but the supply is {}",
                supply, image.token.total_supply
            )));
        }

        Ok(Ledger {
            chain_id: image.chain_id,
            automine: genesis.chain.automine,
            dev_accounts: genesis.dev_accounts,
            token: image.token,
            accounts: image.accounts,
            events: image.events,
            blocks: image.blocks,
            pending: image.pending,
            snapshots: SnapshotManager::new(),
            time_offset: image.time_offset,
            next_timestamp: None,
        })
    }

    pub fn image(&self) -> LedgerImage {
        LedgerImage {
            chain_id: self.chain_id,
            token: self.token.clone(),
            accounts: self.accounts.clone(),
            events: self.events.clone(),
            blocks: self.blocks.clone(),
            pending: self.pending.clone(),
            time_offset: self.time_offset,
        }
    }

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    /// Moves `amount` tokens from `from` to `to` and emits a Transfer event.
    /// On any error the ledger is left untouched.
    pub fn transfer(
        &mut self,
        from: impl AddressLike,
        to: impl AddressLike,
        amount: u128,
    ) -> Result<TransferReceipt> {
        let from = from.to_address()?;
        let to = to.to_address()?;
        let (from_balance, to_balance, nonce) =
            self.apply_transfer(Denomination::Token, from, to, amount)?;

        let tx = Transaction::TokenTransfer(TokenTransferTx {
            token: self.token.address,
            from,
            to,
            amount,
            nonce,
        });
        let transaction_hash = tx.hash();
        let block_number = self.pending_block_number();
        let event = self
            .events
            .append(Event::transfer(
                self.token.address,
                block_number,
                transaction_hash,
                from,
                to,
                amount,
            ))
            .clone();
        debug!(%from, %to, amount, seq = event.seq, "Token transfer applied");

        let (transaction_index, mined) = self.submit(tx);
        Ok(TransferReceipt {
            transaction_hash,
            block_number,
            transaction_index,
            mined,
            from_balance,
            to_balance,
            event: Some(event),
        })
    }

    /// Native currency transfer. Same validation as [`Ledger::transfer`], no event.
    pub fn send_value(
        &mut self,
        from: impl AddressLike,
        to: impl AddressLike,
        value: u128,
    ) -> Result<TransferReceipt> {
        let from = from.to_address()?;
        let to = to.to_address()?;
        let (from_balance, to_balance, nonce) =
            self.apply_transfer(Denomination::Native, from, to, value)?;

        let tx = Transaction::ValueTransfer(ValueTransferTx {
            from,
            to,
            value,
            nonce,
        });
        let transaction_hash = tx.hash();
        let block_number = self.pending_block_number();
        debug!(%from, %to, value, "Value transfer applied");

        let (transaction_index, mined) = self.submit(tx);
        Ok(TransferReceipt {
            transaction_hash,
            block_number,
            transaction_index,
            mined,
            from_balance,
            to_balance,
            event: None,
        })
    }

    fn apply_transfer(
        &mut self,
        denomination: Denomination,
        from: Address,
        to: Address,
        amount: u128,
    ) -> Result<(u128, u128, u64)> {
        let (from_balance, to_balance) =
            validate_transfer(&self.accounts, denomination, &from, &to, amount)?;
        // cannot fail once validated
        self.accounts.debit(&from, denomination, amount)?;
        self.accounts.credit(&to, denomination, amount)?;
        let nonce = self.accounts.increment_nonce(&from);
        Ok((from_balance, to_balance, nonce))
    }

    /// Overwrites a native balance. Token balances have no setter so the
    /// supply stays fixed.
    pub fn set_native_balance(&mut self, address: impl AddressLike, value: u128) -> Result<()> {
        let address = address.to_address()?;
        self.accounts.set_balance(address, Denomination::Native, value)?;
        debug!(%address, value, "Native balance set");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Blocks and time
    // ------------------------------------------------------------------

    fn submit(&mut self, tx: Transaction) -> (u32, bool) {
        let index = self.pending.len() as u32;
        self.pending.push(tx);
        if self.automine {
            self.seal_block();
        }
        (index, self.automine)
    }

    fn seal_block(&mut self) -> &Block {
        let number = self.blocks.len() as u64;
        let parent_hash = self.blocks.last().map_or(H256::ZERO, Block::hash);
        let timestamp = self.next_block_timestamp();
        let transactions = std::mem::take(&mut self.pending);

        let block = Block::new(number, parent_hash, timestamp, transactions);
        info!(
            number,
            hash = %block.hash(),
            timestamp,
            transactions = block.transactions.len(),
            "Mined block"
        );
        self.blocks.push(block);
        &self.blocks[self.blocks.len() - 1]
    }

    fn clock(&self) -> u64 {
        wall_clock().saturating_add(self.time_offset).max(0) as u64
    }

    fn next_block_timestamp(&mut self) -> u64 {
        let now = self.clock();
        match self.next_timestamp.take() {
            Some(forced) => {
                // later blocks continue from the forced time; forced <= MAX_TIMESTAMP
                self.time_offset = forced as i64 - wall_clock();
                forced
            }
            None => match self.blocks.last() {
                Some(last) => now.max(last.header.timestamp.saturating_add(1)),
                None => now,
            },
        }
    }

    /// Seals the pending block, which may be empty.
    pub fn mine(&mut self) -> &Block {
        self.seal_block()
    }

    /// Seals `count` blocks and returns the latest block number.
    pub fn mine_blocks(&mut self, count: u64) -> u64 {
        for _ in 0..count {
            self.seal_block();
        }
        self.block_number()
    }

    pub fn set_automine(&mut self, enabled: bool) {
        self.automine = enabled;
    }

    pub fn automine(&self) -> bool {
        self.automine
    }

    pub fn set_next_block_timestamp(&mut self, timestamp: u64) -> Result<()> {
        validate_next_timestamp(self.latest_block().header.timestamp, timestamp)?;
        self.next_timestamp = Some(timestamp);
        Ok(())
    }

    /// Moves the clock forward and returns the total offset in seconds. Fails
    /// with `InvalidTimestamp` when the clock would pass `MAX_TIMESTAMP`.
    pub fn increase_time(&mut self, seconds: u64) -> Result<i64> {
        let offset = i64::try_from(seconds)
            .ok()
            .and_then(|seconds| self.time_offset.checked_add(seconds))
            .filter(|offset| wall_clock().checked_add(*offset).is_some())
            .ok_or_else(|| {
                LedgerError::InvalidTimestamp(format!(
                    "Advancing the clock by {} seconds passes {}",
                    seconds, MAX_TIMESTAMP
                ))
            })?;
        self.time_offset = offset;
        Ok(offset)
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    pub fn capture(&mut self) -> SnapshotId {
        let checkpoint = Checkpoint {
            accounts: self.accounts.clone(),
            event_len: self.events.len(),
            block_len: self.blocks.len(),
            pending: self.pending.clone(),
            time_offset: self.time_offset,
            next_timestamp: self.next_timestamp,
        };
        let id = self.snapshots.capture(checkpoint);
        info!(%id, block = self.block_number(), "Snapshot captured");
        id
    }

    /// Rewinds accounts, events, blocks, pending transactions and the clock to
    /// the snapshot. The snapshot and all later ones are consumed.
    pub fn restore(&mut self, id: SnapshotId) -> Result<()> {
        let checkpoint = self.snapshots.restore(id)?;
        self.accounts = checkpoint.accounts;
        self.events.truncate(checkpoint.event_len);
        self.blocks.truncate(checkpoint.block_len);
        self.pending = checkpoint.pending;
        self.time_offset = checkpoint.time_offset;
        self.next_timestamp = checkpoint.next_timestamp;
        info!(%id, block = self.block_number(), "Snapshot restored");
        Ok(())
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.len()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn token(&self) -> &TokenInfo {
        &self.token
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn dev_accounts(&self) -> &[DevAccount] {
        &self.dev_accounts
    }

    pub fn dev_account(&self, index: usize) -> Option<Address> {
        self.dev_accounts.get(index).map(|account| account.address)
    }

    pub fn token_balance(&self, address: impl AddressLike) -> Result<u128> {
        self.accounts.get_balance(address, Denomination::Token)
    }

    pub fn native_balance(&self, address: impl AddressLike) -> Result<u128> {
        self.accounts.get_balance(address, Denomination::Native)
    }

    pub fn nonce(&self, address: impl AddressLike) -> Result<u64> {
        Ok(self.accounts.nonce(&address.to_address()?))
    }

    /// Sum of all token balances; always equals the token's total supply.
    pub fn token_supply(&self) -> u128 {
        self.accounts.token_supply()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn query_events(&self, filter: EventFilter) -> EventQuery<'_> {
        self.events.query(filter)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, number: u64) -> Option<&Block> {
        usize::try_from(number).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn latest_block(&self) -> &Block {
        // block 0 is created in `new` and never truncated away
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn block_number(&self) -> u64 {
        self.latest_block().header.number
    }

    fn pending_block_number(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn transaction(&self, hash: &H256) -> Option<TransactionLookup<'_>> {
        for block in &self.blocks {
            for (index, tx) in block.transactions.iter().enumerate() {
                if tx.hash() == *hash {
                    return Some(TransactionLookup {
                        transaction: tx,
                        block_number: block.header.number,
                        transaction_index: index as u32,
                        mined: true,
                    });
                }
            }
        }
        self.pending
            .iter()
            .enumerate()
            .find(|(_, tx)| tx.hash() == *hash)
            .map(|(index, tx)| TransactionLookup {
                transaction: tx,
                block_number: self.pending_block_number(),
                transaction_index: index as u32,
                mined: false,
            })
    }

    /// Events emitted by one transaction, in log order.
    pub fn transaction_events(&self, hash: &H256) -> Vec<&Event> {
        self.events
            .all()
            .iter()
            .filter(|event| event.transaction_hash == *hash)
            .collect()
    }
}
