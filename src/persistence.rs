//! Database persistence layer for devledger
//!
//! A node with a configured `state_path` writes its ledger image here at
//! shutdown and reads it back at start. Snapshots are never persisted.

use crate::accounts::{Account, AccountStore};
use crate::address::Address;
use crate::crypto::H256;
use crate::error::{LedgerError, Result};
use crate::events::{Event, EventLog};
use crate::ledger::{Block, BlockHeader, LedgerImage, Transaction};
use crate::token::TokenInfo;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Abstraction for persistence backends. Saving replaces whatever image was
/// stored before, atomically.
pub trait Persistence: Send + Sync {
    fn save_ledger(&self, image: &LedgerImage) -> Result<()>;
    /// `None` when nothing has been saved yet.
    fn load_ledger(&self) -> Result<Option<LedgerImage>>;
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        address TEXT PRIMARY KEY,
        native_balance TEXT NOT NULL,
        token_balance TEXT NOT NULL,
        nonce INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS events (
        seq INTEGER PRIMARY KEY,
        block_number INTEGER NOT NULL,
        data TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS blocks (
        number INTEGER PRIMARY KEY,
        hash TEXT NOT NULL,
        parent_hash TEXT NOT NULL,
        timestamp INTEGER NOT NULL,
        transactions_root TEXT NOT NULL,
        transactions TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path).map_err(|e| {
            LedgerError::Database(format!("Failed to open database {}: {}", path.display(), e))
        })?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| LedgerError::Database(format!("Failed to create tables: {}", e)))?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    pub fn save_ledger(&self, image: &LedgerImage) -> Result<()> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;

        for table in ["accounts", "events", "blocks", "metadata"] {
            tx.execute(&format!("DELETE FROM {}", table), [])?;
        }

        // u128 does not fit SQLite integers; balances are stored as decimal text
        for (address, account) in image.accounts.iter() {
            tx.execute(
                "INSERT INTO accounts (address, native_balance, token_balance, nonce)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    address.to_string(),
                    account.native_balance.to_string(),
                    account.token_balance.to_string(),
                    account.nonce as i64,
                ],
            )?;
        }

        for event in image.events.all() {
            tx.execute(
                "INSERT INTO events (seq, block_number, data) VALUES (?1, ?2, ?3)",
                params![
                    event.seq as i64,
                    event.block_number as i64,
                    serde_json::to_string(event)?,
                ],
            )?;
        }

        for block in &image.blocks {
            tx.execute(
                "INSERT INTO blocks (number, hash, parent_hash, timestamp, transactions_root, transactions)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    block.header.number as i64,
                    block.hash().to_string(),
                    block.header.parent_hash.to_string(),
                    block.header.timestamp as i64,
                    block.header.transactions_root.to_string(),
                    serde_json::to_string(&block.transactions)?,
                ],
            )?;
        }

        let metadata = [
            ("chain_id", image.chain_id.to_string()),
            ("token", serde_json::to_string(&image.token)?),
            ("pending", serde_json::to_string(&image.pending)?),
            ("time_offset", image.time_offset.to_string()),
        ];
        for (key, value) in metadata {
            tx.execute(
                "INSERT INTO metadata (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
        }

        tx.commit()?;
        info!(
            blocks = image.blocks.len(),
            accounts = image.accounts.len(),
            events = image.events.len(),
            "Ledger state saved"
        );
        Ok(())
    }

    pub fn load_ledger(&self) -> Result<Option<LedgerImage>> {
        let conn = self.conn.lock();

        let Some(chain_id) = read_metadata(&conn, "chain_id")? else {
            return Ok(None);
        };
        let chain_id: u64 = parse_field(&chain_id, "chain_id")?;
        let token: TokenInfo = serde_json::from_str(&require_metadata(&conn, "token")?)?;
        let pending: Vec<Transaction> = serde_json::from_str(&require_metadata(&conn, "pending")?)?;
        let time_offset: i64 = parse_field(&require_metadata(&conn, "time_offset")?, "time_offset")?;

        let mut stmt =
            conn.prepare("SELECT address, native_balance, token_balance, nonce FROM accounts")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        let mut accounts = Vec::new();
        for row in rows {
            let (address, native, token_balance, nonce) = row?;
            let account = Account {
                native_balance: parse_field(&native, "native_balance")?,
                token_balance: parse_field(&token_balance, "token_balance")?,
                nonce: nonce as u64,
            };
            accounts.push((Address::from_str(&address)?, account));
        }
        let accounts: AccountStore = accounts.into_iter().collect();

        let mut stmt = conn.prepare("SELECT data FROM events ORDER BY seq ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut events = Vec::new();
        for row in rows {
            events.push(serde_json::from_str::<Event>(&row?)?);
        }
        let events: EventLog = events.into_iter().collect();

        let mut stmt = conn.prepare(
            "SELECT number, hash, parent_hash, timestamp, transactions_root, transactions
             FROM blocks ORDER BY number ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut blocks = Vec::new();
        for row in rows {
            let (number, hash, parent_hash, timestamp, transactions_root, transactions) = row?;
            let block = Block {
                header: BlockHeader {
                    number: number as u64,
                    parent_hash: H256::from_str(&parent_hash)?,
                    timestamp: timestamp as u64,
                    transactions_root: H256::from_str(&transactions_root)?,
                },
                transactions: serde_json::from_str(&transactions)?,
            };
            if block.hash() != H256::from_str(&hash)? {
                return Err(LedgerError::Database(format!(
                    "Block {} does not match its stored hash",
                    number
                )));
            }
            blocks.push(block);
        }

        info!(blocks = blocks.len(), accounts = accounts.len(), "Ledger state loaded");
        Ok(Some(LedgerImage {
            chain_id,
            token,
            accounts,
            events,
            blocks,
            pending,
            time_offset,
        }))
    }
}

fn read_metadata(conn: &Connection, key: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

fn require_metadata(conn: &Connection, key: &str) -> Result<String> {
    read_metadata(conn, key)?
        .ok_or_else(|| LedgerError::Database(format!("Missing metadata entry {}", key)))
}

fn parse_field<T>(value: &str, field: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| LedgerError::Database(format!("Invalid {} {:?}: {}", field, value, e)))
}

impl Persistence for Database {
    fn save_ledger(&self, image: &LedgerImage) -> Result<()> {
        Database::save_ledger(self, image)
    }

    fn load_ledger(&self) -> Result<Option<LedgerImage>> {
        Database::load_ledger(self)
    }
}

/// Keeps the last saved image in memory. Useful for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    image: Arc<Mutex<Option<LedgerImage>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for InMemoryPersistence {
    fn save_ledger(&self, image: &LedgerImage) -> Result<()> {
        *self.image.lock() = Some(image.clone());
        Ok(())
    }

    fn load_ledger(&self) -> Result<Option<LedgerImage>> {
        Ok(self.image.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ledger::{Genesis, Ledger};
    use tempfile::tempdir;

    fn busy_ledger() -> Ledger {
        let mut config = Config::default();
        config.accounts.count = 2;
        config.chain.automine = false;
        let mut ledger = Ledger::new(Genesis::from_config(&config).unwrap()).unwrap();
        let owner = ledger.dev_account(0).unwrap();
        let other = ledger.dev_account(1).unwrap();
        ledger.transfer(owner, other, 123).unwrap();
        ledger.mine();
        ledger.send_value(other, owner, 1).unwrap();
        // left pending on purpose
        ledger
    }

    #[test]
    fn test_empty_database_loads_nothing() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_ledger().unwrap().is_none());
    }

    #[test]
    fn test_database_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("ledger.db");
        let image = busy_ledger().image();

        Database::open(&path).unwrap().save_ledger(&image).unwrap();
        let loaded = Database::open(&path).unwrap().load_ledger().unwrap().unwrap();

        assert_eq!(loaded, image);
        assert_eq!(loaded.pending.len(), 1);
    }

    #[test]
    fn test_save_replaces_previous_image() {
        let db = Database::open_in_memory().unwrap();
        let image = busy_ledger().image();
        db.save_ledger(&image).unwrap();

        let mut smaller = image.clone();
        smaller.blocks.truncate(2);
        smaller.pending.clear();
        db.save_ledger(&smaller).unwrap();

        assert_eq!(db.load_ledger().unwrap().unwrap().blocks.len(), 2);
    }

    #[test]
    fn test_tampered_block_detected() {
        let db = Database::open_in_memory().unwrap();
        db.save_ledger(&busy_ledger().image()).unwrap();
        db.conn
            .lock()
            .execute("UPDATE blocks SET timestamp = timestamp + 1 WHERE number = 1", [])
            .unwrap();

        assert!(matches!(db.load_ledger(), Err(LedgerError::Database(_))));
    }

    #[test]
    fn test_in_memory_persistence() {
        let store = InMemoryPersistence::new();
        assert!(store.load_ledger().unwrap().is_none());
        let image = busy_ledger().image();
        store.save_ledger(&image).unwrap();
        assert_eq!(store.load_ledger().unwrap(), Some(image));
    }
}
