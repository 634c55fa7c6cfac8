//! Account store: address -> native balance, token balance and nonce

use crate::address::{Address, AddressLike};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denomination {
    /// Native currency, in wei.
    Native,
    /// The fixed-supply token deployed at genesis.
    Token,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub native_balance: u128,
    pub token_balance: u128,
    /// Number of transactions sent from this account.
    pub nonce: u64,
}

impl Account {
    pub fn balance(&self, denomination: Denomination) -> u128 {
        match denomination {
            Denomination::Native => self.native_balance,
            Denomination::Token => self.token_balance,
        }
    }

    fn balance_mut(&mut self, denomination: Denomination) -> &mut u128 {
        match denomination {
            Denomination::Native => &mut self.native_balance,
            Denomination::Token => &mut self.token_balance,
        }
    }
}

/// Unknown addresses read as empty accounts; entries are created on first write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStore {
    accounts: BTreeMap<Address, Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_balance(&self, address: impl AddressLike, denomination: Denomination) -> Result<u128> {
        let address = address.to_address()?;
        Ok(self.balance_of(&address, denomination))
    }

    pub fn set_balance(
        &mut self,
        address: impl AddressLike,
        denomination: Denomination,
        amount: u128,
    ) -> Result<()> {
        let address = address.to_address()?;
        *self.accounts.entry(address).or_default().balance_mut(denomination) = amount;
        Ok(())
    }

    pub fn balance_of(&self, address: &Address, denomination: Denomination) -> u128 {
        self.accounts
            .get(address)
            .map_or(0, |account| account.balance(denomination))
    }

    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map_or(0, |account| account.nonce)
    }

    /// Bumps the nonce and returns the value it had before.
    pub(crate) fn increment_nonce(&mut self, address: &Address) -> u64 {
        let account = self.accounts.entry(*address).or_default();
        let previous = account.nonce;
        account.nonce = account.nonce.saturating_add(1);
        previous
    }

    pub(crate) fn credit(
        &mut self,
        address: &Address,
        denomination: Denomination,
        amount: u128,
    ) -> Result<u128> {
        let balance = self.accounts.entry(*address).or_default().balance_mut(denomination);
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow(*address))?;
        Ok(*balance)
    }

    pub(crate) fn debit(
        &mut self,
        address: &Address,
        denomination: Denomination,
        amount: u128,
    ) -> Result<u128> {
        let available = self.balance_of(address, denomination);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                address: *address,
                available,
                required: amount,
            });
        }
        let balance = self.accounts.entry(*address).or_default().balance_mut(denomination);
        *balance = available - amount;
        Ok(*balance)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Address, &Account)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Sum of every token balance in the store.
    pub fn token_supply(&self) -> u128 {
        self.accounts
            .values()
            .fold(0u128, |acc, account| acc.saturating_add(account.token_balance))
    }
}

impl FromIterator<(Address, Account)> for AccountStore {
    fn from_iter<I: IntoIterator<Item = (Address, Account)>>(iter: I) -> Self {
        AccountStore {
            accounts: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_unknown_address_reads_zero() {
        let store = AccountStore::new();
        assert_eq!(store.get_balance(ALICE, Denomination::Native).unwrap(), 0);
        assert_eq!(store.get_balance(ALICE, Denomination::Token).unwrap(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_set_and_get_balance_per_denomination() {
        let mut store = AccountStore::new();
        store.set_balance(ALICE, Denomination::Native, 7).unwrap();
        store.set_balance(ALICE, Denomination::Token, 11).unwrap();
        assert_eq!(store.get_balance(ALICE, Denomination::Native).unwrap(), 7);
        assert_eq!(store.get_balance(ALICE, Denomination::Token).unwrap(), 11);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_malformed_address_rejected() {
        let mut store = AccountStore::new();
        assert!(matches!(
            store.get_balance("0x1234", Denomination::Token),
            Err(LedgerError::InvalidAddress(_))
        ));
        assert!(matches!(
            store.set_balance("alice", Denomination::Token, 1),
            Err(LedgerError::InvalidAddress(_))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_debit_insufficient_leaves_balance() {
        let mut store = AccountStore::new();
        let alice: Address = ALICE.parse().unwrap();
        store.set_balance(alice, Denomination::Token, 5).unwrap();

        let err = store.debit(&alice, Denomination::Token, 6).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                address: alice,
                available: 5,
                required: 6
            }
        );
        assert_eq!(store.balance_of(&alice, Denomination::Token), 5);
        assert_eq!(store.debit(&alice, Denomination::Token, 5).unwrap(), 0);
    }

    #[test]
    fn test_credit_overflow() {
        let mut store = AccountStore::new();
        let alice: Address = ALICE.parse().unwrap();
        store.set_balance(alice, Denomination::Native, u128::MAX).unwrap();
        assert_eq!(
            store.credit(&alice, Denomination::Native, 1),
            Err(LedgerError::BalanceOverflow(alice))
        );
        assert_eq!(store.balance_of(&alice, Denomination::Native), u128::MAX);
    }

    #[test]
    fn test_nonce_and_supply() {
        let mut store = AccountStore::new();
        let alice: Address = ALICE.parse().unwrap();
        assert_eq!(store.increment_nonce(&alice), 0);
        assert_eq!(store.increment_nonce(&alice), 1);
        assert_eq!(store.nonce(&alice), 2);

        store.set_balance(alice, Denomination::Token, 40).unwrap();
        store.set_balance(Address::new([9u8; 20]), Denomination::Token, 2).unwrap();
        assert_eq!(store.token_supply(), 42);
    }
}
