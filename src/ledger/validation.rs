use crate::accounts::{AccountStore, Denomination};
use crate::address::Address;
use crate::error::{LedgerError, Result};

/// Checks a transfer against the current store without touching it.
/// Returns the post-transfer balances of sender and recipient.
pub fn validate_transfer(
    accounts: &AccountStore,
    denomination: Denomination,
    from: &Address,
    to: &Address,
    amount: u128,
) -> Result<(u128, u128)> {
    if amount == 0 {
        return Err(LedgerError::ZeroAmount);
    }

    let available = accounts.balance_of(from, denomination);
    if available < amount {
        return Err(LedgerError::InsufficientBalance {
            address: *from,
            available,
            required: amount,
        });
    }

    if from == to {
        return Ok((available, available));
    }

    let recipient = accounts
        .balance_of(to, denomination)
        .checked_add(amount)
        .ok_or(LedgerError::BalanceOverflow(*to))?;
    Ok((available - amount, recipient))
}

/// Largest block timestamp the clock can represent as a signed offset.
pub const MAX_TIMESTAMP: u64 = i64::MAX as u64;

/// A forced block timestamp must move strictly past the latest block and stay
/// within `MAX_TIMESTAMP`.
pub fn validate_next_timestamp(latest: u64, requested: u64) -> Result<()> {
    if requested > MAX_TIMESTAMP {
        return Err(LedgerError::InvalidTimestamp(format!(
            "Timestamp {} exceeds the maximum {}",
            requested, MAX_TIMESTAMP
        )));
    }
    if requested <= latest {
        return Err(LedgerError::InvalidTimestamp(format!(
            "Timestamp {} is not greater than the latest block timestamp {}",
            requested, latest
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (AccountStore, Address, Address) {
        let mut store = AccountStore::new();
        let alice = Address::new([1; 20]);
        let bob = Address::new([2; 20]);
        store.set_balance(alice, Denomination::Token, 100).unwrap();
        (store, alice, bob)
    }

    #[test]
    fn test_valid_transfer_balances() {
        let (store, alice, bob) = setup();
        assert_eq!(
            validate_transfer(&store, Denomination::Token, &alice, &bob, 30).unwrap(),
            (70, 30)
        );
        assert_eq!(
            validate_transfer(&store, Denomination::Token, &alice, &alice, 30).unwrap(),
            (100, 100)
        );
    }

    #[test]
    fn test_zero_amount_rejected() {
        let (store, alice, bob) = setup();
        assert_eq!(
            validate_transfer(&store, Denomination::Token, &alice, &bob, 0),
            Err(LedgerError::ZeroAmount)
        );
    }

    #[test]
    fn test_insufficient_balance() {
        let (store, alice, bob) = setup();
        assert!(matches!(
            validate_transfer(&store, Denomination::Token, &alice, &bob, 101),
            Err(LedgerError::InsufficientBalance { available: 100, required: 101, .. })
        ));
        assert!(matches!(
            validate_transfer(&store, Denomination::Native, &alice, &bob, 1),
            Err(LedgerError::InsufficientBalance { available: 0, .. })
        ));
    }

    #[test]
    fn test_recipient_overflow() {
        let (mut store, alice, bob) = setup();
        store.set_balance(bob, Denomination::Token, u128::MAX).unwrap();
        assert_eq!(
            validate_transfer(&store, Denomination::Token, &alice, &bob, 1),
            Err(LedgerError::BalanceOverflow(bob))
        );
    }

    #[test]
    fn test_next_timestamp() {
        assert!(validate_next_timestamp(10, 11).is_ok());
        assert!(matches!(
            validate_next_timestamp(10, 10),
            Err(LedgerError::InvalidTimestamp(_))
        ));
        assert!(validate_next_timestamp(10, MAX_TIMESTAMP).is_ok());
        assert!(matches!(
            validate_next_timestamp(10, MAX_TIMESTAMP + 1),
            Err(LedgerError::InvalidTimestamp(_))
        ));
    }
}
