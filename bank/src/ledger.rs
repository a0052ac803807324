//! # Summary
//!
//! In-memory account storage, the resource the cluster protects. Every
//! operation takes the ledger's own lock, so concurrent readers never see a
//! half-applied update; cross-account consistency of a transfer comes from
//! the per-account critical sections taken by `teller::Teller`.

use std::collections::BTreeMap as Map;

use parking_lot::Mutex;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;

pub type AccountID = u64;

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: AccountID,
    pub name: String,
    pub balance: i64,
}

/// Journal entry for a completed transfer.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    /// Process that performed the transfer
    pub by: ricart::ProcessID,
    pub from: AccountID,
    pub to: AccountID,
    pub amount: i64,
}

#[derive(Debug, Default)]
pub struct Ledger(Mutex<Inner>);

#[derive(Debug, Default)]
struct Inner {
    accounts: Map<AccountID, Account>,
    journal: Vec<Transfer>,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger::default()
    }

    /// Opens an empty account.
    pub fn create_account<N: Into<String>>(&self, id: AccountID, name: N) -> Result<(), Error> {
        let mut inner = self.0.lock();
        if inner.accounts.contains_key(&id) {
            return Err(Error::AccountExists(id))
        }
        let account = Account { id, name: name.into(), balance: 0 };
        info!("opened account {} for {}", id, account.name);
        inner.accounts.insert(id, account);
        Ok(())
    }

    pub fn delete_account(&self, id: AccountID) -> Result<(), Error> {
        self.0.lock()
            .accounts
            .remove(&id)
            .map(|account| info!("closed account {} with balance {}", id, account.balance))
            .ok_or(Error::AccountNotFound(id))
    }

    /// Snapshot of a single account.
    pub fn get_account(&self, id: AccountID) -> Result<Account, Error> {
        self.0.lock()
            .accounts
            .get(&id)
            .cloned()
            .ok_or(Error::AccountNotFound(id))
    }

    /// Adjusts a balance, leaving it untouched if the result would not fit.
    pub fn add_to_balance(&self, id: AccountID, amount: i64) -> Result<(), Error> {
        let mut inner = self.0.lock();
        let account = inner.accounts
            .get_mut(&id)
            .ok_or(Error::AccountNotFound(id))?;
        account.balance = account.balance
            .checked_add(amount)
            .ok_or(Error::Overflow(id))?;
        Ok(())
    }

    /// Appends a completed transfer to the journal.
    pub fn record(&self, transfer: Transfer) {
        self.0.lock().journal.push(transfer);
    }

    /// Completed transfers in the order they were recorded.
    pub fn journal(&self) -> Vec<Transfer> {
        self.0.lock().journal.clone()
    }

    /// Snapshot of every account, ordered by ID.
    pub fn accounts(&self) -> Vec<Account> {
        self.0.lock().accounts.values().cloned().collect()
    }

    /// Sum of all balances, widened so it cannot overflow.
    pub fn total(&self) -> i128 {
        self.0.lock()
            .accounts
            .values()
            .map(|account| i128::from(account.balance))
            .sum()
    }
}

impl ricart::Resource for Ledger {
    type Key = AccountID;
    type Value = i64;
    type Error = Error;

    fn resource(&self, key: &AccountID) -> ricart::ResourceID {
        crate::teller::resource(*key)
    }

    fn read(&self, key: &AccountID) -> Option<i64> {
        self.get_account(*key).ok().map(|account| account.balance)
    }

    fn update(&self, key: &AccountID, delta: i64) -> Result<(), Error> {
        self.add_to_balance(*key, delta)
    }
}

#[cfg(test)]
mod tests {

    use ricart::Resource;

    use super::*;

    #[test]
    fn test_create_account() {
        let ledger = Ledger::new();
        ledger.create_account(1, "alice").unwrap();
        assert_eq!(ledger.create_account(1, "bob"), Err(Error::AccountExists(1)));
        assert_eq!(ledger.get_account(1).unwrap(), Account {
            id: 1,
            name: "alice".to_string(),
            balance: 0,
        });
    }

    #[test]
    fn test_delete_account() {
        let ledger = Ledger::new();
        ledger.create_account(1, "alice").unwrap();
        ledger.delete_account(1).unwrap();
        assert_eq!(ledger.delete_account(1), Err(Error::AccountNotFound(1)));
        assert_eq!(ledger.get_account(1), Err(Error::AccountNotFound(1)));
    }

    #[test]
    fn test_add_to_balance() {
        let ledger = Ledger::new();
        ledger.create_account(1, "alice").unwrap();
        ledger.add_to_balance(1, 50).unwrap();
        ledger.add_to_balance(1, -20).unwrap();
        assert_eq!(ledger.get_account(1).unwrap().balance, 30);
        assert_eq!(ledger.add_to_balance(2, 5), Err(Error::AccountNotFound(2)));
    }

    #[test]
    fn test_add_to_balance_overflow() {
        let ledger = Ledger::new();
        ledger.create_account(0, "alice").unwrap();
        ledger.create_account(1, "bob").unwrap();
        ledger.add_to_balance(0, i64::MAX).unwrap();
        ledger.add_to_balance(1, i64::MIN).unwrap();

        assert_eq!(ledger.add_to_balance(0, 1), Err(Error::Overflow(0)));
        assert_eq!(ledger.add_to_balance(1, -1), Err(Error::Overflow(1)));
        assert_eq!(ledger.get_account(0).unwrap().balance, i64::MAX);
        assert_eq!(ledger.get_account(1).unwrap().balance, i64::MIN);
        assert_eq!(ledger.total(), -1);

        ledger.add_to_balance(1, i64::MAX).unwrap();
        assert_eq!(ledger.total(), i128::from(i64::MAX) - 1);
    }

    #[test]
    fn test_get_account_is_a_copy() {
        let ledger = Ledger::new();
        ledger.create_account(1, "alice").unwrap();
        let mut copy = ledger.get_account(1).unwrap();
        copy.balance = 1000;
        assert_eq!(ledger.get_account(1).unwrap().balance, 0);
    }

    #[test]
    fn test_resource_contract() {
        let ledger = Ledger::new();
        ledger.create_account(7, "carol").unwrap();
        ledger.update(&7, 12).unwrap();
        assert_eq!(ledger.read(&7), Some(12));
        assert_eq!(ledger.read(&8), None);
        assert!(ledger.update(&8, 1).is_err());
        assert_eq!(ledger.total(), 12);
        assert_eq!(ledger.resource(&7), ricart::ResourceID(7));
    }
}
