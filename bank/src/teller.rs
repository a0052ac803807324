//! # Summary
//!
//! Transfers between accounts, run from one process.
//!
//! Every account is its own mutual exclusion resource. A transfer locks both
//! accounts in ascending ID order, so two tellers can never hold one account
//! each while waiting for the other's. Transfers between disjoint pairs of
//! accounts proceed in parallel.
//!
//! A process holds at most one request per resource, so tasks of the same
//! teller first queue on a local per-account mutex, taken in the same
//! ascending order, and only then enter the protocol.

use std::collections::BTreeMap as Map;
use std::sync::Arc;

use ricart::{Channel, Coordinator, ResourceID};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::Error;
use crate::ledger::{AccountID, Ledger, Transfer};

/// Maps an account onto the resource guarding it.
pub fn resource(account: AccountID) -> ResourceID {
    ResourceID(account)
}

#[derive(Debug)]
pub struct Teller<C: Channel> {
    coordinator: Coordinator<C>,
    ledger: Arc<Ledger>,

    /// Local waiting line for each account this teller has touched
    queues: parking_lot::Mutex<Map<AccountID, Arc<Mutex<()>>>>,
}

impl<C: Channel> Teller<C> {
    pub fn new(coordinator: Coordinator<C>, ledger: Arc<Ledger>) -> Self {
        Teller { coordinator, ledger, queues: Default::default() }
    }

    pub fn id(&self) -> ricart::ProcessID {
        self.coordinator.id()
    }

    /// Current balance, read without entering the critical section.
    pub fn balance(&self, account: AccountID) -> Result<i64, Error> {
        self.ledger.get_account(account).map(|account| account.balance)
    }

    /// Adds `amount` to `account` inside its critical section.
    pub async fn deposit(&self, account: AccountID, amount: i64) -> Result<(), Error> {
        if amount <= 0 {
            return Err(Error::InvalidAmount(amount))
        }
        self.ledger.get_account(account)?;
        let _turn = self.queue(account).await;
        let guard = self.coordinator.lock(resource(account)).await?;
        guard.update(&*self.ledger, &account, amount)?;
        info!("{} deposited {} into {}", self.id(), amount, account);
        Ok(())
    }

    /// Moves `amount` from `from` to `to`.
    ///
    /// Funds are checked before entering the protocol, so a transfer that
    /// cannot succeed never disturbs the other processes. The check is
    /// repeated inside the critical section, since another process may have
    /// drained the account in between.
    pub async fn transfer(&self, from: AccountID, to: AccountID, amount: i64) -> Result<Transfer, Error> {
        if from == to {
            return Err(Error::SameAccount(from))
        }
        if amount <= 0 {
            return Err(Error::InvalidAmount(amount))
        }
        self.ledger.get_account(to)?;
        Self::check_funds(from, self.balance(from)?, amount)?;

        let _low_turn = self.queue(from.min(to)).await;
        let _high_turn = self.queue(from.max(to)).await;
        let low = self.coordinator.lock(resource(from.min(to))).await?;
        let high = self.coordinator.lock(resource(from.max(to))).await?;
        let (source, target) = if from < to { (&low, &high) } else { (&high, &low) };

        let balance = source
            .read(&*self.ledger, &from)?
            .ok_or(Error::AccountNotFound(from))?;
        Self::check_funds(from, balance, amount)?;

        // Refuse before debiting, so a failed credit never loses money
        target
            .read(&*self.ledger, &to)?
            .ok_or(Error::AccountNotFound(to))?
            .checked_add(amount)
            .ok_or(Error::Overflow(to))?;

        source.update(&*self.ledger, &from, -amount)?;
        target.update(&*self.ledger, &to, amount)?;

        let transfer = Transfer { by: self.id(), from, to, amount };
        info!("{} moved {} from {} to {}", self.id(), amount, from, to);
        self.ledger.record(transfer.clone());
        Ok(transfer)
    }

    /// Waits for this teller's earlier tasks on `account` to finish.
    async fn queue(&self, account: AccountID) -> OwnedMutexGuard<()> {
        let queue = self.queues
            .lock()
            .entry(account)
            .or_default()
            .clone();
        queue.lock_owned().await
    }

    fn check_funds(account: AccountID, balance: i64, amount: i64) -> Result<(), Error> {
        if balance < amount {
            debug!("account {} holds {}, declining {}", account, balance, amount);
            return Err(Error::InsufficientFunds { account, balance, amount })
        }
        Ok(())
    }
}
