//! # Summary
//!
//! A bank ledger shared by a cluster of processes, with every account update
//! serialized through `ricart` mutual exclusion.

#[macro_use] extern crate log;

mod error;
mod ledger;
mod teller;

pub mod logger;

pub use crate::error::Error;
pub use crate::ledger::{Account, AccountID, Ledger, Transfer};
pub use crate::teller::{resource, Teller};

use std::sync::Arc;

/// One teller per process of `cluster`, all sharing `ledger`.
pub fn tellers(cluster: &ricart::Cluster, ledger: &Arc<Ledger>) -> Vec<Teller<ricart::LocalNetwork>> {
    cluster
        .nodes()
        .iter()
        .cloned()
        .map(|node| Teller::new(node, ledger.clone()))
        .collect()
}

/// Opens `id` for `name` and funds it with `balance`.
pub fn open(ledger: &Ledger, id: AccountID, name: &str, balance: i64) -> Result<(), Error> {
    ledger.create_account(id, name)?;
    if balance != 0 {
        ledger.add_to_balance(id, balance)?;
    }
    Ok(())
}
