use crate::ledger::AccountID;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("account {0} already exists")]
    AccountExists(AccountID),

    #[error("account {0} doesn't exist")]
    AccountNotFound(AccountID),

    #[error("account {account} holds {balance}, cannot withdraw {amount}")]
    InsufficientFunds {
        account: AccountID,
        balance: i64,
        amount: i64,
    },

    #[error("account {0} cannot transfer to itself")]
    SameAccount(AccountID),

    #[error("balance of account {0} would overflow")]
    Overflow(AccountID),

    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error(transparent)]
    Lock(#[from] ricart::Error),
}
