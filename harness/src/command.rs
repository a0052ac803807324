use serde_derive::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug)]
pub struct Execution(pub Vec<Command>);

#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub node: u32,
    pub from: u64,
    pub to: u64,
    pub amount: i64,
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Start a cluster with the given parameters, replacing any running one
    Start {
        count: u32,
        #[serde(default)]
        timeout: Option<u64>,
    },

    /// Open an account with an opening balance
    Open {
        account: u64,
        name: String,
        #[serde(default)]
        balance: i64,
    },

    /// Close an account
    Close {
        account: u64,
    },

    /// Run a single transfer from the given process and wait for it
    Transfer(Transfer),

    /// Run several transfers at once and wait for all of them
    Parallel {
        transfers: Vec<Transfer>,
    },

    /// Print the balance of an account
    Balance {
        account: u64,
    },

    /// Print every completed transfer
    Journal,

    /// Sleep the test harness for `ms` milliseconds
    Sleep {
        ms: u64,
    },
}
