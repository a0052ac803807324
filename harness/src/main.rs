#[macro_use] extern crate log;

use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;

mod command;

use crate::command::{Command, Execution, Transfer};

#[derive(StructOpt)]
#[structopt(name = "harness")]
struct Opt {
    /// Test script to execute
    #[structopt(short = "f", long = "file")]
    file: std::path::PathBuf,

    /// Logging verbosity, repeat for more
    #[structopt(short = "v", parse(from_occurrences))]
    verbose: u64,
}

/// Running cluster and the ledger it guards. The ledger outlives restarts.
struct Session {
    cluster: Option<ricart::Cluster>,
    tellers: Vec<bank::Teller<ricart::LocalNetwork>>,
    ledger: Arc<bank::Ledger>,
}

impl Session {
    fn teller(&self, node: u32) -> Result<&bank::Teller<ricart::LocalNetwork>, String> {
        self.tellers
            .get(node as usize)
            .ok_or_else(|| format!("no running process {}", node))
    }

    async fn transfer(&self, transfer: &Transfer) -> Result<(), String> {
        let teller = self.teller(transfer.node)?;
        match teller.transfer(transfer.from, transfer.to, transfer.amount).await {
        | Ok(done) => {
            println!("Process {} moved {} from {} to {}", done.by.0, done.amount, done.from, done.to);
            Ok(())
        }
        | Err(error) => Err(format!("process {}: {}", transfer.node, error)),
        }
    }

    async fn execute(&mut self, command: Command) -> Result<(), String> {
        match command {
        | Command::Start { count, timeout } => {
            let mut config = ricart::Config::new(count);
            if let Some(ms) = timeout {
                config = config.with_timeout(Duration::from_millis(ms));
            }
            // Stop the previous cluster before starting a new one
            self.tellers.clear();
            self.cluster = None;
            let cluster = config.spawn().map_err(|error| error.to_string())?;
            self.tellers = bank::tellers(&cluster, &self.ledger);
            self.cluster = Some(cluster);
        }
        | Command::Open { account, name, balance } => {
            bank::open(&self.ledger, account, &name, balance).map_err(|error| error.to_string())?;
        }
        | Command::Close { account } => {
            self.ledger.delete_account(account).map_err(|error| error.to_string())?;
        }
        | Command::Transfer(transfer) => {
            self.transfer(&transfer).await?;
        }
        | Command::Parallel { transfers } => {
            let results = futures::future::join_all(
                transfers.iter().map(|transfer| self.transfer(transfer))
            ).await;
            let failures = results
                .into_iter()
                .filter_map(Result::err)
                .collect::<Vec<_>>();
            if !failures.is_empty() {
                return Err(failures.join("; "))
            }
        }
        | Command::Balance { account } => {
            let account = self.ledger.get_account(account).map_err(|error| error.to_string())?;
            println!("Account {} ({}) holds {}", account.id, account.name, account.balance);
        }
        | Command::Journal => {
            for (index, transfer) in self.ledger.journal().iter().enumerate() {
                println!(
                    "{:>4}: process {} moved {} from {} to {}",
                    index, transfer.by.0, transfer.amount, transfer.from, transfer.to,
                );
            }
        }
        | Command::Sleep { ms } => {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        }
        Ok(())
    }
}

async fn run(opt: Opt) -> Result<usize, Box<dyn std::error::Error>> {

    // Test execution
    let file = std::fs::File::open(&opt.file)?;
    let execution: Execution = serde_json::from_reader(std::io::BufReader::new(file))?;

    let mut session = Session {
        cluster: None,
        tellers: Vec::new(),
        ledger: Arc::new(bank::Ledger::new()),
    };

    let mut failed = 0;
    for command in execution.0 {
        println!("Executing command {:?}", command);
        if let Err(error) = session.execute(command).await {
            warn!("command failed: {}", error);
            println!("Command failed: {}", error);
            failed += 1;
        }
    }
    Ok(failed)
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    if let Err(error) = bank::logger::init(opt.verbose) {
        eprintln!("could not initialize logging: {}", error);
    }

    match run(opt).await {
    | Ok(0) => (),
    | Ok(failed) => {
        eprintln!("{} command(s) failed", failed);
        std::process::exit(1);
    }
    | Err(error) => {
        eprintln!("could not run test: {}", error);
        std::process::exit(2);
    }
    }
}
