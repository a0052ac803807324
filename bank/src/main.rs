#[macro_use] extern crate log;

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "bank")]
struct Opt {
    /// Total number of processes
    #[structopt(short = "c", long = "count", default_value = "3")]
    count: u32,

    /// Number of accounts to open
    #[structopt(short = "a", long = "accounts", default_value = "4")]
    accounts: u64,

    /// Opening balance of every account
    #[structopt(short = "b", long = "balance", default_value = "100")]
    balance: i64,

    /// Transfers attempted by each process
    #[structopt(short = "r", long = "rounds", default_value = "10")]
    rounds: usize,

    /// Give up waiting for the critical section after this long (in milliseconds)
    #[structopt(short = "t", long = "timeout")]
    timeout: Option<u64>,

    /// Seed for the transfer workload
    #[structopt(short = "s", long = "seed")]
    seed: Option<u64>,

    /// Logging verbosity, repeat for more
    #[structopt(short = "v", parse(from_occurrences))]
    verbose: u64,
}

async fn run(opt: Opt) -> Result<bool, bank::Error> {
    let mut config = ricart::Config::new(opt.count);
    if let Some(ms) = opt.timeout {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    let cluster = config.spawn()?;

    let ledger = Arc::new(bank::Ledger::new());
    for id in 0..opt.accounts {
        bank::open(&ledger, id, &format!("account-{}", id), opt.balance)?;
    }

    let seed = opt.seed.unwrap_or_else(rand::random);
    println!("Running {} processes over {} accounts with seed {}", opt.count, opt.accounts, seed);

    let workers = bank::tellers(&cluster, &ledger)
        .into_iter()
        .map(|teller| {
            let rounds = opt.rounds;
            let accounts = opt.accounts;
            let ceiling = std::cmp::max(opt.balance / 2, 1);
            let mut rng = StdRng::seed_from_u64(seed ^ u64::from(teller.id().0));
            tokio::spawn(async move {
                for _ in 0..rounds {
                    let from = rng.gen_range(0..accounts);
                    let to = (from + rng.gen_range(1..accounts)) % accounts;
                    let amount = rng.gen_range(1..=ceiling);
                    tokio::time::sleep(Duration::from_millis(rng.gen_range(0..20))).await;
                    match teller.transfer(from, to, amount).await {
                    | Ok(_) => (),
                    | Err(error @ bank::Error::InsufficientFunds { .. }) => info!("{} declined: {}", teller.id(), error),
                    | Err(error) => warn!("{} failed: {}", teller.id(), error),
                    }
                }
            })
        })
        .collect::<Vec<_>>();

    for result in futures::future::join_all(workers).await {
        if let Err(error) = result {
            error!("worker panicked: {}", error);
        }
    }

    println!("Completed {} transfers", ledger.journal().len());
    for account in ledger.accounts() {
        println!("{:>4} {:<12} {:>8}", account.id, account.name, account.balance);
    }

    let expected = i128::from(opt.balance) * i128::from(opt.accounts);
    let total = ledger.total();
    println!("Total {} (expected {})", total, expected);
    Ok(total == expected)
}

#[tokio::main]
async fn main() {
    let opt = Opt::from_args();

    if let Err(error) = bank::logger::init(opt.verbose) {
        eprintln!("could not initialize logging: {}", error);
    }

    if opt.accounts < 2 {
        eprintln!("at least two accounts are needed for transfers");
        std::process::exit(2);
    }

    match run(opt).await {
    | Ok(true) => (),
    | Ok(false) => std::process::exit(1),
    | Err(error) => {
        error!("{}", error);
        std::process::exit(1);
    }
    }
}
