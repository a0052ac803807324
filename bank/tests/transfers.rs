use std::sync::Arc;
use std::time::Duration;

use bank::{Error, Ledger, Transfer};
use ricart::sim::Simulation;
use ricart::{ProcessID, Resource, ResourceID};

fn funded(accounts: u64, balance: i64) -> Arc<Ledger> {
    let ledger = Arc::new(Ledger::new());
    for id in 0..accounts {
        bank::open(&ledger, id, &format!("account-{}", id), balance).unwrap();
    }
    ledger
}

#[test]
fn test_tied_requests_transfer_in_id_order() {
    const LEDGER: ResourceID = ResourceID(0);
    let ledger = funded(3, 100);
    let sim = Simulation::new(3);

    for node in sim.nodes() {
        for _ in 0..4 { node.tick(); }
        assert_eq!(node.request_access(LEDGER).unwrap(), 5);
    }
    sim.run();

    let mut waiting = vec![0u32, 1, 2];
    while !waiting.is_empty() {
        let admitted = waiting
            .iter()
            .copied()
            .filter(|id| sim.node(*id).try_grant(LEDGER).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(admitted.len(), 1);
        let id = admitted[0];
        waiting.retain(|waiting| *waiting != id);

        // Each process pays the next one
        let from = u64::from(id);
        let to = (from + 1) % 3;
        ledger.update(&from, -10).unwrap();
        ledger.update(&to, 10).unwrap();
        ledger.record(Transfer { by: ProcessID(id), from, to, amount: 10 });

        sim.node(id).release_access(LEDGER).unwrap();
        sim.run();
    }

    let order = ledger.journal().into_iter().map(|transfer| transfer.by).collect::<Vec<_>>();
    assert_eq!(order, vec![ProcessID(0), ProcessID(1), ProcessID(2)]);
    assert_eq!(ledger.total(), 300);
}

#[tokio::test]
async fn test_transfer_moves_funds() {
    let cluster = ricart::Config::new(2).spawn().unwrap();
    let ledger = funded(2, 100);
    let tellers = bank::tellers(&cluster, &ledger);

    let transfer = tellers[1].transfer(0, 1, 40).await.unwrap();
    assert_eq!(transfer, Transfer { by: ProcessID(1), from: 0, to: 1, amount: 40 });
    assert_eq!(tellers[0].balance(0).unwrap(), 60);
    assert_eq!(tellers[0].balance(1).unwrap(), 140);
    assert_eq!(ledger.journal(), vec![transfer]);
}

#[tokio::test]
async fn test_insufficient_funds_fails_before_requesting() {
    let cluster = ricart::Config::new(3).spawn().unwrap();
    let ledger = funded(2, 10);
    let tellers = bank::tellers(&cluster, &ledger);

    let result = tellers[0].transfer(0, 1, 11).await;
    assert_eq!(result, Err(Error::InsufficientFunds { account: 0, balance: 10, amount: 11 }));

    // No request was ever issued
    for node in cluster.nodes() {
        assert_eq!(node.clock(), 0);
    }
    assert!(ledger.journal().is_empty());
}

#[tokio::test]
async fn test_rejected_transfers() {
    let cluster = ricart::Config::new(1).spawn().unwrap();
    let ledger = funded(2, 10);
    let teller = bank::tellers(&cluster, &ledger).remove(0);

    assert_eq!(teller.transfer(1, 1, 5).await, Err(Error::SameAccount(1)));
    assert_eq!(teller.transfer(0, 1, 0).await, Err(Error::InvalidAmount(0)));
    assert_eq!(teller.transfer(0, 9, 5).await, Err(Error::AccountNotFound(9)));
    assert_eq!(teller.transfer(9, 0, 5).await, Err(Error::AccountNotFound(9)));
    assert_eq!(teller.deposit(9, 5).await, Err(Error::AccountNotFound(9)));
}

#[tokio::test]
async fn test_deposit() {
    let cluster = ricart::Config::new(2).spawn().unwrap();
    let ledger = funded(1, 0);
    let teller = bank::tellers(&cluster, &ledger).remove(1);
    teller.deposit(0, 25).await.unwrap();
    assert_eq!(teller.balance(0).unwrap(), 25);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposing_transfers_do_not_deadlock() {
    let cluster = ricart::Config::new(2).spawn().unwrap();
    let ledger = funded(2, 1_000);
    let mut tellers = bank::tellers(&cluster, &ledger);
    let second = tellers.remove(1);
    let first = tellers.remove(0);

    let forward = tokio::spawn(async move {
        for _ in 0..25 {
            first.transfer(0, 1, 3).await.unwrap();
        }
    });
    let backward = tokio::spawn(async move {
        for _ in 0..25 {
            second.transfer(1, 0, 5).await.unwrap();
        }
    });

    let both = futures::future::join(forward, backward);
    let (forward, backward) = tokio::time::timeout(Duration::from_secs(10), both)
        .await
        .expect("transfers deadlocked");
    forward.unwrap();
    backward.unwrap();

    assert_eq!(ledger.get_account(0).unwrap().balance, 1_000 - 75 + 125);
    assert_eq!(ledger.get_account(1).unwrap().balance, 1_000 + 75 - 125);
    assert_eq!(ledger.journal().len(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_conserve_money() {
    let cluster = ricart::Config::new(4).spawn().unwrap();
    let ledger = funded(3, 50);

    let workers = bank::tellers(&cluster, &ledger)
        .into_iter()
        .enumerate()
        .map(|(index, teller)| {
            tokio::spawn(async move {
                for round in 0..15u64 {
                    let from = (index as u64 + round) % 3;
                    let to = (from + 1) % 3;
                    match teller.transfer(from, to, 7).await {
                    | Ok(_) | Err(Error::InsufficientFunds { .. }) => (),
                    | Err(error) => panic!("unexpected {}", error),
                    }
                }
            })
        })
        .collect::<Vec<_>>();

    for result in futures::future::join_all(workers).await {
        result.unwrap();
    }

    assert_eq!(ledger.total(), 150);
    assert!(ledger.accounts().iter().all(|account| account.balance >= 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_teller_transfers_wait_in_line() {
    let cluster = ricart::Config::new(2).spawn().unwrap();
    let ledger = funded(3, 100);
    let teller = Arc::new(bank::tellers(&cluster, &ledger).remove(0));

    // Another process holds account 0, so both transfers must wait
    let held = cluster.node(ProcessID(1)).unwrap().lock(bank::resource(0)).await.unwrap();

    let first = {
        let teller = teller.clone();
        tokio::spawn(async move { teller.transfer(0, 1, 30).await })
    };
    let second = {
        let teller = teller.clone();
        tokio::spawn(async move { teller.transfer(0, 2, 20).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!first.is_finished());
    assert!(!second.is_finished());
    drop(held);

    let both = futures::future::join(first, second);
    let (first, second) = tokio::time::timeout(Duration::from_secs(10), both)
        .await
        .expect("transfers never completed");
    assert_eq!(first.unwrap(), Ok(Transfer { by: ProcessID(0), from: 0, to: 1, amount: 30 }));
    assert_eq!(second.unwrap(), Ok(Transfer { by: ProcessID(0), from: 0, to: 2, amount: 20 }));

    assert_eq!(ledger.get_account(0).unwrap().balance, 50);
    assert_eq!(ledger.get_account(1).unwrap().balance, 130);
    assert_eq!(ledger.get_account(2).unwrap().balance, 120);
    assert_eq!(ledger.journal().len(), 2);
}

#[tokio::test]
async fn test_overflowing_credit_leaves_source_untouched() {
    let cluster = ricart::Config::new(2).spawn().unwrap();
    let ledger = Arc::new(Ledger::new());
    bank::open(&ledger, 0, "alice", 10).unwrap();
    bank::open(&ledger, 1, "bob", i64::MAX).unwrap();
    let teller = bank::tellers(&cluster, &ledger).remove(0);

    assert_eq!(teller.transfer(0, 1, 5).await, Err(Error::Overflow(1)));
    assert_eq!(teller.deposit(1, 1).await, Err(Error::Overflow(1)));
    assert_eq!(ledger.get_account(0).unwrap().balance, 10);
    assert_eq!(ledger.get_account(1).unwrap().balance, i64::MAX);
    assert!(ledger.journal().is_empty());
}
