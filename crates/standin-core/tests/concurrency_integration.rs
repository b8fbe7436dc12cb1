//! Concurrency Integration Tests
//!
//! Races on the storage slot:
//! - Two movers racing from the same believed storage
//! - Many movers racing in rounds
//! - Calls running while storage flips between local and forwarding
//!
//! # Running Tests
//! ```bash
//! cargo test --test concurrency_integration
//! ```

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use common::{authority, code, init_tracing, Account};
use standin_core::{IndirectStandin, LocalTarget, LoopbackHost, Migrator, Standin, StandinStorage};
use standin_sdk::{StandinError, Value};

// ===== Compare-and-Swap Races =====

#[test]
fn test_two_movers_exactly_one_wins() {
    init_tracing();
    let auth = authority().mint();
    let standin = IndirectStandin::wrap(Account::new("race", 0));
    let initial = standin.storage();

    let candidates: Vec<StandinStorage> = (0..2)
        .map(|i| {
            StandinStorage::forwarding(Arc::new(LocalTarget::new(Account::new("race", i))))
        })
        .collect();
    let barrier = Barrier::new(2);

    let outcomes: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = candidates
            .iter()
            .map(|candidate| {
                let (standin, initial, barrier, auth) = (&standin, &initial, &barrier, &auth);
                s.spawn(move || {
                    barrier.wait();
                    standin.safe_set_storage(candidate.clone(), initial, auth)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners: Vec<usize> = outcomes
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_ok())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(winners.len(), 1);

    let loser = 1 - winners[0];
    let err = outcomes[loser].as_ref().unwrap_err();
    assert!(matches!(err, StandinError::ConcurrentModification { .. }));
    assert!(err.is_retryable());

    assert_eq!(standin.storage(), candidates[winners[0]]);
}

#[test]
fn test_many_movers_in_rounds() {
    init_tracing();
    const THREADS: usize = 8;
    const ROUNDS: usize = 50;

    let auth = authority().mint();
    let standin = IndirectStandin::wrap(Account::new("rounds", 0));

    for _ in 0..ROUNDS {
        let believed = standin.storage();
        let barrier = Barrier::new(THREADS);
        let wins = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    let next = StandinStorage::trivial();
                    barrier.wait();
                    if standin.safe_set_storage(next, &believed, &auth).is_ok() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(wins.load(Ordering::SeqCst), 1);
        assert_ne!(standin.storage(), believed);
    }
}

#[test]
fn test_racing_migrations_leave_one_reservation() {
    init_tracing();
    let auth = authority().mint();
    let host = LoopbackHost::<Account>::new(auth.clone());
    let migrator = Migrator::default();
    let standin = IndirectStandin::wrap(Account::new("move", 12));
    let barrier = Barrier::new(4);

    let successes: usize = thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    migrator.migrate_out(&standin, &host, &auth).is_ok() as usize
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(successes, 1);
    assert_eq!(host.len(), 1);
    assert_eq!(standin.call_as::<i64>(code("getBalance"), &[]).unwrap(), 12);
}

// ===== Calls During Storage Changes =====

#[test]
fn test_calls_survive_storage_flips() {
    init_tracing();
    let auth = authority().mint();
    let remote = Arc::new(LocalTarget::new(Account::new("flip", 0)));
    let standin = IndirectStandin::wrap(Account::new("flip", 0));

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                let storage = if i % 2 == 0 {
                    StandinStorage::forwarding(remote.clone())
                } else {
                    StandinStorage::trivial()
                };
                standin.set_storage(storage, &auth).unwrap();
            }
        });

        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..200 {
                    standin.call(code("deposit"), &[Value::I64(1)]).unwrap();
                }
            });
        }
    });

    let local = standin.local_referent(&auth).unwrap().balance();
    assert_eq!(local + remote.referent().balance(), 800);
}
