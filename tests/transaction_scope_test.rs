//! Integration tests for transaction demarcation
//!
//! Runs guarded work against a recording provider and checks what reached the
//! provider: how many sessions were opened, and which transactions committed
//! or rolled back.

mod common;

use common::{Event, RecordingProvider, SuppressingError, UNIT};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Barrier};
use std::thread;
use txscope::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Entity)]
#[entity(name = "transfers")]
pub struct Transfer {
    pub id: u64,
    pub amount: i64,
}

fn transfer(id: u64) -> Transfer {
    Transfer { id, amount: 10 }
}

fn unit() -> PersistenceUnit<RecordingProvider> {
    PersistenceUnit::new(RecordingProvider::new(), Some(UNIT.to_string()))
}

fn nest(unit: &PersistenceUnit<RecordingProvider>, depth: usize) -> Result<usize, TransactionError> {
    unit.transactional(|| {
        unit.persist(&transfer(depth as u64))?;
        if depth == 0 {
            Ok(unit.transaction_depth())
        } else {
            nest(unit, depth - 1)
        }
    })
}

#[test]
fn test_nested_calls_share_one_boundary() {
    for depth in [0, 1, 4] {
        let unit = unit();
        let journal = unit.provider().journal.clone();

        let innermost_depth = nest(&unit, depth).unwrap();

        assert_eq!(innermost_depth, 1);
        assert_eq!(journal.sessions(), 1);
        assert_eq!(journal.commits(), 1);
        assert_eq!(journal.rollbacks(), 0);
        assert_eq!(journal.count(|e| matches!(e, Event::Call(_, "persist"))), depth + 1);
    }
}

#[test]
fn test_threads_get_distinct_sessions() {
    let unit = Arc::new(unit());
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let unit = unit.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                unit.transactional(|| {
                    let session = unit.with_session(|session| session.id)?;
                    barrier.wait();
                    assert_eq!(unit.transaction_depth(), 1);
                    barrier.wait();
                    Ok::<_, TransactionError>(session)
                })
                .unwrap()
            })
        })
        .collect();

    let mut sessions: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    sessions.sort();
    sessions.dedup();

    assert_eq!(sessions.len(), 2);
    assert!(!unit.is_within_transaction());
    assert_eq!(unit.provider().journal.commits(), 2);
    assert_eq!(unit.provider().journal.factories(), 1);
}

#[test]
fn test_success_commits_once() {
    let unit = unit();
    let journal = unit.provider().journal.clone();

    let value = unit
        .transactional(|| {
            unit.persist(&transfer(1))?;
            Ok::<_, TransactionError>(42)
        })
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(journal.commits(), 1);
    assert_eq!(journal.rollbacks(), 0);
}

#[test]
fn test_failure_rolls_back_and_propagates_cause() {
    let unit = unit();
    let journal = unit.provider().journal.clone();

    let result: Result<(), SuppressingError> = unit.transactional(|| {
        unit.persist(&transfer(1))?;
        Err(SuppressingError::new("limit exceeded"))
    });

    let error = result.unwrap_err();
    assert_eq!(error.message, "limit exceeded");
    assert!(error.suppressed.is_empty());
    assert_eq!(journal.commits(), 0);
    assert_eq!(journal.rollbacks(), 1);
}

#[test]
fn test_rollback_failure_is_suppressed_on_cause() {
    let unit = unit();
    let journal = unit.provider().journal.clone();
    journal.faults.rollback.store(true, Ordering::SeqCst);

    let error = unit
        .transactional(|| -> Result<(), SuppressingError> {
            Err(SuppressingError::new("limit exceeded"))
        })
        .unwrap_err();

    assert_eq!(error.message, "limit exceeded");
    assert_eq!(error.suppressed.len(), 1);
    assert!(matches!(error.suppressed[0], ProviderError::Backend(_)));
    assert_eq!(journal.rollbacks(), 1);
    assert!(!unit.is_within_transaction());
}

#[test]
fn test_rollback_failure_on_transaction_error() {
    let unit = unit();
    unit.provider()
        .journal
        .faults
        .rollback
        .store(true, Ordering::SeqCst);

    let error = unit
        .transactional(|| -> Result<(), TransactionError> {
            Err(ProviderError::query("bad filter").into())
        })
        .unwrap_err();

    assert!(matches!(
        error.cause(),
        TransactionError::Provider(ProviderError::Query(_))
    ));
    assert_eq!(error.suppressed().len(), 1);
    assert_eq!(error.to_string(), "Persistence provider error: Query error: bad filter");
}

#[test]
fn test_commit_failure_is_returned() {
    let unit = unit();
    let journal = unit.provider().journal.clone();
    journal.faults.commit.store(true, Ordering::SeqCst);

    let result = unit.transactional(|| Ok::<_, TransactionError>(()));

    assert!(matches!(
        result,
        Err(TransactionError::Provider(ProviderError::Backend(_)))
    ));
    assert_eq!(journal.rollbacks(), 0);
    assert_eq!(journal.closed_sessions(), 1);
    assert!(!unit.is_within_transaction());
}

#[test]
fn test_access_outside_transaction_makes_no_provider_call() {
    let unit = unit();
    let journal = unit.provider().journal.clone();

    assert!(matches!(
        unit.persist(&transfer(1)),
        Err(TransactionError::OutsideTransaction)
    ));
    assert!(matches!(
        unit.find::<Transfer>(&1),
        Err(TransactionError::OutsideTransaction)
    ));
    assert!(matches!(
        unit.create_query("from transfers"),
        Err(TransactionError::OutsideTransaction)
    ));
    assert!(matches!(unit.is_open(), Err(TransactionError::OutsideTransaction)));
    assert_eq!(
        TransactionError::OutsideTransaction.to_string(),
        "Cannot access persistence unit from non-transactional scope"
    );

    assert!(journal.events().is_empty());
}

#[test]
fn test_stack_depth_restored_on_every_outcome() {
    let unit = unit();
    let journal = unit.provider().journal.clone();

    let _ = unit.transactional(|| Ok::<_, TransactionError>(()));
    assert_eq!(unit.transaction_depth(), 0);

    let _ = unit.transactional(|| Err::<(), _>(TransactionError::OutsideTransaction));
    assert_eq!(unit.transaction_depth(), 0);

    journal.faults.commit.store(true, Ordering::SeqCst);
    let _ = unit.transactional(|| Ok::<_, TransactionError>(()));
    assert_eq!(unit.transaction_depth(), 0);

    journal.faults.rollback.store(true, Ordering::SeqCst);
    let _ = unit.transactional(|| Err::<(), _>(TransactionError::OutsideTransaction));
    assert_eq!(unit.transaction_depth(), 0);

    assert_eq!(journal.sessions(), 4);
    assert_eq!(journal.closed_sessions(), 4);
}

#[test]
fn test_scope_commit_and_error_paths() {
    let unit = unit();
    let journal = unit.provider().journal.clone();

    let scope = unit.begin::<TransactionError>().unwrap();
    assert_eq!(unit.transaction_depth(), 1);
    scope.close().unwrap();
    assert_eq!(
        journal.events(),
        vec![
            Event::FactoryCreated,
            Event::SessionOpened(1),
            Event::Begin(1),
            Event::Commit(1),
            Event::SessionClosed(1),
        ]
    );

    let mut scope = unit.begin::<TransactionError>().unwrap();
    scope.init_cause(TransactionError::OutsideTransaction);
    assert!(matches!(
        scope.close(),
        Err(TransactionError::OutsideTransaction)
    ));
    assert_eq!(
        journal.events()[5..],
        [
            Event::SessionOpened(2),
            Event::Begin(2),
            Event::Rollback(2),
            Event::SessionClosed(2),
        ]
    );
    assert_eq!(journal.commits(), 1);
    assert!(!unit.is_within_transaction());
}

#[test]
fn test_inner_error_handled_by_outer_still_commits() {
    let unit = unit();
    let journal = unit.provider().journal.clone();

    unit.transactional(|| {
        let inner = unit.transactional(|| Err::<(), _>(SuppressingError::new("inner")));
        assert_eq!(inner.unwrap_err().message, "inner");
        assert!(unit.is_within_transaction());
        Ok::<_, SuppressingError>(())
    })
    .unwrap();

    assert_eq!(journal.commits(), 1);
    assert_eq!(journal.rollbacks(), 0);
}

#[test]
fn test_factory_created_once_under_contention() {
    let unit = Arc::new(unit());
    let journal = unit.provider().journal.clone();
    journal.factory_delay_ms.store(20, Ordering::SeqCst);
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let unit = unit.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                unit.transactional(|| Ok::<_, TransactionError>(())).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(journal.factories(), 1);
    assert_eq!(journal.sessions(), 8);
    assert_eq!(journal.commits(), 8);
}

#[test]
fn test_failed_factory_is_retried() {
    let unit = unit();
    let journal = unit.provider().journal.clone();
    journal.faults.factory.store(1, Ordering::SeqCst);

    let first = unit.transactional(|| Ok::<_, TransactionError>(()));
    assert!(matches!(
        first,
        Err(TransactionError::Provider(ProviderError::Construction(_)))
    ));
    assert!(!unit.is_initialized());
    assert!(!unit.is_within_transaction());

    unit.transactional(|| Ok::<_, TransactionError>(())).unwrap();
    assert!(unit.is_initialized());
    assert_eq!(journal.factories(), 1);
}

#[test]
fn test_unknown_or_missing_unit_name() {
    let unit = PersistenceUnit::new(RecordingProvider::new(), Some("elsewhere".to_string()));
    assert!(matches!(
        unit.transactional(|| Ok::<_, TransactionError>(())),
        Err(TransactionError::Provider(ProviderError::UnknownUnit(_)))
    ));

    let unit = PersistenceUnit::from_config(RecordingProvider::new(), &AppConfig::default());
    let error = unit
        .transactional(|| Ok::<_, TransactionError>(()))
        .unwrap_err();
    assert!(error.to_string().contains("txscope.persistence.unit.name"));
    assert!(unit.provider().journal.events().is_empty());
}

#[test]
fn test_begin_failure_leaves_stack_empty() {
    let unit = unit();
    let journal = unit.provider().journal.clone();
    journal.faults.begin.store(true, Ordering::SeqCst);

    let mut ran = false;
    let result = unit.transactional(|| {
        ran = true;
        Ok::<_, TransactionError>(())
    });

    assert!(!ran);
    assert!(matches!(
        result,
        Err(TransactionError::Provider(ProviderError::Backend(_)))
    ));
    assert!(!unit.is_within_transaction());
    assert_eq!(journal.closed_sessions(), 1);
}

#[test]
fn test_panic_in_guarded_work_rolls_back() {
    let unit = unit();
    let journal = unit.provider().journal.clone();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        unit.transactional(|| -> Result<(), TransactionError> {
            unit.persist(&transfer(1))?;
            panic!("guarded work panicked");
        })
    }));

    assert!(outcome.is_err());
    assert_eq!(journal.commits(), 0);
    assert_eq!(journal.rollbacks(), 1);
    assert_eq!(journal.closed_sessions(), 1);
    assert!(!unit.is_within_transaction());
}

#[test]
fn test_two_units_on_one_thread_are_isolated() {
    let orders = unit();
    let audit = unit();

    orders
        .transactional(|| {
            assert!(orders.is_within_transaction());
            assert!(!audit.is_within_transaction());
            assert!(matches!(
                audit.persist(&transfer(1)),
                Err(TransactionError::OutsideTransaction)
            ));

            audit.transactional(|| {
                assert_eq!(audit.transaction_depth(), 1);
                audit.persist(&transfer(1))
            })?;

            assert_eq!(orders.transaction_depth(), 1);
            Ok::<_, TransactionError>(())
        })
        .unwrap();

    assert_eq!(orders.provider().journal.commits(), 1);
    assert_eq!(audit.provider().journal.commits(), 1);
}

#[test]
fn test_shutdown_closes_factory_once() {
    let unit = unit();
    let journal = unit.provider().journal.clone();

    unit.transactional(|| Ok::<_, TransactionError>(())).unwrap();
    unit.shutdown();
    unit.shutdown();
    drop(unit);

    assert_eq!(journal.count(|e| *e == Event::FactoryClosed), 1);
}

#[test]
fn test_delegation_forwards_to_current_session() {
    let unit = unit();
    let journal = unit.provider().journal.clone();

    unit.transactional(|| {
        unit.persist(&transfer(1))?;
        unit.merge(&transfer(1))?;
        unit.remove(&transfer(1))?;
        unit.find::<Transfer>(&1)?;
        unit.refresh(&transfer(1))?;
        unit.contains(&transfer(1))?;
        unit.detach(&transfer(1))?;
        unit.lock(&transfer(1), LockMode::Optimistic)?;
        unit.lock_mode(&transfer(1))?;
        unit.flush()?;
        unit.clear()?;
        unit.flush_mode()?;
        unit.set_flush_mode(FlushMode::Commit)?;
        unit.set_property("hint", serde_json::json!(true))?;
        unit.properties()?;
        unit.create_query("from transfers")?;
        unit.create_named_query("all")?;
        unit.create_native_query("SELECT 1")?;
        unit.join_transaction()?;
        unit.create_entity_graph::<Transfer>()?;
        unit.entity_graphs::<Transfer>()?;
        assert!(unit.entity_graph("missing").is_err());
        assert!(unit.get_reference::<Transfer>(&1).is_err());
        Ok::<_, TransactionError>(())
    })
    .unwrap();

    assert_eq!(journal.calls(), 23);
    assert!(journal
        .events()
        .iter()
        .all(|event| !matches!(event, Event::Call(session, _) if *session != 1)));
}
