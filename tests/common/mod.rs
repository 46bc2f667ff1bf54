//! Recording provider shared by the integration tests
//!
//! Every call that reaches the provider is appended to a journal, and each
//! stage (factory creation, begin, commit, rollback) can be told to fail.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use txscope::persistence_provider::{
    Entity, EntityGraph, FindOptions, FlushMode, LockMode, PersistenceProvider, Properties,
    ProviderError, Query, Session, SessionFactory, TransactionHandle,
};
use txscope::{GuardedError, TransactionError};

pub const UNIT: &str = "recording";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    FactoryCreated,
    FactoryClosed,
    SessionOpened(u64),
    SessionClosed(u64),
    Begin(u64),
    Commit(u64),
    Rollback(u64),
    Call(u64, &'static str),
}

#[derive(Debug, Default)]
pub struct Faults {
    /// Number of upcoming factory creations that fail
    pub factory: AtomicUsize,
    pub begin: AtomicBool,
    pub commit: AtomicBool,
    pub rollback: AtomicBool,
}

#[derive(Debug, Default)]
pub struct Journal {
    events: Mutex<Vec<Event>>,
    next_session: AtomicU64,
    pub faults: Faults,
    /// Pause inside factory creation, to widen races between threads
    pub factory_delay_ms: AtomicU64,
}

impl Journal {
    fn record(&self, event: Event) {
        self.events
            .lock()
            .expect("journal lock poisoned")
            .push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("journal lock poisoned").clone()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|event| matches(event)).count()
    }

    pub fn factories(&self) -> usize {
        self.count(|event| *event == Event::FactoryCreated)
    }

    pub fn sessions(&self) -> usize {
        self.count(|event| matches!(event, Event::SessionOpened(_)))
    }

    pub fn closed_sessions(&self) -> usize {
        self.count(|event| matches!(event, Event::SessionClosed(_)))
    }

    pub fn commits(&self) -> usize {
        self.count(|event| matches!(event, Event::Commit(_)))
    }

    pub fn rollbacks(&self) -> usize {
        self.count(|event| matches!(event, Event::Rollback(_)))
    }

    pub fn calls(&self) -> usize {
        self.count(|event| matches!(event, Event::Call(..)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingProvider {
    pub journal: Arc<Journal>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistenceProvider for RecordingProvider {
    type Factory = RecordingFactory;

    fn create_factory(&self, unit_name: &str) -> Result<RecordingFactory, ProviderError> {
        let delay = self.journal.factory_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            thread::sleep(Duration::from_millis(delay));
        }

        let failing = self
            .journal
            .faults
            .factory
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ProviderError::Construction(format!(
                "factory for '{}' refused",
                unit_name
            )));
        }
        if unit_name != UNIT {
            return Err(ProviderError::UnknownUnit(unit_name.to_string()));
        }

        self.journal.record(Event::FactoryCreated);
        Ok(RecordingFactory {
            journal: self.journal.clone(),
            open: AtomicBool::new(true),
        })
    }
}

#[derive(Debug)]
pub struct RecordingFactory {
    journal: Arc<Journal>,
    open: AtomicBool,
}

impl SessionFactory for RecordingFactory {
    type Session = RecordingSession;

    fn unit_name(&self) -> &str {
        UNIT
    }

    fn create_session(&self) -> Result<RecordingSession, ProviderError> {
        if !self.is_open() {
            return Err(ProviderError::FactoryClosed(UNIT.to_string()));
        }
        let id = self.journal.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        self.journal.record(Event::SessionOpened(id));
        Ok(RecordingSession {
            id,
            journal: self.journal.clone(),
            open: Cell::new(true),
            active: Rc::new(Cell::new(false)),
        })
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.journal.record(Event::FactoryClosed);
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct RecordingSession {
    pub id: u64,
    journal: Arc<Journal>,
    open: Cell<bool>,
    active: Rc<Cell<bool>>,
}

impl RecordingSession {
    fn call(&self, name: &'static str) -> Result<(), ProviderError> {
        if !self.open.get() {
            return Err(ProviderError::SessionClosed);
        }
        self.journal.record(Event::Call(self.id, name));
        Ok(())
    }
}

impl Session for RecordingSession {
    type Transaction = RecordingTransaction;
    type Query = RecordingQuery;

    fn transaction(&self) -> RecordingTransaction {
        RecordingTransaction {
            session: self.id,
            journal: self.journal.clone(),
            active: self.active.clone(),
        }
    }

    fn close(&self) -> Result<(), ProviderError> {
        if self.open.replace(false) {
            self.journal.record(Event::SessionClosed(self.id));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.get()
    }

    fn persist<E: Entity>(&self, _entity: &E) -> Result<(), ProviderError> {
        self.call("persist")
    }

    fn merge<E: Entity>(&self, entity: &E) -> Result<E, ProviderError> {
        self.call("merge")?;
        Ok(entity.clone())
    }

    fn remove<E: Entity>(&self, _entity: &E) -> Result<(), ProviderError> {
        self.call("remove")
    }

    fn find<E: Entity>(
        &self,
        _id: &E::Id,
        _options: &FindOptions,
    ) -> Result<Option<E>, ProviderError> {
        self.call("find")?;
        Ok(None)
    }

    fn get_reference<E: Entity>(&self, id: &E::Id) -> Result<E, ProviderError> {
        self.call("get_reference")?;
        Err(ProviderError::not_found(
            E::entity_name(),
            serde_json::to_string(id)?,
        ))
    }

    fn refresh<E: Entity>(&self, entity: &E, _options: &FindOptions) -> Result<E, ProviderError> {
        self.call("refresh")?;
        Ok(entity.clone())
    }

    fn contains<E: Entity>(&self, _entity: &E) -> Result<bool, ProviderError> {
        self.call("contains")?;
        Ok(false)
    }

    fn detach<E: Entity>(&self, _entity: &E) -> Result<(), ProviderError> {
        self.call("detach")
    }

    fn lock<E: Entity>(
        &self,
        _entity: &E,
        _mode: LockMode,
        _properties: &Properties,
    ) -> Result<(), ProviderError> {
        self.call("lock")
    }

    fn lock_mode<E: Entity>(&self, _entity: &E) -> Result<LockMode, ProviderError> {
        self.call("lock_mode")?;
        Ok(LockMode::None)
    }

    fn flush(&self) -> Result<(), ProviderError> {
        self.call("flush")
    }

    fn clear(&self) -> Result<(), ProviderError> {
        self.call("clear")
    }

    fn flush_mode(&self) -> Result<FlushMode, ProviderError> {
        self.call("flush_mode")?;
        Ok(FlushMode::Auto)
    }

    fn set_flush_mode(&self, _mode: FlushMode) -> Result<(), ProviderError> {
        self.call("set_flush_mode")
    }

    fn set_property(&self, _name: &str, _value: serde_json::Value) -> Result<(), ProviderError> {
        self.call("set_property")
    }

    fn properties(&self) -> Result<Properties, ProviderError> {
        self.call("properties")?;
        Ok(Properties::new())
    }

    fn create_query(&self, _ql: &str) -> Result<RecordingQuery, ProviderError> {
        self.call("create_query")?;
        Ok(RecordingQuery)
    }

    fn create_named_query(&self, _name: &str) -> Result<RecordingQuery, ProviderError> {
        self.call("create_named_query")?;
        Ok(RecordingQuery)
    }

    fn create_native_query(&self, _sql: &str) -> Result<RecordingQuery, ProviderError> {
        self.call("create_native_query")?;
        Ok(RecordingQuery)
    }

    fn join_transaction(&self) -> Result<(), ProviderError> {
        self.call("join_transaction")
    }

    fn is_joined_to_transaction(&self) -> bool {
        self.active.get()
    }

    fn create_entity_graph<E: Entity>(&self) -> Result<EntityGraph, ProviderError> {
        self.call("create_entity_graph")?;
        Ok(EntityGraph::new(E::entity_name()))
    }

    fn entity_graph(&self, name: &str) -> Result<EntityGraph, ProviderError> {
        self.call("entity_graph")?;
        Err(ProviderError::UnknownEntityGraph(name.to_string()))
    }

    fn entity_graphs<E: Entity>(&self) -> Result<Vec<EntityGraph>, ProviderError> {
        self.call("entity_graphs")?;
        Ok(Vec::new())
    }
}

#[derive(Debug)]
pub struct RecordingTransaction {
    session: u64,
    journal: Arc<Journal>,
    active: Rc<Cell<bool>>,
}

impl TransactionHandle for RecordingTransaction {
    fn begin(&self) -> Result<(), ProviderError> {
        if self.journal.faults.begin.load(Ordering::SeqCst) {
            return Err(ProviderError::Backend("begin refused".to_string()));
        }
        if self.active.replace(true) {
            return Err(ProviderError::TransactionAlreadyActive);
        }
        self.journal.record(Event::Begin(self.session));
        Ok(())
    }

    fn commit(&self) -> Result<(), ProviderError> {
        if !self.active.replace(false) {
            return Err(ProviderError::TransactionNotActive);
        }
        self.journal.record(Event::Commit(self.session));
        if self.journal.faults.commit.load(Ordering::SeqCst) {
            return Err(ProviderError::Backend("commit refused".to_string()));
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), ProviderError> {
        if !self.active.replace(false) {
            return Err(ProviderError::TransactionNotActive);
        }
        self.journal.record(Event::Rollback(self.session));
        if self.journal.faults.rollback.load(Ordering::SeqCst) {
            return Err(ProviderError::Backend("rollback refused".to_string()));
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }
}

#[derive(Debug)]
pub struct RecordingQuery;

impl Query for RecordingQuery {
    fn set_parameter(self, _name: &str, _value: serde_json::Value) -> Self {
        self
    }

    fn set_max_results(self, _max_results: usize) -> Self {
        self
    }

    fn result_list<E: Entity>(&self) -> Result<Vec<E>, ProviderError> {
        Ok(Vec::new())
    }

    fn execute_update(&self) -> Result<u64, ProviderError> {
        Ok(0)
    }
}

/// Caller-defined error that keeps its own suppressed list
#[derive(Debug)]
pub struct SuppressingError {
    pub message: String,
    pub suppressed: Vec<ProviderError>,
}

impl SuppressingError {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            suppressed: Vec::new(),
        }
    }
}

impl From<TransactionError> for SuppressingError {
    fn from(error: TransactionError) -> Self {
        Self::new(&error.to_string())
    }
}

impl GuardedError for SuppressingError {
    fn add_suppressed(&mut self, error: ProviderError) {
        self.suppressed.push(error);
    }
}
