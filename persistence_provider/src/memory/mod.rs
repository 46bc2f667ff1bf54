//! In-memory reference provider
//!
//! Units live in process memory. Each session stages its writes and applies
//! them to the shared unit store when its transaction commits; rollback
//! discards them. The provider keeps per-unit counters so callers can observe
//! how many factories, sessions and transaction outcomes it has seen.

mod query;
mod session;

pub use query::MemoryQuery;
pub use session::{MemorySession, MemoryTransaction};

use crate::errors::ProviderError;
use crate::traits::{PersistenceProvider, SessionFactory};
use crate::types::EntityGraph;
use crate::validation::ValidatedName;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Committed rows, keyed by entity name, then by serialized id
pub(crate) type Tables = HashMap<String, BTreeMap<String, serde_json::Value>>;

/// Definition of one persistence unit
#[derive(Debug, Clone)]
pub struct MemoryUnit {
    name: String,
    named_queries: HashMap<String, String>,
    entity_graphs: Vec<EntityGraph>,
}

impl MemoryUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            named_queries: HashMap::new(),
            entity_graphs: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a query that sessions can create by name
    pub fn with_named_query(mut self, name: impl Into<String>, ql: impl Into<String>) -> Self {
        self.named_queries.insert(name.into(), ql.into());
        self
    }

    /// Register a named entity graph
    pub fn with_entity_graph(mut self, graph: EntityGraph) -> Self {
        self.entity_graphs.push(graph);
        self
    }
}

/// Snapshot of a unit's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub factories_created: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub commits: u64,
    pub rollbacks: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    factories_created: AtomicU64,
    pub(crate) sessions_opened: AtomicU64,
    pub(crate) sessions_closed: AtomicU64,
    pub(crate) commits: AtomicU64,
    pub(crate) rollbacks: AtomicU64,
}

impl StatsCounters {
    fn snapshot(&self) -> MemoryStats {
        MemoryStats {
            factories_created: self.factories_created.load(Ordering::SeqCst),
            sessions_opened: self.sessions_opened.load(Ordering::SeqCst),
            sessions_closed: self.sessions_closed.load(Ordering::SeqCst),
            commits: self.commits.load(Ordering::SeqCst),
            rollbacks: self.rollbacks.load(Ordering::SeqCst),
        }
    }
}

/// Shared state of one unit: its definition, committed rows and counters
#[derive(Debug)]
pub(crate) struct UnitState {
    pub(crate) definition: MemoryUnit,
    pub(crate) tables: RwLock<Tables>,
    pub(crate) stats: StatsCounters,
}

/// Provider holding a registry of in-memory persistence units
#[derive(Debug, Default)]
pub struct MemoryProvider {
    units: RwLock<HashMap<String, Arc<UnitState>>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryProvider::register`]
    pub fn with_unit(self, unit: MemoryUnit) -> Result<Self, ProviderError> {
        self.register(unit)?;
        Ok(self)
    }

    /// Register a unit, replacing any unit of the same name
    pub fn register(&self, unit: MemoryUnit) -> Result<(), ProviderError> {
        for graph in &unit.entity_graphs {
            ValidatedName::new(&graph.root).map_err(|e| {
                ProviderError::Construction(format!("entity graph root: {}", e))
            })?;
        }

        let name = unit.name.clone();
        let state = Arc::new(UnitState {
            definition: unit,
            tables: RwLock::new(Tables::new()),
            stats: StatsCounters::default(),
        });

        let mut units = self
            .units
            .write()
            .map_err(|_| ProviderError::Backend("unit registry lock poisoned".to_string()))?;
        units.insert(name, state);
        Ok(())
    }

    /// Counters for a registered unit
    pub fn stats(&self, unit_name: &str) -> Option<MemoryStats> {
        self.unit(unit_name).map(|unit| unit.stats.snapshot())
    }

    /// Number of committed rows stored for an entity
    pub fn row_count(&self, unit_name: &str, entity_name: &str) -> usize {
        self.unit(unit_name)
            .and_then(|unit| {
                unit.tables
                    .read()
                    .ok()
                    .map(|tables| tables.get(entity_name).map_or(0, BTreeMap::len))
            })
            .unwrap_or(0)
    }

    fn unit(&self, unit_name: &str) -> Option<Arc<UnitState>> {
        self.units
            .read()
            .ok()
            .and_then(|units| units.get(unit_name).cloned())
    }
}

impl PersistenceProvider for MemoryProvider {
    type Factory = MemoryFactory;

    fn create_factory(&self, unit_name: &str) -> Result<MemoryFactory, ProviderError> {
        if unit_name.trim().is_empty() {
            return Err(ProviderError::Construction(
                "persistence unit name cannot be empty".to_string(),
            ));
        }

        let unit = self
            .unit(unit_name)
            .ok_or_else(|| ProviderError::UnknownUnit(unit_name.to_string()))?;
        unit.stats.factories_created.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("created session factory for unit '{}'", unit_name);

        Ok(MemoryFactory {
            unit,
            open: AtomicBool::new(true),
        })
    }
}

/// Session factory for one in-memory unit
#[derive(Debug)]
pub struct MemoryFactory {
    unit: Arc<UnitState>,
    open: AtomicBool,
}

impl MemoryFactory {
    pub fn stats(&self) -> MemoryStats {
        self.unit.stats.snapshot()
    }
}

impl SessionFactory for MemoryFactory {
    type Session = MemorySession;

    fn unit_name(&self) -> &str {
        self.unit.definition.name()
    }

    fn create_session(&self) -> Result<MemorySession, ProviderError> {
        if !self.is_open() {
            return Err(ProviderError::FactoryClosed(self.unit_name().to_string()));
        }
        self.unit.stats.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession::open(self.unit.clone()))
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            tracing::debug!("closed session factory for unit '{}'", self.unit_name());
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}
