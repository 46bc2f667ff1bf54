use super::query::{MemoryQuery, QuerySpec};
use super::{Tables, UnitState};
use crate::errors::ProviderError;
use crate::traits::{Entity, Session, TransactionHandle};
use crate::types::{EntityGraph, FindOptions, FlushMode, LockMode, Properties};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// (entity name, serialized id)
pub(crate) type EntityKey = (String, String);

#[derive(Debug, Clone)]
pub(crate) enum Pending {
    Write(serde_json::Value),
    Delete,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) open: bool,
    pub(crate) tx_active: bool,
    pub(crate) flush_mode: FlushMode,
    properties: Properties,
    managed: HashMap<EntityKey, serde_json::Value>,
    pub(crate) pending: HashMap<EntityKey, Pending>,
    locks: HashMap<EntityKey, LockMode>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            open: true,
            tx_active: false,
            flush_mode: FlushMode::default(),
            properties: Properties::new(),
            managed: HashMap::new(),
            pending: HashMap::new(),
            locks: HashMap::new(),
        }
    }

    fn require_open(&self) -> Result<(), ProviderError> {
        if self.open {
            Ok(())
        } else {
            Err(ProviderError::SessionClosed)
        }
    }

    fn require_transaction(&self, operation: &'static str) -> Result<(), ProviderError> {
        self.require_open()?;
        if self.tx_active {
            Ok(())
        } else {
            Err(ProviderError::TransactionRequired(operation))
        }
    }

    fn discard(&mut self) {
        self.managed.clear();
        self.pending.clear();
        self.locks.clear();
    }
}

#[derive(Debug)]
pub(crate) struct SessionInner {
    id: Uuid,
    pub(crate) unit: Arc<UnitState>,
    state: Mutex<SessionState>,
}

impl SessionInner {
    pub(crate) fn state(&self) -> Result<MutexGuard<'_, SessionState>, ProviderError> {
        self.state
            .lock()
            .map_err(|_| ProviderError::Backend(format!("session {} state lock poisoned", self.id)))
    }

    /// Committed rows of one entity with this session's pending writes laid over them
    pub(crate) fn visible_rows(
        &self,
        state: &SessionState,
        entity_name: &str,
        include_pending: bool,
    ) -> Result<BTreeMap<String, serde_json::Value>, ProviderError> {
        let mut rows = self
            .tables()?
            .get(entity_name)
            .cloned()
            .unwrap_or_default();

        if include_pending {
            for ((entity, id), pending) in &state.pending {
                if entity != entity_name {
                    continue;
                }
                match pending {
                    Pending::Write(value) => {
                        rows.insert(id.clone(), value.clone());
                    }
                    Pending::Delete => {
                        rows.remove(id);
                    }
                }
            }
        }
        Ok(rows)
    }

    fn tables(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, ProviderError> {
        self.unit
            .tables
            .read()
            .map_err(|_| ProviderError::Backend("unit tables lock poisoned".to_string()))
    }

    fn committed(&self, key: &EntityKey) -> Result<Option<serde_json::Value>, ProviderError> {
        Ok(self
            .tables()?
            .get(&key.0)
            .and_then(|rows| rows.get(&key.1))
            .cloned())
    }

    fn visible(
        &self,
        state: &SessionState,
        key: &EntityKey,
    ) -> Result<Option<serde_json::Value>, ProviderError> {
        match state.pending.get(key) {
            Some(Pending::Write(value)) => Ok(Some(value.clone())),
            Some(Pending::Delete) => Ok(None),
            None => self.committed(key),
        }
    }
}

/// Session over an in-memory unit
#[derive(Debug, Clone)]
pub struct MemorySession {
    inner: Arc<SessionInner>,
}

impl MemorySession {
    pub(crate) fn open(unit: Arc<UnitState>) -> Self {
        let id = Uuid::new_v4();
        tracing::trace!("opened session {} on unit '{}'", id, unit.definition.name());
        Self {
            inner: Arc::new(SessionInner {
                id,
                unit,
                state: Mutex::new(SessionState::new()),
            }),
        }
    }

    /// Identifier used in log output
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    fn key_of<E: Entity>(id: &E::Id) -> Result<EntityKey, ProviderError> {
        Ok((E::entity_name().to_string(), serde_json::to_string(id)?))
    }

    fn apply_lock(
        state: &mut SessionState,
        key: &EntityKey,
        lock_mode: Option<LockMode>,
    ) -> Result<(), ProviderError> {
        match lock_mode {
            Some(mode) if mode.is_pessimistic() => {
                state.require_transaction("pessimistic lock")?;
                state.locks.insert(key.clone(), mode);
            }
            Some(mode) if mode != LockMode::None => {
                state.locks.insert(key.clone(), mode);
            }
            _ => {}
        }
        Ok(())
    }
}

impl Session for MemorySession {
    type Transaction = MemoryTransaction;
    type Query = MemoryQuery;

    fn transaction(&self) -> MemoryTransaction {
        MemoryTransaction {
            session: self.inner.clone(),
        }
    }

    fn close(&self) -> Result<(), ProviderError> {
        let mut state = self.inner.state()?;
        if !state.open {
            return Ok(());
        }
        state.open = false;
        state.tx_active = false;
        state.discard();
        self.inner
            .unit
            .stats
            .sessions_closed
            .fetch_add(1, Ordering::SeqCst);
        tracing::trace!("closed session {}", self.inner.id);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.state().map(|state| state.open).unwrap_or(false)
    }

    fn persist<E: Entity>(&self, entity: &E) -> Result<(), ProviderError> {
        let mut state = self.inner.state()?;
        state.require_transaction("persist")?;

        let key = Self::key_of::<E>(&entity.id())?;
        if self.inner.visible(&state, &key)?.is_some() {
            return Err(ProviderError::exists(key.0, key.1));
        }

        let value = serde_json::to_value(entity)?;
        state.pending.insert(key.clone(), Pending::Write(value.clone()));
        state.managed.insert(key, value);
        Ok(())
    }

    fn merge<E: Entity>(&self, entity: &E) -> Result<E, ProviderError> {
        let mut state = self.inner.state()?;
        state.require_transaction("merge")?;

        let key = Self::key_of::<E>(&entity.id())?;
        let value = serde_json::to_value(entity)?;
        state.pending.insert(key.clone(), Pending::Write(value.clone()));
        state.managed.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    fn remove<E: Entity>(&self, entity: &E) -> Result<(), ProviderError> {
        let mut state = self.inner.state()?;
        state.require_transaction("remove")?;

        let key = Self::key_of::<E>(&entity.id())?;
        if self.inner.visible(&state, &key)?.is_none() {
            return Err(ProviderError::not_found(key.0, key.1));
        }

        state.managed.remove(&key);
        state.locks.remove(&key);
        state.pending.insert(key, Pending::Delete);
        Ok(())
    }

    fn find<E: Entity>(
        &self,
        id: &E::Id,
        options: &FindOptions,
    ) -> Result<Option<E>, ProviderError> {
        let mut state = self.inner.state()?;
        state.require_open()?;

        let key = Self::key_of::<E>(id)?;
        let Some(value) = self.inner.visible(&state, &key)? else {
            return Ok(None);
        };

        Self::apply_lock(&mut state, &key, options.lock_mode)?;
        state.managed.insert(key, value.clone());
        Ok(Some(serde_json::from_value(value)?))
    }

    fn get_reference<E: Entity>(&self, id: &E::Id) -> Result<E, ProviderError> {
        match self.find::<E>(id, &FindOptions::default())? {
            Some(entity) => Ok(entity),
            None => Err(ProviderError::not_found(
                E::entity_name(),
                serde_json::to_string(id)?,
            )),
        }
    }

    fn refresh<E: Entity>(&self, entity: &E, options: &FindOptions) -> Result<E, ProviderError> {
        let mut state = self.inner.state()?;
        state.require_open()?;

        let key = Self::key_of::<E>(&entity.id())?;
        if !state.managed.contains_key(&key) {
            return Err(ProviderError::not_found(key.0, key.1));
        }

        state.pending.remove(&key);
        let Some(value) = self.inner.committed(&key)? else {
            state.managed.remove(&key);
            return Err(ProviderError::not_found(key.0, key.1));
        };

        Self::apply_lock(&mut state, &key, options.lock_mode)?;
        state.managed.insert(key, value.clone());
        Ok(serde_json::from_value(value)?)
    }

    fn contains<E: Entity>(&self, entity: &E) -> Result<bool, ProviderError> {
        let state = self.inner.state()?;
        state.require_open()?;
        let key = Self::key_of::<E>(&entity.id())?;
        Ok(state.managed.contains_key(&key))
    }

    fn detach<E: Entity>(&self, entity: &E) -> Result<(), ProviderError> {
        let mut state = self.inner.state()?;
        state.require_open()?;
        let key = Self::key_of::<E>(&entity.id())?;
        state.managed.remove(&key);
        state.pending.remove(&key);
        state.locks.remove(&key);
        Ok(())
    }

    fn lock<E: Entity>(
        &self,
        entity: &E,
        mode: LockMode,
        _properties: &Properties,
    ) -> Result<(), ProviderError> {
        let mut state = self.inner.state()?;
        state.require_transaction("lock")?;

        let key = Self::key_of::<E>(&entity.id())?;
        if !state.managed.contains_key(&key) {
            return Err(ProviderError::not_found(key.0, key.1));
        }
        state.locks.insert(key, mode);
        Ok(())
    }

    fn lock_mode<E: Entity>(&self, entity: &E) -> Result<LockMode, ProviderError> {
        let state = self.inner.state()?;
        state.require_open()?;

        let key = Self::key_of::<E>(&entity.id())?;
        if !state.managed.contains_key(&key) {
            return Err(ProviderError::not_found(key.0, key.1));
        }
        Ok(state.locks.get(&key).copied().unwrap_or_default())
    }

    fn flush(&self) -> Result<(), ProviderError> {
        let state = self.inner.state()?;
        state.require_transaction("flush")?;
        // Staged writes are applied atomically at commit
        tracing::trace!(
            "flush on session {} with {} pending writes",
            self.inner.id,
            state.pending.len()
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), ProviderError> {
        let mut state = self.inner.state()?;
        state.require_open()?;
        state.discard();
        Ok(())
    }

    fn flush_mode(&self) -> Result<FlushMode, ProviderError> {
        let state = self.inner.state()?;
        state.require_open()?;
        Ok(state.flush_mode)
    }

    fn set_flush_mode(&self, mode: FlushMode) -> Result<(), ProviderError> {
        let mut state = self.inner.state()?;
        state.require_open()?;
        state.flush_mode = mode;
        Ok(())
    }

    fn set_property(&self, name: &str, value: serde_json::Value) -> Result<(), ProviderError> {
        let mut state = self.inner.state()?;
        state.require_open()?;
        state.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn properties(&self) -> Result<Properties, ProviderError> {
        let state = self.inner.state()?;
        state.require_open()?;
        Ok(state.properties.clone())
    }

    fn create_query(&self, ql: &str) -> Result<MemoryQuery, ProviderError> {
        self.inner.state()?.require_open()?;
        let spec = QuerySpec::parse(ql)?;
        Ok(MemoryQuery::new(self.inner.clone(), spec))
    }

    fn create_named_query(&self, name: &str) -> Result<MemoryQuery, ProviderError> {
        let ql = self
            .inner
            .unit
            .definition
            .named_queries
            .get(name)
            .ok_or_else(|| ProviderError::UnknownNamedQuery(name.to_string()))?;
        self.create_query(ql)
    }

    fn create_native_query(&self, _sql: &str) -> Result<MemoryQuery, ProviderError> {
        self.inner.state()?.require_open()?;
        Err(ProviderError::query(
            "native queries are not supported by the in-memory provider",
        ))
    }

    fn join_transaction(&self) -> Result<(), ProviderError> {
        self.inner.state()?.require_transaction("join_transaction")
    }

    fn is_joined_to_transaction(&self) -> bool {
        self.inner
            .state()
            .map(|state| state.open && state.tx_active)
            .unwrap_or(false)
    }

    fn create_entity_graph<E: Entity>(&self) -> Result<EntityGraph, ProviderError> {
        self.inner.state()?.require_open()?;
        Ok(EntityGraph::new(E::entity_name()))
    }

    fn entity_graph(&self, name: &str) -> Result<EntityGraph, ProviderError> {
        self.inner.state()?.require_open()?;
        self.inner
            .unit
            .definition
            .entity_graphs
            .iter()
            .find(|graph| graph.name.as_deref() == Some(name))
            .cloned()
            .ok_or_else(|| ProviderError::UnknownEntityGraph(name.to_string()))
    }

    fn entity_graphs<E: Entity>(&self) -> Result<Vec<EntityGraph>, ProviderError> {
        self.inner.state()?.require_open()?;
        Ok(self
            .inner
            .unit
            .definition
            .entity_graphs
            .iter()
            .filter(|graph| graph.root == E::entity_name())
            .cloned()
            .collect())
    }
}

/// Transaction handle of a [`MemorySession`]
#[derive(Debug, Clone)]
pub struct MemoryTransaction {
    session: Arc<SessionInner>,
}

impl TransactionHandle for MemoryTransaction {
    fn begin(&self) -> Result<(), ProviderError> {
        let mut state = self.session.state()?;
        state.require_open()?;
        if state.tx_active {
            return Err(ProviderError::TransactionAlreadyActive);
        }
        state.tx_active = true;
        tracing::trace!("began transaction on session {}", self.session.id);
        Ok(())
    }

    fn commit(&self) -> Result<(), ProviderError> {
        let mut state = self.session.state()?;
        if !state.tx_active {
            return Err(ProviderError::TransactionNotActive);
        }

        {
            let mut tables = self
                .session
                .unit
                .tables
                .write()
                .map_err(|_| ProviderError::Backend("unit tables lock poisoned".to_string()))?;
            for ((entity, id), pending) in state.pending.drain() {
                let rows = tables.entry(entity).or_default();
                match pending {
                    Pending::Write(value) => {
                        rows.insert(id, value);
                    }
                    Pending::Delete => {
                        rows.remove(&id);
                    }
                }
            }
        }

        state.locks.clear();
        state.tx_active = false;
        self.session
            .unit
            .stats
            .commits
            .fetch_add(1, Ordering::SeqCst);
        tracing::trace!("committed transaction on session {}", self.session.id);
        Ok(())
    }

    fn rollback(&self) -> Result<(), ProviderError> {
        let mut state = self.session.state()?;
        if !state.tx_active {
            return Err(ProviderError::TransactionNotActive);
        }

        state.discard();
        state.tx_active = false;
        self.session
            .unit
            .stats
            .rollbacks
            .fetch_add(1, Ordering::SeqCst);
        tracing::trace!("rolled back transaction on session {}", self.session.id);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.session
            .state()
            .map(|state| state.open && state.tx_active)
            .unwrap_or(false)
    }
}
