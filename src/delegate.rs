//! Delegation surface
//!
//! Data-access methods on [`PersistenceUnit`] that resolve the calling
//! thread's current session and forward to it. Outside a transaction boundary
//! every method fails with [`TransactionError::OutsideTransaction`] without
//! touching the provider.

use crate::core::{PersistenceUnit, QueryOf, SessionOf};
use crate::errors::TransactionError;
use persistence_provider::{
    Entity, EntityGraph, FindOptions, FlushMode, LockMode, PersistenceProvider, Properties,
    Session,
};
use std::rc::Rc;

type Transaction<P> = <SessionOf<P> as Session>::Transaction;

impl<P: PersistenceProvider> PersistenceUnit<P> {
    fn current(&self) -> Result<Rc<SessionOf<P>>, TransactionError> {
        self.stack().peek()
    }

    /// Run `f` against the current session
    pub fn with_session<R>(
        &self,
        f: impl FnOnce(&SessionOf<P>) -> R,
    ) -> Result<R, TransactionError> {
        let session = self.current()?;
        Ok(f(&session))
    }

    pub fn persist<E: Entity>(&self, entity: &E) -> Result<(), TransactionError> {
        Ok(self.current()?.persist(entity)?)
    }

    pub fn merge<E: Entity>(&self, entity: &E) -> Result<E, TransactionError> {
        Ok(self.current()?.merge(entity)?)
    }

    pub fn remove<E: Entity>(&self, entity: &E) -> Result<(), TransactionError> {
        Ok(self.current()?.remove(entity)?)
    }

    pub fn find<E: Entity>(&self, id: &E::Id) -> Result<Option<E>, TransactionError> {
        self.find_with(id, &FindOptions::default())
    }

    /// `find` with a lock mode and/or provider properties
    pub fn find_with<E: Entity>(
        &self,
        id: &E::Id,
        options: &FindOptions,
    ) -> Result<Option<E>, TransactionError> {
        Ok(self.current()?.find(id, options)?)
    }

    pub fn get_reference<E: Entity>(&self, id: &E::Id) -> Result<E, TransactionError> {
        Ok(self.current()?.get_reference(id)?)
    }

    pub fn refresh<E: Entity>(&self, entity: &E) -> Result<E, TransactionError> {
        self.refresh_with(entity, &FindOptions::default())
    }

    pub fn refresh_with<E: Entity>(
        &self,
        entity: &E,
        options: &FindOptions,
    ) -> Result<E, TransactionError> {
        Ok(self.current()?.refresh(entity, options)?)
    }

    pub fn contains<E: Entity>(&self, entity: &E) -> Result<bool, TransactionError> {
        Ok(self.current()?.contains(entity)?)
    }

    pub fn detach<E: Entity>(&self, entity: &E) -> Result<(), TransactionError> {
        Ok(self.current()?.detach(entity)?)
    }

    pub fn lock<E: Entity>(&self, entity: &E, mode: LockMode) -> Result<(), TransactionError> {
        self.lock_with(entity, mode, &Properties::new())
    }

    pub fn lock_with<E: Entity>(
        &self,
        entity: &E,
        mode: LockMode,
        properties: &Properties,
    ) -> Result<(), TransactionError> {
        Ok(self.current()?.lock(entity, mode, properties)?)
    }

    pub fn lock_mode<E: Entity>(&self, entity: &E) -> Result<LockMode, TransactionError> {
        Ok(self.current()?.lock_mode(entity)?)
    }

    pub fn flush(&self) -> Result<(), TransactionError> {
        Ok(self.current()?.flush()?)
    }

    pub fn clear(&self) -> Result<(), TransactionError> {
        Ok(self.current()?.clear()?)
    }

    pub fn flush_mode(&self) -> Result<FlushMode, TransactionError> {
        Ok(self.current()?.flush_mode()?)
    }

    pub fn set_flush_mode(&self, mode: FlushMode) -> Result<(), TransactionError> {
        Ok(self.current()?.set_flush_mode(mode)?)
    }

    pub fn set_property(
        &self,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), TransactionError> {
        Ok(self.current()?.set_property(name, value)?)
    }

    pub fn properties(&self) -> Result<Properties, TransactionError> {
        Ok(self.current()?.properties()?)
    }

    pub fn create_query(&self, ql: &str) -> Result<QueryOf<P>, TransactionError> {
        Ok(self.current()?.create_query(ql)?)
    }

    pub fn create_named_query(&self, name: &str) -> Result<QueryOf<P>, TransactionError> {
        Ok(self.current()?.create_named_query(name)?)
    }

    pub fn create_native_query(&self, sql: &str) -> Result<QueryOf<P>, TransactionError> {
        Ok(self.current()?.create_native_query(sql)?)
    }

    pub fn join_transaction(&self) -> Result<(), TransactionError> {
        Ok(self.current()?.join_transaction()?)
    }

    pub fn is_joined_to_transaction(&self) -> Result<bool, TransactionError> {
        Ok(self.current()?.is_joined_to_transaction())
    }

    /// Whether the current session is open
    pub fn is_open(&self) -> Result<bool, TransactionError> {
        Ok(self.current()?.is_open())
    }

    /// Transaction handle of the current session
    pub fn transaction(&self) -> Result<Transaction<P>, TransactionError> {
        Ok(self.current()?.transaction())
    }

    pub fn create_entity_graph<E: Entity>(&self) -> Result<EntityGraph, TransactionError> {
        Ok(self.current()?.create_entity_graph::<E>()?)
    }

    pub fn entity_graph(&self, name: &str) -> Result<EntityGraph, TransactionError> {
        Ok(self.current()?.entity_graph(name)?)
    }

    pub fn entity_graphs<E: Entity>(&self) -> Result<Vec<EntityGraph>, TransactionError> {
        Ok(self.current()?.entity_graphs::<E>()?)
    }
}
