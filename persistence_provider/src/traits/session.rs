//! Session and query traits
//!
//! A session is one unit of work. It is used from a single thread at a time,
//! so every operation takes `&self` and implementations keep their own
//! interior state.

use crate::errors::ProviderError;
use crate::traits::core::TransactionHandle;
use crate::traits::entity::Entity;
use crate::types::{EntityGraph, FindOptions, FlushMode, LockMode, Properties};

/// Data-access operations available on an open session
pub trait Session: 'static {
    type Transaction: TransactionHandle;
    type Query: Query;

    /// Handle to this session's transaction
    fn transaction(&self) -> Self::Transaction;

    /// Close the session, discarding its persistence context
    fn close(&self) -> Result<(), ProviderError>;

    fn is_open(&self) -> bool;

    /// Make a new entity managed; it is written on commit
    fn persist<E: Entity>(&self, entity: &E) -> Result<(), ProviderError>;

    /// Copy the state of `entity` into the persistence context
    fn merge<E: Entity>(&self, entity: &E) -> Result<E, ProviderError>;

    fn remove<E: Entity>(&self, entity: &E) -> Result<(), ProviderError>;

    fn find<E: Entity>(
        &self,
        id: &E::Id,
        options: &FindOptions,
    ) -> Result<Option<E>, ProviderError>;

    /// Like `find`, but a missing entity is an error
    fn get_reference<E: Entity>(&self, id: &E::Id) -> Result<E, ProviderError>;

    /// Reload the stored state of `entity`, discarding pending changes to it
    fn refresh<E: Entity>(&self, entity: &E, options: &FindOptions) -> Result<E, ProviderError>;

    /// Whether `entity` is managed by this session
    fn contains<E: Entity>(&self, entity: &E) -> Result<bool, ProviderError>;

    /// Stop managing `entity`; its pending changes are dropped
    fn detach<E: Entity>(&self, entity: &E) -> Result<(), ProviderError>;

    fn lock<E: Entity>(
        &self,
        entity: &E,
        mode: LockMode,
        properties: &Properties,
    ) -> Result<(), ProviderError>;

    fn lock_mode<E: Entity>(&self, entity: &E) -> Result<LockMode, ProviderError>;

    fn flush(&self) -> Result<(), ProviderError>;

    /// Detach every managed entity
    fn clear(&self) -> Result<(), ProviderError>;

    fn flush_mode(&self) -> Result<FlushMode, ProviderError>;

    fn set_flush_mode(&self, mode: FlushMode) -> Result<(), ProviderError>;

    fn set_property(&self, name: &str, value: serde_json::Value) -> Result<(), ProviderError>;

    fn properties(&self) -> Result<Properties, ProviderError>;

    fn create_query(&self, ql: &str) -> Result<Self::Query, ProviderError>;

    fn create_named_query(&self, name: &str) -> Result<Self::Query, ProviderError>;

    fn create_native_query(&self, sql: &str) -> Result<Self::Query, ProviderError>;

    /// Enlist the session in the current transaction
    fn join_transaction(&self) -> Result<(), ProviderError>;

    fn is_joined_to_transaction(&self) -> bool;

    fn create_entity_graph<E: Entity>(&self) -> Result<EntityGraph, ProviderError>;

    fn entity_graph(&self, name: &str) -> Result<EntityGraph, ProviderError>;

    fn entity_graphs<E: Entity>(&self) -> Result<Vec<EntityGraph>, ProviderError>;
}

/// A prepared query bound to the session that created it
pub trait Query: Sized {
    fn set_parameter(self, name: &str, value: serde_json::Value) -> Self;

    fn set_max_results(self, max_results: usize) -> Self;

    fn result_list<E: Entity>(&self) -> Result<Vec<E>, ProviderError>;

    /// Exactly one result, or an error
    fn single_result<E: Entity>(&self) -> Result<E, ProviderError> {
        let mut results = self.result_list::<E>()?;
        match results.len() {
            1 => Ok(results.remove(0)),
            0 => Err(ProviderError::query("query returned no result")),
            n => Err(ProviderError::query(format!(
                "expected a single result, query returned {}",
                n
            ))),
        }
    }

    /// Run a bulk update or delete, returning the affected row count
    fn execute_update(&self) -> Result<u64, ProviderError>;
}
