//! Persistence Provider - Backend abstraction for the txscope transaction manager
//!
//! This crate defines what a persistence backend must offer: a provider that
//! builds session factories per persistence unit, sessions with their
//! transaction handles and queries, plus the value types shared between them.
//! An in-memory reference provider lives in [`memory`].

pub mod errors;
pub mod memory;
pub mod prelude;
pub mod traits;
pub mod types;
pub mod validation;

pub use errors::ProviderError;
pub use memory::{MemoryFactory, MemoryProvider, MemoryQuery, MemorySession, MemoryStats, MemoryUnit};
pub use traits::{Entity, PersistenceProvider, Query, Session, SessionFactory, TransactionHandle};
pub use types::{EntityGraph, FindOptions, FlushMode, LockMode, Properties};
pub use validation::{ValidatedName, ValidationError};
