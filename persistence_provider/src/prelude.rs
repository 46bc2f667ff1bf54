//! Convenience re-exports for common provider usage

// Provider traits
pub use crate::traits::{
    Entity, PersistenceProvider, Query, Session, SessionFactory, TransactionHandle,
};

// Error types
pub use crate::errors::ProviderError;

// Shared value types
pub use crate::types::{EntityGraph, FindOptions, FlushMode, LockMode, Properties};

// In-memory provider
pub use crate::memory::{MemoryProvider, MemoryStats, MemoryUnit};

// Common external dependencies that are frequently used
pub use serde::{Deserialize, Serialize};
