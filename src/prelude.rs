//! Convenience re-exports for common txscope usage
//!
//! This prelude module re-exports the most commonly used items from the txscope workspace,
//! making it easier to import everything you need with a single use statement.
//!
//! # Example
//!
//! ```rust
//! use txscope::prelude::*;
//!
//! // Now you have access to PersistenceUnit, the provider traits and the macros
//! ```

// Core txscope components
pub use crate::core::{PersistenceUnit, QueryOf, SessionOf};
pub use crate::errors::{GuardedError, TransactionError};
pub use crate::scope::TransactionScope;

// Re-export centralized config
pub use config::{AppConfig, ConfigError, PersistenceConfig};

// Re-export commonly used provider types for convenience
pub use persistence_provider::prelude::*;

// Re-export persistence_provider module for macro-generated code
pub use persistence_provider;

// Re-export the transactional attribute and Entity derive
pub use transactional_derive::{transactional, Entity};

// Common external dependencies
pub use serde_json;
