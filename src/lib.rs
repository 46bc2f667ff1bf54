//! # txscope
//!
//! Reentrant, thread-scoped transaction demarcation for persistence sessions.
//!
//! A [`PersistenceUnit`] owns a lazily created session factory and a
//! per-thread stack of open sessions. The outermost call into transactional
//! code opens a session and begins a transaction; calls made while that
//! boundary is open join it. When the outermost call returns, the transaction
//! commits on success and rolls back on failure, with any rollback failure
//! attached to the original error instead of replacing it.
//!
//! ## Quick Start
//!
//! ```rust
//! use txscope::prelude::*;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Entity)]
//! #[entity(name = "accounts")]
//! pub struct Account {
//!     #[id]
//!     pub number: u64,
//!     pub balance: i64,
//! }
//!
//! struct Bank {
//!     unit: PersistenceUnit<MemoryProvider>,
//! }
//!
//! impl Bank {
//!     #[transactional(self.unit)]
//!     fn open_account(&self, number: u64) -> Result<(), TransactionError> {
//!         self.unit.persist(&Account { number, balance: 0 })
//!     }
//!
//!     #[transactional(self.unit)]
//!     fn deposit(&self, number: u64, amount: i64) -> Result<i64, TransactionError> {
//!         let mut account: Account = self.unit.get_reference(&number)?;
//!         account.balance += amount;
//!         self.unit.merge(&account)?;
//!         Ok(account.balance)
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = MemoryProvider::new().with_unit(MemoryUnit::new("bank"))?;
//!     let config = AppConfig::new(PersistenceConfig::new("bank"));
//!     let bank = Bank {
//!         unit: PersistenceUnit::from_config(provider, &config),
//!     };
//!
//!     bank.open_account(7)?;
//!     assert_eq!(bank.deposit(7, 100)?, 100);
//!     Ok(())
//! }
//! ```

// Lets `#[derive(Entity)]` output name `::txscope` from inside this crate too
extern crate self as txscope;

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod core;
pub mod delegate;
pub mod errors;
pub mod prelude;
pub mod scope;
pub mod stack;

// Re-export the main public types for convenience
pub use core::{PersistenceUnit, QueryOf, SessionOf};
pub use errors::{GuardedError, TransactionError};
pub use scope::TransactionScope;
pub use stack::SessionStack;

// Re-export centralized config
pub use config::{AppConfig, ConfigError, PersistenceConfig};

// Re-export internal crates used by macros and public API
// These MUST be public for the generated macro code to work correctly
pub use persistence_provider;
pub use transactional_derive;

pub use transactional_derive::{transactional, Entity};
