//! Traits for persistence providers
//!
//! This module contains the traits a persistence backend implements to be
//! driven by the transaction scope manager.

pub mod core;
pub mod entity;
pub mod session;

// Re-export all public items for convenience
pub use core::{PersistenceProvider, SessionFactory, TransactionHandle};
pub use entity::Entity;
pub use session::{Query, Session};
