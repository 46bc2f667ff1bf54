//! Provider, factory and transaction traits
//!
//! A [`PersistenceProvider`] builds one [`SessionFactory`] per persistence
//! unit; the factory hands out sessions, and every session exposes a
//! [`TransactionHandle`] for its unit of work.

use crate::errors::ProviderError;
use crate::traits::session::Session;

/// Entry point of a persistence backend
pub trait PersistenceProvider: Send + Sync {
    type Factory: SessionFactory;

    /// Build the session factory for a named persistence unit.
    ///
    /// Fails with [`ProviderError::UnknownUnit`] or
    /// [`ProviderError::Construction`] when the unit cannot be set up.
    fn create_factory(&self, unit_name: &str) -> Result<Self::Factory, ProviderError>;
}

/// Process-wide, thread-safe source of sessions for one persistence unit
pub trait SessionFactory: Send + Sync {
    type Session: Session;

    /// Name of the persistence unit this factory serves
    fn unit_name(&self) -> &str;

    /// Open a new session
    fn create_session(&self) -> Result<Self::Session, ProviderError>;

    /// Release the factory; sessions can no longer be created afterwards
    fn close(&self);

    fn is_open(&self) -> bool;
}

/// Transaction bound to a single session
///
/// Handles are cheap to obtain and all handles of a session observe the
/// same transaction state.
pub trait TransactionHandle {
    fn begin(&self) -> Result<(), ProviderError>;

    fn commit(&self) -> Result<(), ProviderError>;

    fn rollback(&self) -> Result<(), ProviderError>;

    /// Whether the transaction has begun and not yet completed
    fn is_active(&self) -> bool;
}
