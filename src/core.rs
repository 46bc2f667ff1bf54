//! Core txscope functionality
//!
//! This module contains [`PersistenceUnit`], the transaction service: it owns
//! the lazily created session factory and the thread-scoped session stack,
//! opens transaction boundaries, and runs guarded work through
//! [`PersistenceUnit::transactional`].

use once_cell::sync::OnceCell;
use persistence_provider::{PersistenceProvider, ProviderError, Session, SessionFactory};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::{GuardedError, TransactionError};
use crate::scope::TransactionScope;
use crate::stack::SessionStack;
use config::{AppConfig, PERSISTENCE_UNIT_NAME_PROPERTY};

/// Session type produced by a provider's factory
pub type SessionOf<P> = <<P as PersistenceProvider>::Factory as SessionFactory>::Session;

/// Query type produced by a provider's sessions
pub type QueryOf<P> = <SessionOf<P> as Session>::Query;

/// Transaction service for one persistence unit
///
/// Share it between threads behind an `Arc`; every thread gets its own
/// session stack. Data access through the delegation methods goes to the
/// innermost session the calling thread has open.
pub struct PersistenceUnit<P: PersistenceProvider> {
    provider: P,
    unit_name: Option<String>,
    factory: OnceCell<P::Factory>,
    released: AtomicBool,
    stack: SessionStack<SessionOf<P>>,
}

impl<P: PersistenceProvider> PersistenceUnit<P> {
    /// Create a service for the named unit
    ///
    /// Nothing is built yet: the session factory is created on the first
    /// [`begin`](Self::begin). A missing name is reported there.
    pub fn new(provider: P, unit_name: Option<String>) -> Self {
        Self {
            provider,
            unit_name,
            factory: OnceCell::new(),
            released: AtomicBool::new(false),
            stack: SessionStack::new(),
        }
    }

    /// Create a service for the unit named in `config`
    pub fn from_config(provider: P, config: &AppConfig) -> Self {
        Self::new(provider, config.persistence.unit_name.clone())
    }

    pub fn unit_name(&self) -> Option<&str> {
        self.unit_name.as_deref()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Whether the session factory has been created
    pub fn is_initialized(&self) -> bool {
        self.factory.get().is_some()
    }

    /// Whether the calling thread is inside a transaction boundary of this unit
    pub fn is_within_transaction(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Number of boundaries the calling thread has open on this unit
    pub fn transaction_depth(&self) -> usize {
        self.stack.depth()
    }

    pub(crate) fn stack(&self) -> &SessionStack<SessionOf<P>> {
        &self.stack
    }

    /// Open a new transaction boundary on the calling thread
    ///
    /// Creates the session factory if needed, opens a session, pushes it onto
    /// the thread's stack and begins its transaction. If the factory or the
    /// session cannot be created the stack is left untouched.
    pub fn begin<E: GuardedError>(&self) -> Result<TransactionScope<'_, SessionOf<P>, E>, E> {
        let session = self
            .factory()
            .and_then(|factory| factory.create_session())
            .map_err(|e| E::from(TransactionError::Provider(e)))?;

        let session = self.stack.push(session);
        TransactionScope::open(&self.stack, session)
    }

    /// The cached session factory, created on first use
    ///
    /// Creation happens at most once across threads. A failed attempt leaves
    /// nothing cached, so the next call tries again.
    pub fn factory(&self) -> Result<&P::Factory, ProviderError> {
        self.factory.get_or_try_init(|| {
            let unit_name = self.unit_name.as_deref().ok_or_else(|| {
                ProviderError::Construction(format!(
                    "no persistence unit name configured; set the '{}' property",
                    PERSISTENCE_UNIT_NAME_PROPERTY
                ))
            })?;

            let factory = self.provider.create_factory(unit_name)?;
            crate::debug_log!("created session factory for unit '{}'", unit_name);
            Ok(factory)
        })
    }

    /// Close the session factory, if one was created
    ///
    /// Safe to call more than once; only the first call closes the factory.
    pub fn shutdown(&self) {
        let Some(factory) = self.factory.get() else {
            return;
        };
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        factory.close();
        tracing::info!(
            "closed session factory for unit '{}'",
            factory.unit_name()
        );
    }

    /// Run `work` inside this unit's transaction boundary
    ///
    /// The outermost call on a thread opens a boundary: it commits when `work`
    /// succeeds and rolls back when it fails. Calls made while a boundary is
    /// already open run `work` directly and leave the outcome to the
    /// outermost call. The error of `work` is always the one returned.
    pub fn transactional<T, E, F>(&self, work: F) -> Result<T, E>
    where
        E: GuardedError,
        F: FnOnce() -> Result<T, E>,
    {
        if self.is_within_transaction() {
            return work();
        }

        let scope = self.begin::<E>()?;
        match work() {
            Ok(value) => {
                scope.close()?;
                Ok(value)
            }
            Err(cause) => Err(scope.fail(cause)),
        }
    }
}

impl<P: PersistenceProvider> Drop for PersistenceUnit<P> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<P: PersistenceProvider> fmt::Debug for PersistenceUnit<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistenceUnit")
            .field("unit_name", &self.unit_name)
            .field("initialized", &self.is_initialized())
            .field("released", &self.released.load(Ordering::SeqCst))
            .finish()
    }
}
