//! Transaction scope
//!
//! A [`TransactionScope`] guards one open transaction boundary. It begins the
//! transaction when it is opened and, when closed, commits, rolls back or
//! propagates depending on whether a cause was recorded. Either way the
//! session is detached from the thread's stack exactly once.

use crate::errors::{GuardedError, TransactionError};
use crate::stack::SessionStack;
use persistence_provider::{Session, TransactionHandle};
use std::rc::Rc;

/// Pops the scope's session off the thread's stack
struct Detach<'a, S: Session> {
    stack: &'a SessionStack<S>,
    session: Rc<S>,
}

impl<S: Session> Detach<'_, S> {
    fn run(self) {
        self.stack.detach(&self.session);
    }
}

/// Single-use guard for the outermost transaction boundary on a thread
///
/// `E` is the error the guarded work fails with. The scope holds an `Rc` to
/// its session, so it cannot leave the thread that opened it.
///
/// Dropping a scope without calling [`close`](Self::close) or
/// [`fail`](Self::fail), as happens when guarded work panics, rolls back an
/// active transaction and detaches the session.
pub struct TransactionScope<'a, S: Session, E = TransactionError> {
    transaction: S::Transaction,
    detach: Option<Detach<'a, S>>,
    cause: Option<E>,
}

impl<'a, S: Session, E: GuardedError> TransactionScope<'a, S, E> {
    /// Begin a transaction on a session already pushed onto `stack`
    ///
    /// If the transaction cannot begin, the session is detached (and closed)
    /// before the error is returned.
    pub fn open(stack: &'a SessionStack<S>, session: Rc<S>) -> Result<Self, E> {
        let transaction = session.transaction();
        if let Err(e) = transaction.begin() {
            stack.detach(&session);
            return Err(E::from(TransactionError::Provider(e)));
        }
        crate::debug_log!("began transaction");

        Ok(Self {
            transaction,
            detach: Some(Detach { stack, session }),
            cause: None,
        })
    }

    /// Record the failure of the guarded work; a later cause replaces an earlier one
    pub fn init_cause(&mut self, cause: E) {
        self.cause = Some(cause);
    }

    pub fn has_cause(&self) -> bool {
        self.cause.is_some()
    }

    /// Session this scope's transaction runs on
    pub fn session(&self) -> Option<&S> {
        self.detach.as_ref().map(|detach| detach.session.as_ref())
    }

    /// Close the boundary
    ///
    /// | transaction | cause | outcome                                   |
    /// |-------------|-------|-------------------------------------------|
    /// | active      | none  | commit; a commit failure is returned      |
    /// | active      | some  | rollback; the cause is returned           |
    /// | inactive    | some  | the cause is returned                     |
    /// | inactive    | none  | `Ok(())`                                  |
    ///
    /// A failed rollback is attached to the cause as a suppressed error.
    pub fn close(mut self) -> Result<(), E> {
        let result = match self.cause.take() {
            Some(cause) => Err(self.roll_back(cause)),
            None => self.commit(),
        };
        self.run_detach();
        result
    }

    /// Close the boundary on behalf of failed work, yielding the error to propagate
    pub fn fail(mut self, cause: E) -> E {
        self.cause = None;
        let cause = self.roll_back(cause);
        self.run_detach();
        cause
    }

    fn commit(&self) -> Result<(), E> {
        if !self.transaction.is_active() {
            return Ok(());
        }
        self.transaction
            .commit()
            .map_err(|e| E::from(TransactionError::Provider(e)))?;
        crate::debug_log!("committed transaction");
        Ok(())
    }

    fn roll_back(&self, mut cause: E) -> E {
        if self.transaction.is_active() {
            match self.transaction.rollback() {
                Ok(()) => {
                    crate::debug_log!("rolled back transaction");
                }
                Err(e) => cause.add_suppressed(e),
            }
        }
        cause
    }
}

impl<S: Session, E> TransactionScope<'_, S, E> {
    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach.run();
        }
    }
}

impl<S: Session, E> Drop for TransactionScope<'_, S, E> {
    fn drop(&mut self) {
        if self.detach.is_none() {
            return;
        }

        if self.transaction.is_active() {
            match self.transaction.rollback() {
                Ok(()) => tracing::warn!("transaction scope dropped without close; rolled back"),
                Err(e) => tracing::warn!(
                    "transaction scope dropped without close; rollback failed: {}",
                    e
                ),
            }
        }
        self.run_detach();
    }
}
