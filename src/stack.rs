//! Thread-scoped session stacks
//!
//! Each [`SessionStack`] owns one slot in a thread-local map. A thread only
//! ever sees the sessions it pushed itself, so lookups take no locks. The
//! most recently pushed session is the one data access goes to.

use crate::errors::TransactionError;
use persistence_provider::Session;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STACK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static STACKS: RefCell<HashMap<u64, Vec<Rc<dyn Any>>>> = RefCell::new(HashMap::new());
}

/// Per-thread stack of open sessions for one persistence unit
///
/// The stack itself is shared freely between threads; the sessions it holds
/// never leave the thread that pushed them.
pub struct SessionStack<S> {
    id: u64,
    _session: PhantomData<fn() -> S>,
}

impl<S: Session> SessionStack<S> {
    pub fn new() -> Self {
        Self {
            id: NEXT_STACK_ID.fetch_add(1, Ordering::Relaxed),
            _session: PhantomData,
        }
    }

    /// True when the calling thread has no open boundary on this stack
    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Number of sessions the calling thread has pushed and not yet detached
    pub fn depth(&self) -> usize {
        STACKS.with(|stacks| stacks.borrow().get(&self.id).map_or(0, Vec::len))
    }

    /// Push a freshly created session and return the shared handle to it
    pub fn push(&self, session: S) -> Rc<S> {
        let session = Rc::new(session);
        let entry: Rc<dyn Any> = session.clone();
        STACKS.with(|stacks| {
            stacks
                .borrow_mut()
                .entry(self.id)
                .or_default()
                .push(entry)
        });
        crate::trace_log!("pushed session on stack {} (depth {})", self.id, self.depth());
        session
    }

    /// Session of the innermost open boundary on the calling thread
    pub fn peek(&self) -> Result<Rc<S>, TransactionError> {
        let top = STACKS.with(|stacks| {
            stacks
                .borrow()
                .get(&self.id)
                .and_then(|entries| entries.last().cloned())
        });

        top.and_then(|entry| entry.downcast::<S>().ok())
            .ok_or(TransactionError::OutsideTransaction)
    }

    /// Pop the top of the stack and close `session`
    ///
    /// If the top is not `session` the stack was unwound out of order; the
    /// anomaly is logged and `session` is still closed so it cannot leak.
    /// Close failures are logged, never returned.
    pub fn detach(&self, session: &Rc<S>) {
        let popped = STACKS.with(|stacks| {
            let mut stacks = stacks.borrow_mut();
            let entries = stacks.get_mut(&self.id)?;
            let popped = entries.pop();
            if entries.is_empty() {
                stacks.remove(&self.id);
            }
            popped
        });

        match popped {
            Some(top) if same_session(&top, session) => {
                crate::trace_log!("detached session from stack {}", self.id);
            }
            Some(_) => {
                tracing::warn!(
                    "session stack {} unwound out of order; closing detached session directly",
                    self.id
                );
            }
            None => {
                tracing::warn!(
                    "session stack {} was empty on detach; closing session directly",
                    self.id
                );
            }
        }

        if let Err(e) = session.close() {
            tracing::warn!("failed to close session detached from stack {}: {}", self.id, e);
        }
    }
}

fn same_session<S: 'static>(entry: &Rc<dyn Any>, session: &Rc<S>) -> bool {
    Rc::as_ptr(entry) as *const () == Rc::as_ptr(session) as *const ()
}

impl<S: Session> Default for SessionStack<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for SessionStack<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStack").field("id", &self.id).finish()
    }
}
