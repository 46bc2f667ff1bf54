//! Error types for the txscope crate
//!
//! This module contains the error returned by transaction demarcation and by
//! the delegation surface, plus the [`GuardedError`] contract that lets
//! caller-defined errors travel through a transaction boundary.

use persistence_provider::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Cannot access persistence unit from non-transactional scope")]
    OutsideTransaction,

    #[error("Persistence provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A failure whose rollback also failed
    #[error("{cause}")]
    Aborted {
        cause: Box<TransactionError>,
        suppressed: Vec<ProviderError>,
    },
}

impl TransactionError {
    /// The failure that ended the transaction, without attached rollback errors
    pub fn cause(&self) -> &TransactionError {
        match self {
            TransactionError::Aborted { cause, .. } => cause.cause(),
            other => other,
        }
    }

    /// Errors raised while rolling back after [`cause`](Self::cause)
    pub fn suppressed(&self) -> &[ProviderError] {
        match self {
            TransactionError::Aborted { suppressed, .. } => suppressed,
            _ => &[],
        }
    }
}

/// An error that can end a guarded unit of work
///
/// Transaction failures are converted into it with `From`, and a rollback that
/// fails after the work already failed is attached with
/// [`add_suppressed`](GuardedError::add_suppressed) so the original cause is
/// never masked.
pub trait GuardedError: From<TransactionError> {
    fn add_suppressed(&mut self, error: ProviderError);
}

impl GuardedError for TransactionError {
    fn add_suppressed(&mut self, error: ProviderError) {
        match self {
            TransactionError::Aborted { suppressed, .. } => suppressed.push(error),
            _ => {
                let cause = std::mem::replace(self, TransactionError::OutsideTransaction);
                *self = TransactionError::Aborted {
                    cause: Box::new(cause),
                    suppressed: vec![error],
                };
            }
        }
    }
}
