//! Transaction control over any [`Executor`].
//!
//! A [`Transaction`] issues `BEGIN` / `COMMIT` / `ROLLBACK` on the executor it
//! borrows. Statements run on that executor while the transaction is open
//! belong to it.

use crate::executor::{Executor, ExecutorError};
use std::fmt;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Transaction error type
#[derive(Debug)]
pub enum TransactionError {
    /// Failure of a transaction control statement
    Executor(ExecutorError),
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionError::Executor(e) => write!(f, "Transaction error: {e}"),
        }
    }
}

impl std::error::Error for TransactionError {}

impl From<ExecutorError> for TransactionError {
    fn from(err: ExecutorError) -> Self {
        TransactionError::Executor(err)
    }
}

/// An open transaction; consumed by [`commit`](Self::commit) or
/// [`rollback`](Self::rollback).
pub struct Transaction<'e, E: Executor + ?Sized> {
    executor: &'e E,
}

impl<'e, E: Executor + ?Sized> Transaction<'e, E> {
    /// Begin a transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError` if `BEGIN` fails.
    pub fn begin(executor: &'e E) -> Result<Self, TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::begin_transaction_span().entered();

        executor.execute("BEGIN", &[])?;
        Ok(Self { executor })
    }

    /// Commit the transaction.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError` if `COMMIT` fails.
    pub fn commit(self) -> Result<(), TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::commit_transaction_span().entered();

        self.executor.execute("COMMIT", &[])?;
        Ok(())
    }

    /// Roll the transaction back.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError` if `ROLLBACK` fails.
    pub fn rollback(self) -> Result<(), TransactionError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::rollback_transaction_span().entered();

        self.executor.execute("ROLLBACK", &[])?;
        Ok(())
    }
}
