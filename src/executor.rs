//! SQL execution over `may_postgres`.
//!
//! [`Executor`] is the seam between the PostgreSQL backend and the driver:
//! the backend renders statements, an executor runs them. Tests substitute
//! a capturing executor to inspect the generated SQL.

use may_postgres::types::ToSql;
use may_postgres::{Client, Error as PostgresError, Row};
use std::fmt;
use std::time::Instant;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// Executor error type
#[derive(Debug)]
pub enum ExecutorError {
    /// `PostgreSQL` error from `may_postgres`
    PostgresError(PostgresError),
    /// Query rendering or parameter binding error
    QueryError(String),
    /// Row decoding error
    ParseError(String),
    /// Other execution errors
    Other(String),
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorError::PostgresError(e) => write!(f, "PostgreSQL error: {e}"),
            ExecutorError::QueryError(s) => write!(f, "Query error: {s}"),
            ExecutorError::ParseError(s) => write!(f, "Parse error: {s}"),
            ExecutorError::Other(s) => write!(f, "Execution error: {s}"),
        }
    }
}

impl std::error::Error for ExecutorError {}

impl From<PostgresError> for ExecutorError {
    fn from(err: PostgresError) -> Self {
        ExecutorError::PostgresError(err)
    }
}

/// Runs SQL statements.
///
/// Implemented by [`MayPostgresExecutor`]; tests substitute recording executors.
pub trait Executor {
    /// Execute a statement and return the number of rows affected.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the statement fails.
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, ExecutorError>;

    /// Execute a query that must return exactly one row.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the query fails or does not return exactly one row.
    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, ExecutorError>;

    /// Execute a query and return all rows.
    ///
    /// # Errors
    ///
    /// Returns `ExecutorError` if the query fails.
    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecutorError>;
}

/// Executor backed directly by a `may_postgres::Client`.
pub struct MayPostgresExecutor {
    client: Client,
}

impl MayPostgresExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn timed<T>(query: &str, run: impl FnOnce() -> Result<T, PostgresError>) -> Result<T, ExecutorError> {
    #[cfg(feature = "tracing")]
    let _span = tracing_helpers::execute_query_span(query).entered();
    #[cfg(not(feature = "tracing"))]
    let _ = query;

    let start = Instant::now();
    let result = run().map_err(|e| {
        #[cfg(feature = "metrics")]
        METRICS.record_query_error();
        ExecutorError::PostgresError(e)
    });

    let duration = start.elapsed();
    #[cfg(feature = "metrics")]
    METRICS.record_query_duration(duration);
    #[cfg(not(feature = "metrics"))]
    let _ = duration;

    result
}

impl Executor for MayPostgresExecutor {
    fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, ExecutorError> {
        timed(query, || self.client.execute(query, params))
    }

    fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, ExecutorError> {
        timed(query, || self.client.query_one(query, params))
    }

    fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecutorError> {
        timed(query, || self.client.query(query, params))
    }
}
