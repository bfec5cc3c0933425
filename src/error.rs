//! Caller-facing failures of store operations.

use crate::connection::ConnectionError;
use crate::executor::ExecutorError;
use crate::query::QueryError;
use crate::schema::{ResourceType, SchemaError};
use crate::transaction::TransactionError;
use crate::value::{FieldType, Slot};
use std::fmt;
use uuid::Uuid;

/// Store error type
#[derive(Debug)]
pub enum StoreError {
    /// Bad id or key, or a Resource owned by another account
    NotFound(String),
    /// Another Resource of the same type already holds this unique value
    DuplicateResource {
        resource_type: ResourceType,
        field: String,
        value: String,
        existing: Uuid,
    },
    /// A system field edited through a system Resource
    SystemFieldConflict { resource_id: Uuid, field: String },
    /// A Value whose slot does not fit the Field's type
    InvalidValue { field: String, field_type: FieldType, slot: Slot },
    /// An ad-hoc field or option ref that does not resolve
    Schema(SchemaError),
    /// A listing filter that does not compile
    Query(QueryError),
    /// `PostgreSQL` failure
    Executor(ExecutorError),
    /// The database could not be reached
    Connection(ConnectionError),
    /// Any other storage failure (encoding, corrupted rows)
    Storage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "Not found: {what}"),
            StoreError::DuplicateResource {
                resource_type,
                field,
                value,
                existing,
            } => write!(
                f,
                "Duplicate {resource_type}: {field} {value:?} is already used by {existing}"
            ),
            StoreError::SystemFieldConflict { resource_id, field } => {
                write!(f, "System field {field:?} of system resource {resource_id} cannot be edited")
            }
            StoreError::InvalidValue { field, field_type, slot } => {
                write!(f, "Field {field:?} of type {field_type} cannot hold a {slot} value")
            }
            StoreError::Schema(err) => write!(f, "Schema error: {err}"),
            StoreError::Query(err) => write!(f, "Query error: {err}"),
            StoreError::Executor(err) => write!(f, "Executor error: {err}"),
            StoreError::Connection(err) => write!(f, "Connection error: {err}"),
            StoreError::Storage(msg) => write!(f, "Storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Schema(err) => Some(err),
            StoreError::Query(err) => Some(err),
            StoreError::Executor(err) => Some(err),
            StoreError::Connection(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SchemaError> for StoreError {
    fn from(err: SchemaError) -> Self {
        StoreError::Schema(err)
    }
}

impl From<QueryError> for StoreError {
    fn from(err: QueryError) -> Self {
        StoreError::Query(err)
    }
}

impl From<ExecutorError> for StoreError {
    fn from(err: ExecutorError) -> Self {
        StoreError::Executor(err)
    }
}

impl From<ConnectionError> for StoreError {
    fn from(err: ConnectionError) -> Self {
        StoreError::Connection(err)
    }
}

impl From<TransactionError> for StoreError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::Executor(e) => StoreError::Executor(e),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Storage(format!("value encoding: {err}"))
    }
}

impl StoreError {
    pub fn not_found(what: impl fmt::Display) -> Self {
        StoreError::NotFound(what.to_string())
    }

    /// User-visible failures the caller can act on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_)
                | StoreError::DuplicateResource { .. }
                | StoreError::SystemFieldConflict { .. }
                | StoreError::InvalidValue { .. }
                | StoreError::Query(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_duplicate() {
        let err = StoreError::DuplicateResource {
            resource_type: ResourceType::Vendor,
            field: "Name".to_string(),
            value: "Acme".to_string(),
            existing: Uuid::nil(),
        };
        assert!(err.to_string().starts_with("Duplicate Vendor: Name \"Acme\""));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_from_query_error() {
        let err: StoreError = QueryError::UnknownField("Colour".to_string()).into();
        assert!(matches!(err, StoreError::Query(QueryError::UnknownField(_))));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_storage_errors_are_not_recoverable() {
        assert!(!StoreError::Storage("disk".to_string()).is_recoverable());
    }
}
