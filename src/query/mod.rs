//! Resource listing queries
//!
//! ## Modules
//!
//! - **`json_logic`** - the filter AST and its parser
//! - **`compiler`** - resolution against a Schema into a [`ResourceQuery`]
//! - **`sql`** - PostgreSQL rendering of a [`ResourceQuery`] through `sea-query`
//! - **`similarity`** - trigram similarity used by resource search

pub mod compiler;
pub mod json_logic;
pub mod similarity;
pub mod sql;

pub use compiler::{compile, compile_json, OrderTerm, Predicate, ResourceQuery};
pub use json_logic::{CompareOp, Direction, JsonLogic, Literal, OrderBy};

use crate::value::FieldType;
use std::fmt;

/// Compile-time failures of a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The expression is not of the accepted shape
    Malformed(String),
    /// An operator outside `==`, `!=`, `<`, `>=`, `and`
    UnsupportedOperator(String),
    /// A `var` names no Field of the Schema
    UnknownField(String),
    /// The Field's type has no comparable column
    UnsupportedFieldType { field: String, field_type: FieldType },
    /// The literal does not fit the Field's type
    TypeMismatch { field: String, field_type: FieldType, literal: String },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Malformed(s) => write!(f, "Malformed filter: {s}"),
            QueryError::UnsupportedOperator(op) => write!(f, "Unsupported operator: {op}"),
            QueryError::UnknownField(name) => write!(f, "Unknown field: {name:?}"),
            QueryError::UnsupportedFieldType { field, field_type } => {
                write!(f, "Field {field:?} of type {field_type} cannot be filtered or sorted")
            }
            QueryError::TypeMismatch { field, field_type, literal } => {
                write!(f, "Literal {literal} does not match field {field:?} of type {field_type}")
            }
        }
    }
}

impl std::error::Error for QueryError {}
