//! # Fieldbook
//!
//! Schema-driven, multi-tenant business-object store for the `may` runtime.
//!
//! Every business entity (Purchase, Bill, Job, Vendor, Line, ...) is a
//! [`Resource`] whose fields are defined per account by a [`Schema`].
//! Writes go through [`ResourceStore`], which runs the derivation rules
//! (totals, due dates, production days), propagates Line totals into their
//! documents and links Resources. Listings are filtered with a restricted
//! JSON-Logic dialect compiled against the Schema.
//!
//! Storage is pluggable through [`StorageBackend`]: [`PostgresBackend`] keeps
//! one row per field value in PostgreSQL, [`MemoryBackend`] keeps everything
//! in process.
//!
//! ```no_run
//! use fieldbook::{FieldInput, MemoryBackend, ResourceStore, ResourceType, StoreConfig, TemplateId, Value};
//! use uuid::Uuid;
//!
//! let store = ResourceStore::new(MemoryBackend::new(), StoreConfig::default());
//! let account = Uuid::new_v4();
//! store.provision_account(account)?;
//! let line = store.create_resource(
//!     account,
//!     ResourceType::Line,
//!     None,
//!     vec![
//!         FieldInput::new(TemplateId::UNIT_COST, Value::number(10)),
//!         FieldInput::new(TemplateId::QUANTITY, Value::number(3)),
//!     ],
//! )?;
//! # Ok::<(), fieldbook::StoreError>(())
//! ```

pub mod backend;
pub mod config;
pub mod connection;
pub mod derivation;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod query;
pub mod resource;
pub mod schema;
pub mod store;
pub mod transaction;
pub mod value;

pub use backend::{MemoryBackend, PostgresBackend, SearchQuery, StorageBackend};
pub use config::{FieldbookConfig, StoreConfig};
pub use derivation::{DerivationEngine, Rule};
pub use error::StoreError;
pub use executor::{Executor, ExecutorError, MayPostgresExecutor};
pub use query::{compile, compile_json, JsonLogic, OrderBy, QueryError, ResourceQuery};
pub use resource::{Cost, FieldValues, FieldWriter, Patch, Resource, ResourceField, ResourceReader, ResourceUpdate};
pub use schema::{Field, FieldRef, OptionRef, ResourceType, Schema, SchemaError, TemplateId, TemplateRegistry};
pub use store::{CreateHook, FieldInput, NoopHook, ResourceLocator, ResourceStore};
pub use value::{FieldType, Value, ValueData, ValueResourceRef};
