//! Storage backends
//!
//! The store reaches storage only through [`StorageBackend`]: point reads and
//! upserts of a Resource's values, atomic key allocation per account and
//! type, execution of compiled [`ResourceQuery`]s, and Cost row CRUD.
//!
//! ## Modules
//!
//! - **`memory`** - in-process backend for tests and embedders
//! - **`postgres`** - EAV tables on PostgreSQL through an [`Executor`](crate::executor::Executor)
//! - **`ddl`** - `CREATE TABLE` statements of the PostgreSQL layout

pub mod ddl;
pub mod memory;
pub mod postgres;

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;

use crate::error::StoreError;
use crate::query::ResourceQuery;
use crate::resource::{Cost, ResourceRecord};
use crate::schema::{ResourceType, Schema, TemplateId};
use crate::value::Value;
use uuid::Uuid;

/// Parameters of a name / PO-number lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub account_id: Uuid,
    pub resource_type: ResourceType,
    /// Text fields searched; a resource matches through any of them
    pub field_ids: Vec<Uuid>,
    pub input: String,
    /// Case-insensitive equality instead of similarity
    pub exact: bool,
    /// Minimum trigram similarity of a fuzzy match
    pub threshold: f64,
    pub limit: usize,
}

/// Transactional storage of Schemas, Resources, Values and Costs.
///
/// Every method is synchronous; on the `may` runtime a blocking call parks
/// the coroutine, not the thread.
pub trait StorageBackend: Send + Sync {
    /// Runs `f` atomically: if it returns an error, every write made inside
    /// it is rolled back.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or the backend's failure to begin or commit.
    fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnOnce(&Self) -> Result<T, StoreError>;

    fn read_schema(&self, account_id: Uuid, resource_type: ResourceType) -> Result<Option<Schema>, StoreError>;

    /// Inserts or replaces the Schema of its account and type.
    fn save_schema(&self, schema: &Schema) -> Result<(), StoreError>;

    /// Inserts a Resource row with `key = max(key) + 1` for its account and
    /// type. Concurrent inserts of the same account and type never share a key.
    fn insert_resource(
        &self,
        account_id: Uuid,
        resource_type: ResourceType,
        template_id: Option<&TemplateId>,
    ) -> Result<ResourceRecord, StoreError>;

    fn read_record(&self, id: Uuid) -> Result<Option<ResourceRecord>, StoreError>;

    fn read_record_by_key(
        &self,
        account_id: Uuid,
        resource_type: ResourceType,
        key: i64,
    ) -> Result<Option<ResourceRecord>, StoreError>;

    /// Deletes a Resource with its values and costs. Returns false if absent.
    fn delete_resource(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Stored values of a Resource keyed by field id.
    fn read_values(&self, resource_id: Uuid) -> Result<Vec<(Uuid, Value)>, StoreError>;

    fn upsert_value(&self, resource_id: Uuid, field_id: Uuid, value: &Value) -> Result<(), StoreError>;

    /// Cost rows of a Resource in insertion order.
    fn read_costs(&self, resource_id: Uuid) -> Result<Vec<Cost>, StoreError>;

    /// Appends a cost row; the returned Cost carries its new id.
    fn insert_cost(&self, resource_id: Uuid, cost: &Cost) -> Result<Cost, StoreError>;

    /// Replaces the row with `cost.id`. Returns false if absent.
    fn update_cost(&self, resource_id: Uuid, cost: &Cost) -> Result<bool, StoreError>;

    fn delete_cost(&self, resource_id: Uuid, cost_id: Uuid) -> Result<bool, StoreError>;

    /// Ids of the Resources matching every predicate, in query order.
    fn query_ids(&self, query: &ResourceQuery) -> Result<Vec<Uuid>, StoreError>;

    /// Ids of matching Resources, best match first.
    fn search(&self, query: &SearchQuery) -> Result<Vec<Uuid>, StoreError>;
}
