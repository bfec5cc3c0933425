//! Resource store
//!
//! [`ResourceStore`] is the caller-facing surface: it creates, reads,
//! updates, deletes, clones and links Resources, runs the
//! [`DerivationEngine`] over every write and propagates derived values
//! across Resource links. Every public operation runs in exactly one
//! backend transaction; the helpers it calls take the transaction handle
//! and never open another.
//!
//! ## Modules
//!
//! - **`create`** - `create_resource` and field materialization
//! - **`update`** - `update_resource`, `update_resource_field`, `delete_resource`
//! - **`cascade`** - parent subtotal recalculation and `link_resource`
//! - **`clone`** - `clone_resource` with Lines and Costs
//! - **`find`** - `find_resources`, `read_resources`
//! - **`costs`** - Cost row CRUD
//! - **`schema`** - account provisioning and Schema edits

mod cascade;
mod clone;
mod costs;
mod create;
mod find;
mod schema;
mod update;

use crate::backend::StorageBackend;
use crate::config::StoreConfig;
use crate::derivation::DerivationEngine;
use crate::error::StoreError;
use crate::resource::{Patch, Resource, ResourceRecord, ResourceUpdate};
use crate::schema::{Field, FieldRef, ResourceType, Schema, TemplateRegistry};
use crate::value::Value;
use uuid::Uuid;

/// Receives every Resource after its creation commits.
///
/// Document-content extraction of new Bills plugs in here.
pub trait CreateHook: Send + Sync {
    fn created(&self, resource: &Resource);
}

/// The hook used when none is installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHook;

impl CreateHook for NoopHook {
    fn created(&self, _resource: &Resource) {}
}

/// How a caller names a Resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceLocator {
    Id(Uuid),
    Key { resource_type: ResourceType, key: i64 },
}

impl From<Uuid> for ResourceLocator {
    fn from(id: Uuid) -> Self {
        ResourceLocator::Id(id)
    }
}

/// One caller-supplied field value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldInput {
    pub field: FieldRef,
    pub value: Value,
}

impl FieldInput {
    pub fn new(field: impl Into<FieldRef>, value: Value) -> Self {
        Self {
            field: field.into(),
            value,
        }
    }
}

/// Which cross-resource effects a write may trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cascade {
    /// Setting a Resource-typed field links the target
    pub link: bool,
    /// Line writes recalculate the parent documents
    pub parents: bool,
}

impl Cascade {
    pub(crate) const FULL: Cascade = Cascade { link: true, parents: true };
    pub(crate) const PARENTS: Cascade = Cascade { link: false, parents: true };
    pub(crate) const NONE: Cascade = Cascade { link: false, parents: false };
}

pub struct ResourceStore<B: StorageBackend> {
    backend: B,
    config: StoreConfig,
    registry: TemplateRegistry,
    engine: DerivationEngine,
    hook: Box<dyn CreateHook>,
}

impl<B: StorageBackend> ResourceStore<B> {
    /// A store over `backend` with the standard template catalog.
    pub fn new(backend: B, config: StoreConfig) -> Self {
        let engine = DerivationEngine::new(config.hours_per_production_day);
        Self {
            backend,
            config,
            registry: TemplateRegistry::standard(),
            engine,
            hook: Box::new(NoopHook),
        }
    }

    pub fn with_registry(mut self, registry: TemplateRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_hook(mut self, hook: impl CreateHook + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Reads a Resource by id or by type and key.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if absent or owned by another account.
    pub fn read_resource(&self, account_id: Uuid, locator: impl Into<ResourceLocator>) -> Result<Resource, StoreError> {
        let locator = locator.into();
        self.backend.transaction(|tx| {
            let record = match &locator {
                ResourceLocator::Id(id) => tx.read_record(*id)?,
                ResourceLocator::Key { resource_type, key } => {
                    tx.read_record_by_key(account_id, *resource_type, *key)?
                }
            };
            let record = owned(record, account_id, || format!("resource {locator:?}"))?;
            let schema = self.schema_in(tx, account_id, record.resource_type)?;
            self.load(tx, &schema, record)
        })
    }

    /// The Schema of `resource_type` in the account.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the account was never provisioned.
    pub fn read_schema(&self, account_id: Uuid, resource_type: ResourceType) -> Result<Schema, StoreError> {
        self.backend.transaction(|tx| self.schema_in(tx, account_id, resource_type))
    }

    pub(crate) fn schema_in(&self, tx: &B, account_id: Uuid, resource_type: ResourceType) -> Result<Schema, StoreError> {
        tx.read_schema(account_id, resource_type)?
            .ok_or_else(|| StoreError::not_found(format!("{resource_type} schema of account {account_id}")))
    }

    /// Hydrates a stored record with its values and costs.
    pub(crate) fn load(&self, tx: &B, schema: &Schema, record: ResourceRecord) -> Result<Resource, StoreError> {
        let values = tx.read_values(record.id)?;
        let costs = tx.read_costs(record.id)?;
        Ok(Resource::hydrate(record, schema, values, costs))
    }

    /// Loads a Resource of the account together with its Schema.
    pub(crate) fn load_owned(&self, tx: &B, account_id: Uuid, resource_id: Uuid) -> Result<(Schema, Resource), StoreError> {
        let record = owned(tx.read_record(resource_id)?, account_id, || format!("resource {resource_id}"))?;
        let schema = self.schema_in(tx, account_id, record.resource_type)?;
        let resource = self.load(tx, &schema, record)?;
        Ok((schema, resource))
    }

    /// Runs the derivation rules over `patches`, persists the result and
    /// propagates it. Returns the Resource as stored afterwards.
    pub(crate) fn apply(
        &self,
        tx: &B,
        schema: &Schema,
        resource: &Resource,
        patches: Vec<Patch>,
        costs_changed: bool,
        cascade: Cascade,
    ) -> Result<Resource, StoreError> {
        let mut draft = ResourceUpdate::with_patches(schema, resource, patches);
        if costs_changed {
            draft.mark_costs_changed();
        }
        self.engine.run(&mut draft);
        let changed: Vec<Patch> = draft.changed().cloned().collect();
        for patch in draft.into_patches() {
            tx.upsert_value(resource.id, patch.field_id, &patch.into_value())?;
        }

        if !changed.is_empty() {
            self.propagate(tx, schema, resource, &changed, cascade)?;
        }
        self.load(tx, schema, resource.record())
    }

    /// Checks a caller value against its Field's type.
    pub(crate) fn check_slot(field: &Field, value: &Value) -> Result<(), StoreError> {
        if value.slot() == field.field_type.slot() {
            Ok(())
        } else {
            Err(StoreError::InvalidValue {
                field: field.name.clone(),
                field_type: field.field_type,
                slot: value.slot(),
            })
        }
    }
}

/// Accepts a record only if the account owns it.
fn owned(
    record: Option<ResourceRecord>,
    account_id: Uuid,
    what: impl FnOnce() -> String,
) -> Result<ResourceRecord, StoreError> {
    match record {
        Some(record) if record.account_id == account_id => Ok(record),
        _ => Err(StoreError::NotFound(what())),
    }
}

/// The patch a caller value becomes; its timestamp is kept when set.
fn patch_from(field: &Field, value: Value) -> Patch {
    let mut patch = Patch::new(field.id, value.data);
    if let Some(updated_at) = value.updated_at {
        patch.timestamp = updated_at;
    }
    patch
}
