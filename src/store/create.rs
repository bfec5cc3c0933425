use super::{patch_from, Cascade, FieldInput, ResourceStore};
use crate::backend::StorageBackend;
use crate::error::StoreError;
use crate::resource::{Cost, Patch, Resource};
use crate::schema::{ResourceType, Schema, TemplateId};
use crate::value::{FieldType, Value, ValueData};
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

impl<B: StorageBackend> ResourceStore<B> {
    /// Creates a Resource with the next key of its account and type.
    ///
    /// Every Schema field is materialized. A field takes the caller's value,
    /// else its default, else the value of the system resource `template_id`
    /// names. Every Resource starts with one zero percentage Cost row, and a
    /// Purchase without a PO number gets its key as PO number.
    ///
    /// # Errors
    ///
    /// [`StoreError::Schema`] for a field ref that does not resolve,
    /// [`StoreError::InvalidValue`] for a value of the wrong type, and any
    /// storage failure. Nothing is written on failure.
    pub fn create_resource(
        &self,
        account_id: Uuid,
        resource_type: ResourceType,
        template_id: Option<TemplateId>,
        fields: Vec<FieldInput>,
    ) -> Result<Resource, StoreError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::store_operation_span("create_resource", resource_type.as_str()).entered();

        let resource = self.backend.transaction(|tx| {
            self.create_in(tx, account_id, resource_type, template_id.as_ref(), fields, Cascade::FULL)
        })?;
        log::info!("created {} {} (key {})", resource.resource_type, resource.id, resource.key);
        #[cfg(feature = "metrics")]
        METRICS.record_resource_created(resource_type.as_str());
        self.hook.created(&resource);
        Ok(resource)
    }

    pub(crate) fn create_in(
        &self,
        tx: &B,
        account_id: Uuid,
        resource_type: ResourceType,
        template_id: Option<&TemplateId>,
        fields: Vec<FieldInput>,
        cascade: Cascade,
    ) -> Result<Resource, StoreError> {
        let schema = self.schema_in(tx, account_id, resource_type)?;

        let mut supplied = HashMap::new();
        for input in fields {
            let field = schema.get_field(input.field)?;
            Self::check_slot(field, &input.value)?;
            supplied.insert(field.id, patch_from(field, input.value));
        }

        let record = tx.insert_resource(account_id, resource_type, template_id)?;
        let mut patches = self.initial_values(&schema, template_id, supplied);
        if resource_type == ResourceType::Purchase && schema.implements([TemplateId::PO_NUMBER]) {
            let po_number = schema.expect_field(TemplateId::PO_NUMBER).id;
            let missing = patches
                .iter()
                .find(|p| p.field_id == po_number)
                .map_or(true, |p| p.data.is_empty());
            if missing {
                patches.retain(|p| p.field_id != po_number);
                patches.push(Patch::new(po_number, ValueData::String(Some(record.key.to_string()))));
            }
        }

        for field in schema.all_fields() {
            if !patches.iter().any(|p| p.field_id == field.id) {
                tx.upsert_value(record.id, field.id, &Value::empty(field.field_type))?;
            }
        }
        tx.insert_cost(record.id, &Cost::new(self.config.default_cost_name.clone(), true, 0))?;

        let resource = self.load(tx, &schema, record)?;
        let resource = self.apply(tx, &schema, &resource, patches, true, cascade)?;
        warn_required(&schema, &resource);
        Ok(resource)
    }

    /// The non-empty starting value of every field, in Schema order.
    fn initial_values(
        &self,
        schema: &Schema,
        template_id: Option<&TemplateId>,
        mut supplied: HashMap<Uuid, Patch>,
    ) -> Vec<Patch> {
        let system = template_id.and_then(|id| self.registry.resource(id));
        let today = Utc::now().date_naive();

        schema
            .all_fields()
            .filter_map(|field| {
                if let Some(patch) = supplied.remove(&field.id) {
                    return Some(patch);
                }
                if let Some(default) = field.default_value.as_ref().filter(|v| !v.is_empty()) {
                    if default.slot() == field.field_type.slot() {
                        return Some(Patch::new(field.id, default.data.clone()));
                    }
                }
                if field.default_to_today && field.field_type == FieldType::Date {
                    return Some(Patch::new(field.id, ValueData::Date(Some(today))));
                }
                let template_id = field.template_id.as_ref()?;
                system?
                    .values
                    .iter()
                    .find(|(id, value)| id == template_id && value.slot() == field.field_type.slot())
                    .map(|(_, value)| Patch::new(field.id, value.data.clone()))
            })
            .collect()
    }
}

fn warn_required(schema: &Schema, resource: &Resource) {
    for field in schema.all_fields().filter(|f| f.is_required) {
        if resource.field(field.id).map_or(true, |f| f.value.is_empty()) {
            log::warn!(
                "{} {} created without required field {:?}",
                resource.resource_type,
                resource.id,
                field.name
            );
        }
    }
}
