use super::{patch_from, Cascade, FieldInput, ResourceStore};
use crate::backend::StorageBackend;
use crate::error::StoreError;
use crate::query::{CompareOp, Predicate, ResourceQuery};
use crate::resource::{FieldValues, Patch, Resource, ResourceReader};
use crate::schema::{Field, FieldRef, ResourceType, Schema, TemplateId};
use crate::value::{Scalar, Value, ValueColumn, ValueData};
use uuid::Uuid;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

impl<B: StorageBackend> ResourceStore<B> {
    /// Writes caller values, derives dependent fields and propagates them.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the Resource is absent or not the account's
    /// - [`StoreError::SystemFieldConflict`] for a template field of a system Resource
    /// - [`StoreError::DuplicateResource`] when another Resource already has the name
    /// - [`StoreError::Schema`] / [`StoreError::InvalidValue`] for bad inputs
    ///
    /// Nothing is written on failure.
    pub fn update_resource(
        &self,
        account_id: Uuid,
        resource_id: Uuid,
        fields: Vec<FieldInput>,
    ) -> Result<Resource, StoreError> {
        self.backend.transaction(|tx| {
            let (schema, resource) = self.load_owned(tx, account_id, resource_id)?;
            #[cfg(feature = "tracing")]
            let _span =
                tracing_helpers::store_operation_span("update_resource", resource.resource_type.as_str()).entered();

            let mut patches = Vec::with_capacity(fields.len());
            for input in fields {
                let field = schema.get_field(input.field)?;
                if resource.template_id.is_some() && field.template_id.is_some() {
                    return Err(StoreError::SystemFieldConflict {
                        resource_id,
                        field: field.name.clone(),
                    });
                }
                Self::check_slot(field, &input.value)?;
                if field.template_id.as_ref() == Some(&TemplateId::NAME) {
                    self.check_duplicate(tx, &resource, field, &input.value)?;
                }
                patches.retain(|p: &Patch| p.field_id != field.id);
                patches.push(patch_from(field, input.value));
            }
            self.apply(tx, &schema, &resource, patches, false, Cascade::FULL)
        })
    }

    /// [`update_resource`](Self::update_resource) for a single field.
    ///
    /// # Errors
    ///
    /// As [`update_resource`](Self::update_resource).
    pub fn update_resource_field(
        &self,
        account_id: Uuid,
        resource_id: Uuid,
        field: impl Into<FieldRef>,
        value: Value,
    ) -> Result<Resource, StoreError> {
        self.update_resource(account_id, resource_id, vec![FieldInput::new(field, value)])
    }

    /// Deletes a Resource with its values and costs. Deleting a Line
    /// recalculates the documents it belonged to.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if absent or not the account's.
    pub fn delete_resource(&self, account_id: Uuid, resource_id: Uuid) -> Result<(), StoreError> {
        self.backend.transaction(|tx| {
            let (schema, resource) = self.load_owned(tx, account_id, resource_id)?;
            #[cfg(feature = "tracing")]
            let _span =
                tracing_helpers::store_operation_span("delete_resource", resource.resource_type.as_str()).entered();

            if !tx.delete_resource(resource_id)? {
                return Err(StoreError::not_found(format!("resource {resource_id}")));
            }
            log::info!("deleted {} {} (key {})", resource.resource_type, resource.id, resource.key);
            if resource.resource_type == ResourceType::Line {
                for parent in parent_ids(&schema, &resource) {
                    self.recalculate_subtotal(tx, parent, false)?;
                }
            }
            Ok(())
        })
    }

    /// Rejects a name another Resource of the same type already uses.
    fn check_duplicate(&self, tx: &B, resource: &Resource, field: &Field, value: &Value) -> Result<(), StoreError> {
        let ValueData::String(Some(name)) = &value.data else {
            return Ok(());
        };
        if name.is_empty() {
            return Ok(());
        }
        let query = ResourceQuery::all(resource.account_id, resource.resource_type).filter(Predicate {
            field_id: field.id,
            column: ValueColumn::String,
            op: CompareOp::Eq,
            operand: Some(Scalar::String(name.clone())),
        });
        match tx.query_ids(&query)?.into_iter().find(|id| *id != resource.id) {
            Some(existing) => Err(StoreError::DuplicateResource {
                resource_type: resource.resource_type,
                field: field.name.clone(),
                value: name.clone(),
                existing,
            }),
            None => Ok(()),
        }
    }
}

/// The documents a Line points at through its back-link fields.
pub(crate) fn parent_ids(schema: &Schema, line: &Resource) -> Vec<Uuid> {
    let reader = ResourceReader::new(schema, line);
    let mut parents = Vec::new();
    for link in [TemplateId::PURCHASE, TemplateId::BILL] {
        if !schema.implements([&link]) {
            continue;
        }
        if let Some(Some(reference)) = reader.get_reference(&link) {
            if !parents.contains(&reference.id) {
                parents.push(reference.id);
            }
        }
    }
    parents
}
