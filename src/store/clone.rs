use super::{Cascade, FieldInput, ResourceStore};
use crate::backend::StorageBackend;
use crate::error::StoreError;
use crate::query::{CompareOp, Predicate, ResourceQuery};
use crate::resource::{Cost, Resource};
use crate::schema::{FieldRef, ResourceType, Schema, TemplateId};
use crate::value::{Scalar, Value, ValueColumn, ValueData, ValueResourceRef};
use uuid::Uuid;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

impl<B: StorageBackend> ResourceStore<B> {
    /// Copies a Resource's non-derived fields into a new Resource.
    ///
    /// A Purchase or Bill clone starts in the Draft status and gets its own
    /// copies of the source's Costs and Lines; other types are copied flat.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the source is absent or not the account's.
    pub fn clone_resource(&self, account_id: Uuid, resource_id: Uuid) -> Result<Resource, StoreError> {
        let clone = self.backend.transaction(|tx| {
            let (schema, source) = self.load_owned(tx, account_id, resource_id)?;
            #[cfg(feature = "tracing")]
            let _span = tracing_helpers::store_operation_span("clone_resource", source.resource_type.as_str()).entered();

            let mut fields = self.copied_fields(&source);
            if source.resource_type.is_document() {
                if let Some(draft) = draft_status(&schema) {
                    fields.retain(|f| f.field != draft.field);
                    fields.push(draft);
                }
            }
            let clone = self.create_in(tx, account_id, source.resource_type, None, fields, Cascade::PARENTS)?;
            if !source.resource_type.is_document() {
                return Ok(clone);
            }

            for cost in &clone.costs {
                if let Some(id) = cost.id {
                    tx.delete_cost(clone.id, id)?;
                }
            }
            for cost in &source.costs {
                tx.insert_cost(clone.id, &Cost { id: None, ..cost.clone() })?;
            }
            self.clone_lines(tx, &source, &clone)?;
            self.recalculate_subtotal(tx, clone.id, true)?;
            self.load(tx, &schema, clone.record())
        })?;

        log::info!("cloned {} {} into {} (key {})", clone.resource_type, resource_id, clone.id, clone.key);
        #[cfg(feature = "metrics")]
        METRICS.record_resource_created(clone.resource_type.as_str());
        self.hook.created(&clone);
        Ok(clone)
    }

    /// Non-empty, non-derived values of `source` except its PO number.
    fn copied_fields(&self, source: &Resource) -> Vec<FieldInput> {
        source
            .fields
            .iter()
            .filter(|f| !f.value.is_empty())
            .filter(|f| match &f.template_id {
                Some(t) => *t != TemplateId::PO_NUMBER && !self.registry.is_derived(t),
                None => true,
            })
            .map(|f| FieldInput::new(f.field_id, Value::new(f.value.data.clone())))
            .collect()
    }

    /// Clones the Lines of `source` one at a time, pointing each copy at
    /// `clone` and clearing its link to the other document type.
    fn clone_lines(&self, tx: &B, source: &Resource, clone: &Resource) -> Result<(), StoreError> {
        let (own, other) = match source.resource_type {
            ResourceType::Purchase => (TemplateId::PURCHASE, TemplateId::BILL),
            ResourceType::Bill => (TemplateId::BILL, TemplateId::PURCHASE),
            _ => return Ok(()),
        };
        let line_schema = self.schema_in(tx, source.account_id, ResourceType::Line)?;
        if !line_schema.implements([&own]) {
            return Ok(());
        }
        let own_field = line_schema.expect_field(&own).id;
        let query = ResourceQuery::all(source.account_id, ResourceType::Line).filter(Predicate {
            field_id: own_field,
            column: ValueColumn::ReferenceId,
            op: CompareOp::Eq,
            operand: Some(Scalar::Id(source.id)),
        });

        // oldest first, so the copies keep the source's key order
        let mut ids = tx.query_ids(&query)?;
        ids.reverse();
        let target: ValueResourceRef = clone.reference();
        let mut count = 0;
        for line_id in ids {
            let Some(record) = tx.read_record(line_id)? else {
                continue;
            };
            let line = self.load(tx, &line_schema, record)?;
            let mut fields: Vec<FieldInput> = self
                .copied_fields(&line)
                .into_iter()
                .filter(|f| f.field != FieldRef::Id(own_field))
                .collect();
            fields.push(FieldInput::new(own_field, Value::reference(target.clone())));
            if let Ok(other_field) = line_schema.get_field(&other) {
                fields.retain(|f| f.field != FieldRef::Id(other_field.id));
                fields.push(FieldInput::new(other_field.id, Value::new(ValueData::Resource(None))));
            }
            self.create_in(tx, source.account_id, ResourceType::Line, None, fields, Cascade::NONE)?;
            count += 1;
        }
        log::debug!("cloned {count} lines of {} {} into {}", source.resource_type, source.id, clone.id);
        Ok(())
    }
}

/// The Draft status of a document Schema, if it has one.
fn draft_status(schema: &Schema) -> Option<FieldInput> {
    [TemplateId::BILL_STATUS, TemplateId::PURCHASE_STATUS]
        .iter()
        .find_map(|status| {
            let field = schema.get_field(status).ok()?;
            let draft = schema.get_field_option(status, TemplateId::DRAFT).ok()?;
            Some(FieldInput::new(field.id, Value::option(draft.id)))
        })
}
