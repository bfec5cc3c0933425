//! Cross-resource propagation.
//!
//! Lines roll up into the `subtotalCost` of the Purchase and Bill they point
//! at; setting a Resource-typed field links the target, copying its shared
//! fields; linking a Purchase into a Bill receives the Purchase's Costs and
//! Lines.

use super::update::parent_ids;
use super::{Cascade, FieldInput, ResourceStore};
use crate::backend::StorageBackend;
use crate::error::StoreError;
use crate::query::{CompareOp, Predicate, ResourceQuery};
use crate::resource::{Cost, FieldValues, Patch, Resource, ResourceReader, ResourceRecord};
use crate::schema::{Field, FieldRef, ResourceType, Schema, TemplateId};
use crate::value::{FieldType, Scalar, Value, ValueColumn, ValueData};
use rust_decimal::Decimal;
use uuid::Uuid;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// Template fields a link never copies.
const NOT_COPIED: [TemplateId; 7] = [
    TemplateId::NAME,
    TemplateId::PO_NUMBER,
    TemplateId::BILL_STATUS,
    TemplateId::PURCHASE_STATUS,
    TemplateId::JOB_STATUS,
    TemplateId::PURCHASE,
    TemplateId::BILL,
];

impl<B: StorageBackend> ResourceStore<B> {
    /// Points `field` of a Resource at `target_id` and links the target.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if either Resource is absent or not the
    /// account's, plus the errors of [`update_resource`](Self::update_resource).
    pub fn link_resource(
        &self,
        account_id: Uuid,
        resource_id: Uuid,
        field: impl Into<FieldRef>,
        target_id: Uuid,
    ) -> Result<Resource, StoreError> {
        let target = self.read_resource(account_id, target_id)?;
        self.update_resource(
            account_id,
            resource_id,
            vec![FieldInput::new(field, Value::reference(target.reference()))],
        )
    }

    /// Effects of `changed` on other Resources, and of links on this one.
    pub(crate) fn propagate(
        &self,
        tx: &B,
        schema: &Schema,
        before: &Resource,
        changed: &[Patch],
        cascade: Cascade,
    ) -> Result<(), StoreError> {
        if cascade.parents && before.resource_type == ResourceType::Line {
            let rolls_up = [TemplateId::TOTAL_COST, TemplateId::PURCHASE, TemplateId::BILL]
                .iter()
                .filter_map(|t| schema.get_field(t).ok())
                .any(|f| changed.iter().any(|p| p.field_id == f.id));
            if rolls_up {
                let after = self.load(tx, schema, before.record())?;
                let mut parents = parent_ids(schema, before);
                for id in parent_ids(schema, &after) {
                    if !parents.contains(&id) {
                        parents.push(id);
                    }
                }
                for parent in parents {
                    self.recalculate_subtotal(tx, parent, false)?;
                }
            }
        }

        if cascade.link {
            for patch in changed {
                let ValueData::Resource(Some(target)) = &patch.data else {
                    continue;
                };
                let Ok(field) = schema.get_field(patch.field_id) else {
                    continue;
                };
                let resource = self.load(tx, schema, before.record())?;
                self.link_in(tx, schema, &resource, field, target.id)?;
            }
        }
        Ok(())
    }

    /// Sets a document's subtotal to the sum of its Lines' total costs.
    ///
    /// Missing documents and Schemas without a subtotal are skipped.
    pub(crate) fn recalculate_subtotal(&self, tx: &B, document_id: Uuid, costs_changed: bool) -> Result<(), StoreError> {
        let Some(record) = tx.read_record(document_id)? else {
            return Ok(());
        };
        let back_link = match record.resource_type {
            ResourceType::Purchase => TemplateId::PURCHASE,
            ResourceType::Bill => TemplateId::BILL,
            _ => return Ok(()),
        };
        let schema = self.schema_in(tx, record.account_id, record.resource_type)?;
        if !schema.implements([TemplateId::SUBTOTAL_COST]) {
            return Ok(());
        }
        let line_schema = self.schema_in(tx, record.account_id, ResourceType::Line)?;
        if !line_schema.implements([&back_link, &TemplateId::TOTAL_COST]) {
            return Ok(());
        }

        let total_cost = line_schema.expect_field(TemplateId::TOTAL_COST).id;
        let mut subtotal = Decimal::ZERO;
        for line in lines_of(tx, &line_schema, &back_link, &record)? {
            let values = tx.read_values(line)?;
            if let Some((_, value)) = values.iter().find(|(field, _)| *field == total_cost) {
                if let ValueData::Number(Some(amount)) = value.data {
                    subtotal += amount;
                }
            }
        }

        log::debug!("{} {} subtotal recalculated: {subtotal}", record.resource_type, record.id);
        let document = self.load(tx, &schema, record)?;
        let subtotal_field = schema.expect_field(TemplateId::SUBTOTAL_COST).id;
        let patch = Patch::new(subtotal_field, ValueData::Number(Some(subtotal)));
        self.apply(tx, &schema, &document, vec![patch], costs_changed, Cascade::NONE)?;
        Ok(())
    }

    /// Copies the target's shared fields onto `resource`; a Bill linked to a
    /// Purchase also receives the Purchase's Costs and Lines.
    fn link_in(&self, tx: &B, schema: &Schema, resource: &Resource, field: &Field, target_id: Uuid) -> Result<(), StoreError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::store_operation_span("link_resource", resource.resource_type.as_str()).entered();

        let (target_schema, target) = self.load_owned(tx, resource.account_id, target_id)?;
        let patches = self.copy_fields(schema, resource, &target_schema, &target);
        log::info!(
            "linked {} {} to {} {} through {:?} ({} fields copied)",
            resource.resource_type,
            resource.id,
            target.resource_type,
            target.id,
            field.name,
            patches.len()
        );
        let resource = if patches.is_empty() {
            resource.clone()
        } else {
            self.apply(tx, schema, resource, patches, false, Cascade::PARENTS)?
        };

        let receives = resource.resource_type == ResourceType::Bill
            && target.resource_type == ResourceType::Purchase
            && field.template_id.as_ref() == Some(&TemplateId::PURCHASE);
        if receives {
            self.receive_purchase(tx, &resource, &target)?;
        }
        Ok(())
    }

    /// Template-aligned, non-derived values of `source` for the fields of
    /// `resource` that are still empty. Options map by template, then name.
    fn copy_fields(&self, schema: &Schema, resource: &Resource, source_schema: &Schema, source: &Resource) -> Vec<Patch> {
        let mut patches = Vec::new();
        for field in schema.all_fields() {
            let Some(template_id) = &field.template_id else {
                continue;
            };
            if NOT_COPIED.contains(template_id) || self.registry.is_derived(template_id) {
                continue;
            }
            if resource.field(field.id).is_some_and(|f| !f.value.is_empty()) {
                continue;
            }
            let Ok(source_field) = source_schema.get_field(template_id) else {
                continue;
            };
            let Some(value) = source.field(source_field.id).map(|f| &f.value).filter(|v| !v.is_empty()) else {
                continue;
            };
            if value.slot() != field.field_type.slot() {
                continue;
            }
            let data = match &value.data {
                ValueData::OptionId(Some(id)) => match map_option(source_field, field, *id) {
                    Some(mapped) => ValueData::OptionId(Some(mapped)),
                    None => continue,
                },
                ValueData::OptionIds(ids) => {
                    ValueData::OptionIds(ids.iter().filter_map(|id| map_option(source_field, field, *id)).collect())
                }
                data => data.clone(),
            };
            patches.push(Patch::new(field.id, data));
        }
        patches
    }

    /// Replaces the Bill's Costs with the Purchase's, points the Purchase's
    /// Lines at the Bill and recalculates every affected Bill.
    fn receive_purchase(&self, tx: &B, bill: &Resource, purchase: &Resource) -> Result<(), StoreError> {
        for cost in &bill.costs {
            if let Some(id) = cost.id {
                tx.delete_cost(bill.id, id)?;
            }
        }
        for cost in &purchase.costs {
            tx.insert_cost(bill.id, &Cost { id: None, ..cost.clone() })?;
        }

        let mut former_bills = Vec::new();
        let line_schema = self.schema_in(tx, bill.account_id, ResourceType::Line)?;
        if line_schema.implements([TemplateId::PURCHASE, TemplateId::BILL]) {
            let bill_link = line_schema.expect_field(TemplateId::BILL).id;
            for line_id in lines_of(tx, &line_schema, &TemplateId::PURCHASE, &purchase.record())? {
                let Some(record) = tx.read_record(line_id)? else {
                    continue;
                };
                let line = self.load(tx, &line_schema, record)?;
                let current = ResourceReader::new(&line_schema, &line).get_reference(TemplateId::BILL);
                if let Some(Some(former)) = current {
                    if former.id == bill.id {
                        continue;
                    }
                    if !former_bills.contains(&former.id) {
                        former_bills.push(former.id);
                    }
                }
                let patch = Patch::new(bill_link, ValueData::Resource(Some(bill.reference())));
                self.apply(tx, &line_schema, &line, vec![patch], false, Cascade::NONE)?;
            }
        }
        log::info!("bill {} received purchase {}", bill.id, purchase.id);

        self.recalculate_subtotal(tx, bill.id, true)?;
        for former in former_bills {
            self.recalculate_subtotal(tx, former, false)?;
        }
        Ok(())
    }
}

/// Ids of the Lines whose `back_link` field points at `document`.
fn lines_of(
    tx: &impl StorageBackend,
    line_schema: &Schema,
    back_link: &TemplateId,
    document: &ResourceRecord,
) -> Result<Vec<Uuid>, StoreError> {
    let link = line_schema.expect_field(back_link);
    debug_assert_eq!(link.field_type, FieldType::Resource);
    let query = ResourceQuery::all(document.account_id, ResourceType::Line).filter(Predicate {
        field_id: link.id,
        column: ValueColumn::ReferenceId,
        op: CompareOp::Eq,
        operand: Some(Scalar::Id(document.id)),
    });
    tx.query_ids(&query)
}

/// The option of `to` matching option `id` of `from`.
fn map_option(from: &Field, to: &Field, id: Uuid) -> Option<Uuid> {
    let option = from.options.iter().find(|o| o.id == id)?;
    to.options
        .iter()
        .find(|o| match (&o.template_id, &option.template_id) {
            (Some(a), Some(b)) => a == b,
            _ => o.name == option.name,
        })
        .map(|o| o.id)
}
