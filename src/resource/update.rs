//! A patch layered over committed values.

use super::{Cost, FieldValues, FieldWriter, Patch, Resource, ResourcePatch, ResourceReader};
use crate::schema::{FieldRef, Schema};
use crate::value::ValueData;
use uuid::Uuid;

/// The draft presented to derivation rules and to the commit step.
///
/// Getters return the patched value when the field has a patch, the
/// committed value otherwise; setters record patches.
#[derive(Debug, Clone)]
pub struct ResourceUpdate<'a> {
    reader: ResourceReader<'a>,
    patch: ResourcePatch<'a>,
}

impl<'a> ResourceUpdate<'a> {
    pub fn new(schema: &'a Schema, resource: &'a Resource) -> Self {
        Self {
            reader: ResourceReader::new(schema, resource),
            patch: ResourcePatch::new(schema),
        }
    }

    /// A draft seeded with exactly `patches`.
    pub fn with_patches(schema: &'a Schema, resource: &'a Resource, patches: Vec<Patch>) -> Self {
        Self {
            reader: ResourceReader::new(schema, resource),
            patch: ResourcePatch::with_patches(schema, patches),
        }
    }

    pub fn resource(&self) -> &'a Resource {
        self.reader.resource()
    }

    pub fn committed(&self) -> &ResourceReader<'a> {
        &self.reader
    }

    pub fn patch(&self) -> &ResourcePatch<'a> {
        &self.patch
    }

    pub fn patch_mut(&mut self) -> &mut ResourcePatch<'a> {
        &mut self.patch
    }

    pub fn costs(&self) -> &'a [Cost] {
        self.reader.costs()
    }

    pub fn costs_changed(&self) -> bool {
        self.patch.costs_changed()
    }

    pub fn mark_costs_changed(&mut self) {
        self.patch.mark_costs_changed();
    }

    pub fn has_patch(&self, field_ref: impl Into<FieldRef>) -> bool {
        self.patch.has_patch(field_ref)
    }

    pub fn has_any_patch<I>(&self, refs: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<FieldRef>,
    {
        self.patch.has_any_patch(refs)
    }

    /// Patches whose data differs from the committed value.
    pub fn changed(&self) -> impl Iterator<Item = &Patch> + '_ {
        self.patch
            .patches()
            .iter()
            .filter(|p| self.reader.data(p.field_id) != Some(&p.data))
    }

    pub fn into_patches(self) -> Vec<Patch> {
        self.patch.into_patches()
    }
}

impl FieldValues for ResourceUpdate<'_> {
    fn schema(&self) -> &Schema {
        self.reader.schema()
    }

    fn data(&self, field_id: Uuid) -> Option<&ValueData> {
        self.patch
            .data(field_id)
            .or_else(|| self.reader.data(field_id))
    }
}

impl FieldWriter for ResourceUpdate<'_> {
    fn write(&mut self, field_ref: FieldRef, data: ValueData) {
        self.patch.write(field_ref, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceRecord;
    use crate::schema::{ResourceType, TemplateId, TemplateRegistry};
    use crate::value::Value;
    use rust_decimal::Decimal;

    fn line() -> (Schema, Resource) {
        let schema = TemplateRegistry::standard().default_schema(Uuid::new_v4(), ResourceType::Line);
        let record = ResourceRecord {
            id: Uuid::new_v4(),
            account_id: schema.account_id,
            resource_type: ResourceType::Line,
            key: 1,
            template_id: None,
        };
        let unit_cost = schema.expect_field(TemplateId::UNIT_COST).id;
        let quantity = schema.expect_field(TemplateId::QUANTITY).id;
        let resource = Resource::hydrate(
            record,
            &schema,
            [(unit_cost, Value::number(4)), (quantity, Value::number(2))],
            Vec::new(),
        );
        (schema, resource)
    }

    #[test]
    fn test_patched_value_shadows_committed() {
        let (schema, resource) = line();
        let mut update = ResourceUpdate::new(&schema, &resource);
        assert_eq!(update.get_number(TemplateId::QUANTITY), Some(Some(Decimal::TWO)));
        assert!(!update.has_patch(TemplateId::QUANTITY));

        update.set_number(TemplateId::QUANTITY, Some(Decimal::from(5)));
        assert_eq!(update.get_number(TemplateId::QUANTITY), Some(Some(Decimal::from(5))));
        assert_eq!(update.get_number(TemplateId::UNIT_COST), Some(Some(Decimal::from(4))));
        assert!(update.has_patch(TemplateId::QUANTITY));
        assert_eq!(
            update.committed().get_number(TemplateId::QUANTITY),
            Some(Some(Decimal::TWO))
        );
    }

    #[test]
    fn test_patch_to_empty_shadows_committed() {
        let (schema, resource) = line();
        let mut update = ResourceUpdate::new(&schema, &resource);
        update.set_number(TemplateId::UNIT_COST, None);
        assert_eq!(update.get_number(TemplateId::UNIT_COST), Some(None));
    }

    #[test]
    fn test_changed_skips_unchanged_patches() {
        let (schema, resource) = line();
        let mut update = ResourceUpdate::new(&schema, &resource);
        update.set_number(TemplateId::UNIT_COST, Some(Decimal::from(4)));
        update.set_number(TemplateId::QUANTITY, Some(Decimal::from(3)));
        let changed: Vec<_> = update.changed().map(|p| p.field_id).collect();
        assert_eq!(changed, vec![schema.expect_field(TemplateId::QUANTITY).id]);
    }
}
