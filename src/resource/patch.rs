//! Uncommitted field writes.

use super::{FieldValues, FieldWriter, Patch};
use crate::schema::{Field, FieldRef, Schema};
use crate::value::ValueData;
use uuid::Uuid;

/// An ordered set of [`Patch`]es over one Schema, at most one per field.
#[derive(Debug, Clone)]
pub struct ResourcePatch<'a> {
    schema: &'a Schema,
    patches: Vec<Patch>,
    costs_changed: bool,
}

impl<'a> ResourcePatch<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            patches: Vec::new(),
            costs_changed: false,
        }
    }

    /// Seeds the patch with already-built patches (e.g. a caller's batch).
    pub fn with_patches(schema: &'a Schema, patches: Vec<Patch>) -> Self {
        let mut patch = Self::new(schema);
        for p in patches {
            patch.push(p);
        }
        patch
    }

    /// Adds `patch`, replacing an earlier patch of the same field.
    pub fn push(&mut self, patch: Patch) {
        match self.patches.iter_mut().find(|p| p.field_id == patch.field_id) {
            Some(existing) => *existing = patch,
            None => self.patches.push(patch),
        }
    }

    /// Records `data` for an already-resolved field.
    ///
    /// # Panics
    ///
    /// Panics if `data` does not fit the field's type.
    pub fn set_field(&mut self, field: &Field, data: ValueData) {
        assert_eq!(
            field.field_type.slot(),
            data.slot(),
            "field {:?} is {}, cannot hold {} data",
            field.name,
            field.field_type,
            data.slot()
        );
        self.push(Patch::new(field.id, data));
    }

    pub fn has_patch(&self, field_ref: impl Into<FieldRef>) -> bool {
        match self.schema.get_field(field_ref) {
            Ok(field) => self.patch_for(field.id).is_some(),
            Err(_) => false,
        }
    }

    pub fn has_any_patch<I>(&self, refs: I) -> bool
    where
        I: IntoIterator,
        I::Item: Into<FieldRef>,
    {
        refs.into_iter().any(|r| self.has_patch(r))
    }

    pub fn patch_for(&self, field_id: Uuid) -> Option<&Patch> {
        self.patches.iter().find(|p| p.field_id == field_id)
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn into_patches(self) -> Vec<Patch> {
        self.patches
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty() && !self.costs_changed
    }

    /// Marks the resource's cost rows as changed in this batch.
    pub fn mark_costs_changed(&mut self) {
        self.costs_changed = true;
    }

    pub fn costs_changed(&self) -> bool {
        self.costs_changed
    }
}

impl FieldValues for ResourcePatch<'_> {
    fn schema(&self) -> &Schema {
        self.schema
    }

    fn data(&self, field_id: Uuid) -> Option<&ValueData> {
        self.patch_for(field_id).map(|p| &p.data)
    }
}

impl FieldWriter for ResourcePatch<'_> {
    fn write(&mut self, field_ref: FieldRef, data: ValueData) {
        let schema = self.schema;
        self.set_field(schema.expect_field(field_ref), data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ResourceType, TemplateId, TemplateRegistry};
    use rust_decimal::Decimal;

    fn line_schema() -> Schema {
        TemplateRegistry::standard().default_schema(Uuid::new_v4(), ResourceType::Line)
    }

    #[test]
    fn test_set_replaces_existing_patch() {
        let schema = line_schema();
        let mut patch = ResourcePatch::new(&schema);
        patch.set_number(TemplateId::QUANTITY, Some(Decimal::ONE));
        patch.set_number(TemplateId::QUANTITY, Some(Decimal::TWO));
        assert_eq!(patch.patches().len(), 1);
        assert_eq!(patch.get_number(TemplateId::QUANTITY), Some(Some(Decimal::TWO)));
    }

    #[test]
    fn test_three_states() {
        let schema = line_schema();
        let mut patch = ResourcePatch::new(&schema);
        assert_eq!(patch.get_number(TemplateId::UNIT_COST), None);
        patch.set_number(TemplateId::UNIT_COST, None);
        assert_eq!(patch.get_number(TemplateId::UNIT_COST), Some(None));
        assert!(patch.has_patch(TemplateId::UNIT_COST));
        assert!(patch.has_any_patch([TemplateId::QUANTITY, TemplateId::UNIT_COST]));
        assert!(!patch.has_any_patch([TemplateId::QUANTITY, TemplateId::HOURS]));
    }

    #[test]
    #[should_panic(expected = "not readable as string")]
    fn test_mismatched_getter_panics() {
        let schema = line_schema();
        ResourcePatch::new(&schema).get_string(TemplateId::QUANTITY);
    }

    #[test]
    #[should_panic(expected = "Field not found")]
    fn test_setter_on_missing_template_field_panics() {
        let schema = line_schema();
        ResourcePatch::new(&schema).set_number(TemplateId::HOURS, None);
    }
}
