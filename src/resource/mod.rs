//! Resources and their layered field views
//!
//! A [`Resource`] holds one [`ResourceField`] per Field of its Schema. Field
//! values are read and written through three views sharing one accessor
//! surface ([`FieldValues`]):
//!
//! - [`ResourceReader`] - the committed values
//! - [`ResourcePatch`] - uncommitted writes ([`Patch`]es)
//! - [`ResourceUpdate`] - a patch layered over a reader: patched value if
//!   present, committed value otherwise
//!
//! Every getter returns a double option: `None` when the field is not
//! materialized (or not in the Schema), `Some(None)` when present but empty,
//! `Some(Some(v))` when present with a value.

pub mod patch;
pub mod reader;
pub mod update;

pub use patch::ResourcePatch;
pub use reader::ResourceReader;
pub use update::ResourceUpdate;

use crate::schema::{FieldRef, ResourceType, Schema, TemplateId};
use crate::value::{
    Address, Contact, FieldType, FileRef, Slot, Value, ValueData, ValueResourceRef, ValueUser,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The materialized value of one Field on one Resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceField {
    pub field_id: Uuid,
    pub field_type: FieldType,
    pub name: String,
    pub template_id: Option<TemplateId>,
    pub value: Value,
}

/// A free-form cost row (tax, fee, discount) attached to a Resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cost {
    pub id: Option<Uuid>,
    pub name: String,
    pub is_percentage: bool,
    pub value: Decimal,
}

impl Cost {
    pub fn new(name: impl Into<String>, is_percentage: bool, value: impl Into<Decimal>) -> Self {
        Self {
            id: None,
            name: name.into(),
            is_percentage,
            value: value.into(),
        }
    }

    /// The amount this row contributes given the document subtotal.
    pub fn amount(&self, subtotal: Decimal) -> Decimal {
        if self.is_percentage {
            self.value / Decimal::ONE_HUNDRED * subtotal
        } else {
            self.value
        }
    }
}

/// The identity columns of a stored Resource, without its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub resource_type: ResourceType,
    pub key: i64,
    pub template_id: Option<TemplateId>,
}

/// A business record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: Uuid,
    pub account_id: Uuid,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    pub key: i64,
    pub template_id: Option<TemplateId>,
    pub costs: Vec<Cost>,
    pub fields: Vec<ResourceField>,
}

impl Resource {
    /// Assembles a Resource from its record, its stored values and its Schema.
    ///
    /// Schema fields without a stored value (added after creation) get an empty
    /// value; stored values of fields no longer in the Schema are dropped.
    pub fn hydrate<I>(record: ResourceRecord, schema: &Schema, values: I, costs: Vec<Cost>) -> Self
    where
        I: IntoIterator<Item = (Uuid, Value)>,
    {
        let mut values: std::collections::HashMap<Uuid, Value> = values.into_iter().collect();
        let fields = schema
            .all_fields()
            .map(|field| {
                let value = values
                    .remove(&field.id)
                    .filter(|v| v.slot() == field.field_type.slot())
                    .unwrap_or_else(|| Value::empty(field.field_type));
                ResourceField {
                    field_id: field.id,
                    field_type: field.field_type,
                    name: field.name.clone(),
                    template_id: field.template_id.clone(),
                    value,
                }
            })
            .collect();
        Self {
            id: record.id,
            account_id: record.account_id,
            resource_type: record.resource_type,
            key: record.key,
            template_id: record.template_id,
            costs,
            fields,
        }
    }

    pub fn record(&self) -> ResourceRecord {
        ResourceRecord {
            id: self.id,
            account_id: self.account_id,
            resource_type: self.resource_type,
            key: self.key,
            template_id: self.template_id.clone(),
        }
    }

    pub fn field(&self, field_id: Uuid) -> Option<&ResourceField> {
        self.fields.iter().find(|f| f.field_id == field_id)
    }

    pub fn field_by_template(&self, template_id: &TemplateId) -> Option<&ResourceField> {
        self.fields
            .iter()
            .find(|f| f.template_id.as_ref() == Some(template_id))
    }

    /// Display name: the Name field, else the PO number.
    pub fn display_name(&self) -> Option<String> {
        [TemplateId::NAME, TemplateId::PO_NUMBER]
            .iter()
            .filter_map(|t| self.field_by_template(t))
            .find_map(|f| match &f.value.data {
                ValueData::String(Some(s)) if !s.is_empty() => Some(s.clone()),
                _ => None,
            })
    }

    /// A reference to this Resource for use as a Resource-typed value.
    pub fn reference(&self) -> ValueResourceRef {
        ValueResourceRef {
            id: self.id,
            resource_type: self.resource_type,
            key: self.key,
            name: self.display_name(),
        }
    }
}

/// A pending write to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    pub field_id: Uuid,
    pub data: ValueData,
    pub timestamp: DateTime<Utc>,
}

impl Patch {
    pub fn new(field_id: Uuid, data: ValueData) -> Self {
        Self {
            field_id,
            data,
            timestamp: Utc::now(),
        }
    }

    pub fn into_value(self) -> Value {
        Value {
            data: self.data,
            updated_at: Some(self.timestamp),
        }
    }
}

macro_rules! getter {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        fn $name(&self, field_ref: impl Into<FieldRef>) -> Option<$ty> {
            match self.typed_data(field_ref.into(), Slot::$variant)? {
                ValueData::$variant(v) => Some(v.clone()),
                other => panic!("stored {} data for a {} field", other.slot(), Slot::$variant),
            }
        }
    };
}

/// Typed, three-state read access to field values.
///
/// # Panics
///
/// Every getter panics when the field's declared type does not use the
/// getter's slot (e.g. `get_number` on a Text field).
pub trait FieldValues {
    fn schema(&self) -> &Schema;

    /// The current data of a field by id, `None` when not materialized.
    fn data(&self, field_id: Uuid) -> Option<&ValueData>;

    /// Resolves `field_ref` and checks the field uses `slot`.
    fn typed_data(&self, field_ref: FieldRef, slot: Slot) -> Option<&ValueData> {
        let field = self.schema().get_field(field_ref).ok()?;
        assert_eq!(
            field.field_type.slot(),
            slot,
            "field {:?} is {}, not readable as {slot}",
            field.name,
            field.field_type
        );
        self.data(field.id)
    }

    getter!(get_address, Address, Option<Address>);
    getter!(get_boolean, Boolean, Option<bool>);
    getter!(get_contact, Contact, Option<Contact>);
    getter!(get_date, Date, Option<NaiveDate>);
    getter!(get_file, File, Option<FileRef>);
    getter!(get_files, Files, Vec<FileRef>);
    getter!(
        /// Money and Number fields.
        get_number,
        Number,
        Option<Decimal>
    );
    getter!(get_reference, Resource, Option<ValueResourceRef>);
    getter!(
        /// Select fields: the chosen option id.
        get_option,
        OptionId,
        Option<Uuid>
    );
    getter!(get_options, OptionIds, Vec<Uuid>);
    getter!(
        /// Text and Textarea fields.
        get_string,
        String,
        Option<String>
    );
    getter!(get_user, User, Option<ValueUser>);
}

macro_rules! setter {
    ($name:ident, $variant:ident, $ty:ty) => {
        fn $name(&mut self, field_ref: impl Into<FieldRef>, value: $ty) {
            self.write(field_ref.into(), ValueData::$variant(value));
        }
    };
}

/// Typed writes, recorded as patches.
///
/// # Panics
///
/// Every setter panics when the field is missing from the Schema or its
/// type does not use the setter's slot.
pub trait FieldWriter {
    /// Records `data` for the field, replacing any earlier patch of it.
    fn write(&mut self, field_ref: FieldRef, data: ValueData);

    setter!(set_address, Address, Option<Address>);
    setter!(set_boolean, Boolean, Option<bool>);
    setter!(set_contact, Contact, Option<Contact>);
    setter!(set_date, Date, Option<NaiveDate>);
    setter!(set_file, File, Option<FileRef>);
    setter!(set_files, Files, Vec<FileRef>);
    setter!(set_number, Number, Option<Decimal>);
    setter!(set_reference, Resource, Option<ValueResourceRef>);
    setter!(set_option, OptionId, Option<Uuid>);
    setter!(set_options, OptionIds, Vec<Uuid>);
    setter!(set_string, String, Option<String>);
    setter!(set_user, User, Option<ValueUser>);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, TemplateRegistry};

    fn part() -> (Schema, Resource) {
        let schema = TemplateRegistry::standard().default_schema(Uuid::new_v4(), ResourceType::Part);
        let record = ResourceRecord {
            id: Uuid::new_v4(),
            account_id: schema.account_id,
            resource_type: ResourceType::Part,
            key: 3,
            template_id: None,
        };
        let name_id = schema.expect_field(TemplateId::NAME).id;
        let resource = Resource::hydrate(record, &schema, [(name_id, Value::text("Bolt"))], Vec::new());
        (schema, resource)
    }

    #[test]
    fn test_hydrate_backfills_and_drops() {
        let (mut schema, resource) = part();
        assert_eq!(resource.fields.len(), schema.field_count());
        assert!(resource.field_by_template(&TemplateId::UNIT_COST).unwrap().value.is_empty());

        let stale = Uuid::new_v4();
        schema.fields.push(Field::new("Notes", FieldType::Textarea));
        let rehydrated = Resource::hydrate(
            resource.record(),
            &schema,
            [(stale, Value::text("gone"))],
            Vec::new(),
        );
        assert_eq!(rehydrated.fields.len(), 3);
        assert!(rehydrated.field(stale).is_none());
    }

    #[test]
    fn test_reference_uses_display_name() {
        let (_, resource) = part();
        let reference = resource.reference();
        assert_eq!(reference.key, 3);
        assert_eq!(reference.name.as_deref(), Some("Bolt"));
    }

    #[test]
    fn test_cost_amount() {
        let subtotal = Decimal::from(50);
        assert_eq!(Cost::new("Tax", true, 10).amount(subtotal), Decimal::from(5));
        assert_eq!(Cost::new("Freight", false, 12).amount(subtotal), Decimal::from(12));
    }
}
