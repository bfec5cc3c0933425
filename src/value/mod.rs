//! Typed field values
//!
//! Every Field declares a [`FieldType`], and every `FieldType` stores its content
//! in exactly one [`Slot`] of [`ValueData`]. `Money` and `Number` share the
//! number slot; `Text` and `Textarea` share the string slot. All other slots of
//! a field's value stay empty.
//!
//! ## Modules
//!
//! - **`types`** - structured payloads (address, contact, file, user, resource reference)
//! - **`conversion`** - mapping between [`ValueData`] and the typed storage columns

pub mod conversion;
pub mod types;

pub use conversion::{Scalar, ValueColumn, ValueColumns};
pub use types::{Address, Contact, FileRef, ValueResourceRef, ValueUser};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The closed set of field types a Schema can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Address,
    Checkbox,
    Contact,
    Date,
    File,
    Files,
    Money,
    MultiSelect,
    Number,
    Resource,
    Select,
    Text,
    Textarea,
    User,
}

impl FieldType {
    pub const ALL: [FieldType; 14] = [
        FieldType::Address,
        FieldType::Checkbox,
        FieldType::Contact,
        FieldType::Date,
        FieldType::File,
        FieldType::Files,
        FieldType::Money,
        FieldType::MultiSelect,
        FieldType::Number,
        FieldType::Resource,
        FieldType::Select,
        FieldType::Text,
        FieldType::Textarea,
        FieldType::User,
    ];

    /// The value slot this type populates.
    pub fn slot(self) -> Slot {
        match self {
            FieldType::Address => Slot::Address,
            FieldType::Checkbox => Slot::Boolean,
            FieldType::Contact => Slot::Contact,
            FieldType::Date => Slot::Date,
            FieldType::File => Slot::File,
            FieldType::Files => Slot::Files,
            FieldType::Money | FieldType::Number => Slot::Number,
            FieldType::MultiSelect => Slot::OptionIds,
            FieldType::Resource => Slot::Resource,
            FieldType::Select => Slot::OptionId,
            FieldType::Text | FieldType::Textarea => Slot::String,
            FieldType::User => Slot::User,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Address => "Address",
            FieldType::Checkbox => "Checkbox",
            FieldType::Contact => "Contact",
            FieldType::Date => "Date",
            FieldType::File => "File",
            FieldType::Files => "Files",
            FieldType::Money => "Money",
            FieldType::MultiSelect => "MultiSelect",
            FieldType::Number => "Number",
            FieldType::Resource => "Resource",
            FieldType::Select => "Select",
            FieldType::Text => "Text",
            FieldType::Textarea => "Textarea",
            FieldType::User => "User",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage slot of a [`ValueData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Slot {
    Address,
    Boolean,
    Contact,
    Date,
    File,
    Files,
    Number,
    Resource,
    #[serde(rename = "option")]
    OptionId,
    #[serde(rename = "options")]
    OptionIds,
    String,
    User,
}

impl Slot {
    pub const ALL: [Slot; 12] = [
        Slot::Address,
        Slot::Boolean,
        Slot::Contact,
        Slot::Date,
        Slot::File,
        Slot::Files,
        Slot::Number,
        Slot::Resource,
        Slot::OptionId,
        Slot::OptionIds,
        Slot::String,
        Slot::User,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Slot::ALL.into_iter().find(|slot| slot.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Address => "address",
            Slot::Boolean => "boolean",
            Slot::Contact => "contact",
            Slot::Date => "date",
            Slot::File => "file",
            Slot::Files => "files",
            Slot::Number => "number",
            Slot::Resource => "resource",
            Slot::OptionId => "option",
            Slot::OptionIds => "options",
            Slot::String => "string",
            Slot::User => "user",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The content of one field, tagged by slot.
///
/// Single-valued slots hold `None` when empty; the multi-valued slots
/// (`Files`, `OptionIds`) are empty when their list is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "slot", content = "value", rename_all = "camelCase")]
pub enum ValueData {
    Address(Option<Address>),
    Boolean(Option<bool>),
    Contact(Option<Contact>),
    Date(Option<NaiveDate>),
    File(Option<FileRef>),
    Files(Vec<FileRef>),
    Number(Option<Decimal>),
    Resource(Option<ValueResourceRef>),
    #[serde(rename = "option")]
    OptionId(Option<Uuid>),
    #[serde(rename = "options")]
    OptionIds(Vec<Uuid>),
    String(Option<String>),
    User(Option<ValueUser>),
}

impl ValueData {
    /// An empty value for `slot`.
    pub fn empty(slot: Slot) -> Self {
        match slot {
            Slot::Address => ValueData::Address(None),
            Slot::Boolean => ValueData::Boolean(None),
            Slot::Contact => ValueData::Contact(None),
            Slot::Date => ValueData::Date(None),
            Slot::File => ValueData::File(None),
            Slot::Files => ValueData::Files(Vec::new()),
            Slot::Number => ValueData::Number(None),
            Slot::Resource => ValueData::Resource(None),
            Slot::OptionId => ValueData::OptionId(None),
            Slot::OptionIds => ValueData::OptionIds(Vec::new()),
            Slot::String => ValueData::String(None),
            Slot::User => ValueData::User(None),
        }
    }

    pub fn slot(&self) -> Slot {
        match self {
            ValueData::Address(_) => Slot::Address,
            ValueData::Boolean(_) => Slot::Boolean,
            ValueData::Contact(_) => Slot::Contact,
            ValueData::Date(_) => Slot::Date,
            ValueData::File(_) => Slot::File,
            ValueData::Files(_) => Slot::Files,
            ValueData::Number(_) => Slot::Number,
            ValueData::Resource(_) => Slot::Resource,
            ValueData::OptionId(_) => Slot::OptionId,
            ValueData::OptionIds(_) => Slot::OptionIds,
            ValueData::String(_) => Slot::String,
            ValueData::User(_) => Slot::User,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ValueData::Address(v) => v.is_none(),
            ValueData::Boolean(v) => v.is_none(),
            ValueData::Contact(v) => v.is_none(),
            ValueData::Date(v) => v.is_none(),
            ValueData::File(v) => v.is_none(),
            ValueData::Files(v) => v.is_empty(),
            ValueData::Number(v) => v.is_none(),
            ValueData::Resource(v) => v.is_none(),
            ValueData::OptionId(v) => v.is_none(),
            ValueData::OptionIds(v) => v.is_empty(),
            ValueData::String(v) => v.as_deref().map_or(true, str::is_empty),
            ValueData::User(v) => v.is_none(),
        }
    }
}

/// A field value as stored on a Resource.
///
/// `updated_at` orders concurrent edits for client-side merging; it is
/// advisory and never used as a compare-and-swap token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    pub data: ValueData,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Value {
    pub fn new(data: ValueData) -> Self {
        Self {
            data,
            updated_at: Some(Utc::now()),
        }
    }

    /// An empty value of the slot `field_type` uses.
    pub fn empty(field_type: FieldType) -> Self {
        Self {
            data: ValueData::empty(field_type.slot()),
            updated_at: None,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::new(ValueData::String(Some(value.into())))
    }

    pub fn number(value: impl Into<Decimal>) -> Self {
        Self::new(ValueData::Number(Some(value.into())))
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(ValueData::Boolean(Some(value)))
    }

    pub fn date(value: NaiveDate) -> Self {
        Self::new(ValueData::Date(Some(value)))
    }

    pub fn option(option_id: Uuid) -> Self {
        Self::new(ValueData::OptionId(Some(option_id)))
    }

    pub fn options(option_ids: Vec<Uuid>) -> Self {
        Self::new(ValueData::OptionIds(option_ids))
    }

    pub fn reference(reference: ValueResourceRef) -> Self {
        Self::new(ValueData::Resource(Some(reference)))
    }

    pub fn user(user: ValueUser) -> Self {
        Self::new(ValueData::User(Some(user)))
    }

    pub fn slot(&self) -> Slot {
        self.data.slot()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_field_type_maps_to_one_slot() {
        for field_type in FieldType::ALL {
            let value = Value::empty(field_type);
            assert_eq!(value.slot(), field_type.slot());
            assert!(value.is_empty(), "{field_type} should start empty");
        }
    }

    #[test]
    fn test_shared_slots() {
        assert_eq!(FieldType::Money.slot(), FieldType::Number.slot());
        assert_eq!(FieldType::Text.slot(), FieldType::Textarea.slot());
        assert_ne!(FieldType::Select.slot(), FieldType::MultiSelect.slot());
    }

    #[test]
    fn test_blank_string_is_empty() {
        assert!(ValueData::String(Some(String::new())).is_empty());
        assert!(!Value::text("Acme").is_empty());
        assert!(!Value::number(Decimal::ZERO).is_empty());
    }

    #[test]
    fn test_value_data_serializes_with_slot_tag() {
        let json = serde_json::to_value(ValueData::OptionId(None)).unwrap();
        assert_eq!(json, serde_json::json!({ "slot": "option", "value": null }));
    }
}
