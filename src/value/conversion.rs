//! Conversion between [`ValueData`] and the typed storage columns.
//!
//! Each queryable slot owns one typed column (`string`, `number`, `boolean`,
//! `date`, `option_id`, `user_id`, `reference_id`). Structured payloads are kept
//! whole in the `document` column so that reads restore them exactly; the
//! id columns of user and resource values are written alongside so predicates
//! can compare them.

use super::{Slot, ValueData};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value as Json;
use std::cmp::Ordering;
use uuid::Uuid;

/// A typed column a predicate can compare against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueColumn {
    String,
    Number,
    Boolean,
    Date,
    OptionId,
    UserId,
    ReferenceId,
}

impl ValueColumn {
    /// The comparable column for `slot`, if the slot has one.
    ///
    /// Address, contact, file(s) and multi-select values are not comparable.
    pub fn for_slot(slot: Slot) -> Option<Self> {
        match slot {
            Slot::String => Some(ValueColumn::String),
            Slot::Number => Some(ValueColumn::Number),
            Slot::Boolean => Some(ValueColumn::Boolean),
            Slot::Date => Some(ValueColumn::Date),
            Slot::OptionId => Some(ValueColumn::OptionId),
            Slot::User => Some(ValueColumn::UserId),
            Slot::Resource => Some(ValueColumn::ReferenceId),
            Slot::Address | Slot::Contact | Slot::File | Slot::Files | Slot::OptionIds => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueColumn::String => "string",
            ValueColumn::Number => "number",
            ValueColumn::Boolean => "boolean",
            ValueColumn::Date => "date",
            ValueColumn::OptionId => "option_id",
            ValueColumn::UserId => "user_id",
            ValueColumn::ReferenceId => "reference_id",
        }
    }
}

/// A comparable literal or column content.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    Id(Uuid),
}

impl Scalar {
    /// Orders two scalars of the same kind; scalars of different kinds are unordered.
    pub fn compare(&self, other: &Scalar) -> Option<Ordering> {
        match (self, other) {
            (Scalar::String(a), Scalar::String(b)) => Some(a.cmp(b)),
            (Scalar::Number(a), Scalar::Number(b)) => Some(a.cmp(b)),
            (Scalar::Boolean(a), Scalar::Boolean(b)) => Some(a.cmp(b)),
            (Scalar::Date(a), Scalar::Date(b)) => Some(a.cmp(b)),
            (Scalar::Id(a), Scalar::Id(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Bind value for `sea-query`.
    pub fn to_sea_value(&self) -> sea_query::Value {
        match self {
            Scalar::String(s) => sea_query::Value::from(s.clone()),
            Scalar::Number(d) => sea_query::Value::from(*d),
            Scalar::Boolean(b) => sea_query::Value::from(*b),
            Scalar::Date(d) => sea_query::Value::from(*d),
            Scalar::Id(id) => sea_query::Value::from(*id),
        }
    }
}

impl ValueData {
    /// The comparable content of this value, if its slot is comparable and non-empty.
    pub fn scalar(&self) -> Option<Scalar> {
        match self {
            ValueData::String(v) => v.clone().filter(|s| !s.is_empty()).map(Scalar::String),
            ValueData::Number(v) => v.map(Scalar::Number),
            ValueData::Boolean(v) => v.map(Scalar::Boolean),
            ValueData::Date(v) => v.map(Scalar::Date),
            ValueData::OptionId(v) => v.map(Scalar::Id),
            ValueData::User(v) => v.as_ref().map(|u| Scalar::Id(u.id)),
            ValueData::Resource(v) => v.as_ref().map(|r| Scalar::Id(r.id)),
            ValueData::Address(_)
            | ValueData::Contact(_)
            | ValueData::File(_)
            | ValueData::Files(_)
            | ValueData::OptionIds(_) => None,
        }
    }
}

/// The row shape a value is persisted as.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueColumns {
    pub string: Option<String>,
    pub number: Option<Decimal>,
    pub boolean: Option<bool>,
    pub date: Option<NaiveDate>,
    pub option_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub reference_id: Option<Uuid>,
    pub document: Option<Json>,
}

impl ValueColumns {
    /// Splits `data` into its storage columns.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if a structured payload cannot be encoded.
    pub fn from_data(data: &ValueData) -> Result<Self, serde_json::Error> {
        let mut columns = ValueColumns::default();
        match data {
            ValueData::String(v) => columns.string = v.clone().filter(|s| !s.is_empty()),
            ValueData::Number(v) => columns.number = *v,
            ValueData::Boolean(v) => columns.boolean = *v,
            ValueData::Date(v) => columns.date = *v,
            ValueData::OptionId(v) => columns.option_id = *v,
            ValueData::OptionIds(v) => columns.document = non_empty_document(v)?,
            ValueData::Files(v) => columns.document = non_empty_document(v)?,
            ValueData::Address(v) => columns.document = v.as_ref().map(serde_json::to_value).transpose()?,
            ValueData::Contact(v) => columns.document = v.as_ref().map(serde_json::to_value).transpose()?,
            ValueData::File(v) => columns.document = v.as_ref().map(serde_json::to_value).transpose()?,
            ValueData::User(v) => {
                columns.user_id = v.as_ref().map(|u| u.id);
                columns.document = v.as_ref().map(serde_json::to_value).transpose()?;
            }
            ValueData::Resource(v) => {
                columns.reference_id = v.as_ref().map(|r| r.id);
                columns.document = v.as_ref().map(serde_json::to_value).transpose()?;
            }
        }
        Ok(columns)
    }

    /// Rebuilds the value of `slot` from its storage columns.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the stored document does not decode into the slot's payload.
    pub fn into_data(self, slot: Slot) -> Result<ValueData, serde_json::Error> {
        let document = self.document;
        Ok(match slot {
            Slot::String => ValueData::String(self.string),
            Slot::Number => ValueData::Number(self.number),
            Slot::Boolean => ValueData::Boolean(self.boolean),
            Slot::Date => ValueData::Date(self.date),
            Slot::OptionId => ValueData::OptionId(self.option_id),
            Slot::OptionIds => ValueData::OptionIds(decode_list(document)?),
            Slot::Files => ValueData::Files(decode_list(document)?),
            Slot::Address => ValueData::Address(document.map(serde_json::from_value).transpose()?),
            Slot::Contact => ValueData::Contact(document.map(serde_json::from_value).transpose()?),
            Slot::File => ValueData::File(document.map(serde_json::from_value).transpose()?),
            Slot::User => ValueData::User(document.map(serde_json::from_value).transpose()?),
            Slot::Resource => ValueData::Resource(document.map(serde_json::from_value).transpose()?),
        })
    }
}

fn non_empty_document<T: serde::Serialize>(items: &[T]) -> Result<Option<Json>, serde_json::Error> {
    if items.is_empty() {
        Ok(None)
    } else {
        serde_json::to_value(items).map(Some)
    }
}

fn decode_list<T: serde::de::DeserializeOwned>(document: Option<Json>) -> Result<Vec<T>, serde_json::Error> {
    match document {
        Some(json) => serde_json::from_value(json),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ResourceType;
    use crate::value::{Address, ValueResourceRef};

    #[test]
    fn test_reference_keeps_id_column_and_document() {
        let id = Uuid::new_v4();
        let data = ValueData::Resource(Some(ValueResourceRef::new(id, ResourceType::Purchase, 7)));
        let columns = ValueColumns::from_data(&data).unwrap();
        assert_eq!(columns.reference_id, Some(id));
        assert!(columns.document.is_some());
        assert_eq!(columns.into_data(Slot::Resource).unwrap(), data);
    }

    #[test]
    fn test_empty_lists_store_no_document() {
        let columns = ValueColumns::from_data(&ValueData::OptionIds(Vec::new())).unwrap();
        assert_eq!(columns, ValueColumns::default());
        assert_eq!(
            columns.into_data(Slot::OptionIds).unwrap(),
            ValueData::OptionIds(Vec::new())
        );
    }

    #[test]
    fn test_address_restores_from_document() {
        let address = Address {
            city: Some("Dayton".to_string()),
            ..Address::default()
        };
        let columns = ValueColumns::from_data(&ValueData::Address(Some(address.clone()))).unwrap();
        assert_eq!(
            columns.into_data(Slot::Address).unwrap(),
            ValueData::Address(Some(address))
        );
    }

    #[test]
    fn test_uncomparable_slots_have_no_column() {
        assert_eq!(ValueColumn::for_slot(Slot::Files), None);
        assert_eq!(ValueColumn::for_slot(Slot::OptionIds), None);
        assert_eq!(ValueColumn::for_slot(Slot::Resource), Some(ValueColumn::ReferenceId));
    }

    #[test]
    fn test_scalars_of_different_kinds_are_unordered() {
        let text = Scalar::String("1".to_string());
        let number = Scalar::Number(Decimal::ONE);
        assert_eq!(text.compare(&number), None);
        assert_eq!(number.compare(&Scalar::Number(Decimal::TWO)), Some(Ordering::Less));
    }
}
