//! Per-account Schemas and their Fields
//!
//! A [`Schema`] defines, for one account and one [`ResourceType`], which
//! [`Field`]s a Resource carries and how they are grouped into [`Section`]s.
//! Fields backed by a system template carry a [`TemplateId`] whose semantics
//! (and, for select fields, whose option identities) are fixed.
//!
//! ## Modules
//!
//! - **`reader`** - field / option resolution (`get_field`, `get_field_option`, `implements`)
//! - **`template`** - the system template catalog and default schemas

pub mod reader;
pub mod template;

pub use reader::SchemaError;
pub use template::{FieldTemplate, OptionTemplate, ResourceTemplate, TemplateId, TemplateRegistry};

use crate::value::{FieldType, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The kind of business record a Resource is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceType {
    Bill,
    Customer,
    Job,
    Line,
    Part,
    Purchase,
    Vendor,
}

impl ResourceType {
    pub const ALL: [ResourceType; 7] = [
        ResourceType::Bill,
        ResourceType::Customer,
        ResourceType::Job,
        ResourceType::Line,
        ResourceType::Part,
        ResourceType::Purchase,
        ResourceType::Vendor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Bill => "Bill",
            ResourceType::Customer => "Customer",
            ResourceType::Job => "Job",
            ResourceType::Line => "Line",
            ResourceType::Part => "Part",
            ResourceType::Purchase => "Purchase",
            ResourceType::Vendor => "Vendor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ResourceType::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Documents own Lines and Costs and are cloned deeply.
    pub fn is_document(self) -> bool {
        matches!(self, ResourceType::Bill | ResourceType::Purchase)
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selectable choice of a Select / MultiSelect field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaOption {
    pub id: Uuid,
    pub name: String,
    pub template_id: Option<TemplateId>,
}

impl SchemaOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            template_id: None,
        }
    }
}

/// A typed, named slot of a Schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: Uuid,
    pub template_id: Option<TemplateId>,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub resource_type: Option<ResourceType>,
    pub options: Vec<SchemaOption>,
    pub default_value: Option<Value>,
    pub default_to_today: bool,
    pub is_required: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id: Uuid::new_v4(),
            template_id: None,
            name: name.into(),
            description: None,
            field_type,
            resource_type: None,
            options: Vec::new(),
            default_value: None,
            default_to_today: false,
            is_required: false,
        }
    }

    /// A Resource-typed field pointing at `resource_type`.
    pub fn reference(name: impl Into<String>, resource_type: ResourceType) -> Self {
        let mut field = Self::new(name, FieldType::Resource);
        field.resource_type = Some(resource_type);
        field
    }

    pub fn with_option(mut self, option: SchemaOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn default_to_today(mut self) -> Self {
        self.default_to_today = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }
}

/// An ordered, named group of fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: Uuid,
    pub name: String,
    pub fields: Vec<Field>,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            fields: Vec::new(),
        }
    }
}

/// The field set of one ResourceType within one account.
///
/// The Schema's full field set is the union of its section fields and its
/// top-level fields; every Field belongs to exactly one Schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    pub id: Uuid,
    pub account_id: Uuid,
    pub resource_type: ResourceType,
    pub name: String,
    pub sections: Vec<Section>,
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(account_id: Uuid, resource_type: ResourceType) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            resource_type,
            name: resource_type.as_str().to_string(),
            sections: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    /// Every field, section fields first, in declaration order.
    pub fn all_fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.sections
            .iter()
            .flat_map(|section| section.fields.iter())
            .chain(self.fields.iter())
    }

    pub fn field_count(&self) -> usize {
        self.all_fields().count()
    }
}

/// How a caller names a Field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldRef {
    Template(TemplateId),
    Id(Uuid),
    Name(String),
}

impl From<TemplateId> for FieldRef {
    fn from(template_id: TemplateId) -> Self {
        FieldRef::Template(template_id)
    }
}

impl From<&TemplateId> for FieldRef {
    fn from(template_id: &TemplateId) -> Self {
        FieldRef::Template(template_id.clone())
    }
}

impl From<Uuid> for FieldRef {
    fn from(id: Uuid) -> Self {
        FieldRef::Id(id)
    }
}

impl From<&str> for FieldRef {
    fn from(name: &str) -> Self {
        FieldRef::Name(name.to_string())
    }
}

impl From<&Field> for FieldRef {
    fn from(field: &Field) -> Self {
        FieldRef::Id(field.id)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Template(t) => write!(f, "template {t}"),
            FieldRef::Id(id) => write!(f, "id {id}"),
            FieldRef::Name(name) => write!(f, "name {name:?}"),
        }
    }
}

/// How a caller names an Option within a Field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OptionRef {
    Template(TemplateId),
    Id(Uuid),
    Name(String),
}

impl From<TemplateId> for OptionRef {
    fn from(template_id: TemplateId) -> Self {
        OptionRef::Template(template_id)
    }
}

impl From<Uuid> for OptionRef {
    fn from(id: Uuid) -> Self {
        OptionRef::Id(id)
    }
}

impl From<&str> for OptionRef {
    fn from(name: &str) -> Self {
        OptionRef::Name(name.to_string())
    }
}

impl fmt::Display for OptionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionRef::Template(t) => write!(f, "template {t}"),
            OptionRef::Id(id) => write!(f, "id {id}"),
            OptionRef::Name(name) => write!(f, "name {name:?}"),
        }
    }
}
