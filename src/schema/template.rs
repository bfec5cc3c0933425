//! System templates
//!
//! The template catalog is the fixed set of system Fields, Options and
//! Resources that every account's Schema may implement. A template's id is
//! stable across accounts; the per-account Field / Option ids are not.
//!
//! The catalog is normally loaded once at startup ([`TemplateRegistry::from_json`])
//! or taken from the built-in [`TemplateRegistry::standard`] catalog. The
//! derivation rules reference templates through the `TemplateId` constants.

use super::{Field, ResourceType, Schema, SchemaError, SchemaOption, Section};
use crate::value::{FieldType, Value};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Stable identity of a system field, option or resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(Cow<'static, str>);

impl TemplateId {
    // Fields
    pub const NAME: TemplateId = TemplateId::from_static("name");
    pub const PO_NUMBER: TemplateId = TemplateId::from_static("poNumber");
    pub const VENDOR: TemplateId = TemplateId::from_static("vendor");
    pub const CUSTOMER: TemplateId = TemplateId::from_static("customer");
    pub const PURCHASE: TemplateId = TemplateId::from_static("purchase");
    pub const BILL: TemplateId = TemplateId::from_static("bill");
    pub const JOB: TemplateId = TemplateId::from_static("job");
    pub const ADDRESS: TemplateId = TemplateId::from_static("address");
    pub const CONTACT: TemplateId = TemplateId::from_static("contact");
    pub const DOCUMENT: TemplateId = TemplateId::from_static("document");
    pub const UNIT_COST: TemplateId = TemplateId::from_static("unitCost");
    pub const QUANTITY: TemplateId = TemplateId::from_static("quantity");
    pub const TOTAL_COST: TemplateId = TemplateId::from_static("totalCost");
    pub const SUBTOTAL_COST: TemplateId = TemplateId::from_static("subtotalCost");
    pub const ITEMIZED_COSTS: TemplateId = TemplateId::from_static("itemizedCosts");
    pub const INVOICE_DATE: TemplateId = TemplateId::from_static("invoiceDate");
    pub const NEED_DATE: TemplateId = TemplateId::from_static("needDate");
    pub const PAYMENT_TERMS: TemplateId = TemplateId::from_static("paymentTerms");
    pub const PAYMENT_DUE_DATE: TemplateId = TemplateId::from_static("paymentDueDate");
    pub const HOURS: TemplateId = TemplateId::from_static("hours");
    pub const PRODUCTION_DAYS: TemplateId = TemplateId::from_static("productionDays");
    pub const JOB_STATUS: TemplateId = TemplateId::from_static("jobStatus");
    pub const START_DATE: TemplateId = TemplateId::from_static("startDate");
    pub const BILL_STATUS: TemplateId = TemplateId::from_static("billStatus");
    pub const PURCHASE_STATUS: TemplateId = TemplateId::from_static("purchaseStatus");

    // Options
    pub const DRAFT: TemplateId = TemplateId::from_static("draft");
    pub const OPEN: TemplateId = TemplateId::from_static("open");
    pub const PAID: TemplateId = TemplateId::from_static("paid");
    pub const ORDERED: TemplateId = TemplateId::from_static("ordered");
    pub const RECEIVED: TemplateId = TemplateId::from_static("received");
    pub const PLANNED: TemplateId = TemplateId::from_static("planned");
    pub const IN_PROCESS: TemplateId = TemplateId::from_static("inProcess");
    pub const DONE: TemplateId = TemplateId::from_static("done");

    // Resources
    pub const MCMASTER_CARR: TemplateId = TemplateId::from_static("mcmasterCarr");

    pub const fn from_static(id: &'static str) -> Self {
        TemplateId(Cow::Borrowed(id))
    }

    pub fn new(id: impl Into<String>) -> Self {
        TemplateId(Cow::Owned(id.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionTemplate {
    pub id: TemplateId,
    pub name: String,
}

/// A system field definition.
///
/// `derived` marks fields computed by the derivation rules; they are never
/// copied between resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTemplate {
    pub id: TemplateId,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub resource_type: Option<ResourceType>,
    #[serde(default)]
    pub options: Vec<OptionTemplate>,
    #[serde(default)]
    pub derived: bool,
}

impl FieldTemplate {
    /// Instantiates this template as a Field with fresh per-account ids.
    pub fn instantiate(&self) -> Field {
        let mut field = Field::new(self.name.clone(), self.field_type);
        field.template_id = Some(self.id.clone());
        field.resource_type = self.resource_type;
        field.options = self
            .options
            .iter()
            .map(|o| SchemaOption {
                id: Uuid::new_v4(),
                name: o.name.clone(),
                template_id: Some(o.id.clone()),
            })
            .collect();
        field
    }
}

/// A system resource (e.g. a well-known vendor) and the values of its template fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplate {
    pub id: TemplateId,
    pub resource_type: ResourceType,
    pub values: Vec<(TemplateId, Value)>,
}

/// Layout of a default schema: top-level fields, then named sections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaLayout {
    pub resource_type: ResourceType,
    pub fields: Vec<TemplateId>,
    #[serde(default)]
    pub sections: Vec<(String, Vec<TemplateId>)>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Catalog {
    fields: Vec<FieldTemplate>,
    #[serde(default)]
    resources: Vec<ResourceTemplate>,
    #[serde(default)]
    layouts: Vec<SchemaLayout>,
}

/// Lookup table over the template catalog.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    fields: HashMap<TemplateId, FieldTemplate>,
    resources: HashMap<TemplateId, ResourceTemplate>,
    layouts: HashMap<ResourceType, SchemaLayout>,
}

impl TemplateRegistry {
    /// Loads a catalog from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the document is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let catalog: Catalog = serde_json::from_str(json)?;
        Ok(Self::from_catalog(catalog))
    }

    fn from_catalog(catalog: Catalog) -> Self {
        Self {
            fields: catalog.fields.into_iter().map(|f| (f.id.clone(), f)).collect(),
            resources: catalog.resources.into_iter().map(|r| (r.id.clone(), r)).collect(),
            layouts: catalog
                .layouts
                .into_iter()
                .map(|l| (l.resource_type, l))
                .collect(),
        }
    }

    /// The built-in catalog.
    pub fn standard() -> Self {
        Self::from_catalog(standard_catalog())
    }

    pub fn field(&self, id: &TemplateId) -> Option<&FieldTemplate> {
        self.fields.get(id)
    }

    pub fn resource(&self, id: &TemplateId) -> Option<&ResourceTemplate> {
        self.resources.get(id)
    }

    /// True if the template names a rule-computed field.
    pub fn is_derived(&self, id: &TemplateId) -> bool {
        self.fields.get(id).is_some_and(|f| f.derived)
    }

    /// Builds the default schema of `resource_type` for a new account.
    ///
    /// Types without a layout get an empty schema.
    pub fn default_schema(&self, account_id: Uuid, resource_type: ResourceType) -> Schema {
        let mut schema = Schema::new(account_id, resource_type);
        let Some(layout) = self.layouts.get(&resource_type) else {
            return schema;
        };
        schema.fields = layout
            .fields
            .iter()
            .filter_map(|id| self.fields.get(id))
            .map(FieldTemplate::instantiate)
            .collect();
        schema.sections = layout
            .sections
            .iter()
            .map(|(name, ids)| Section {
                fields: ids
                    .iter()
                    .filter_map(|id| self.fields.get(id))
                    .map(FieldTemplate::instantiate)
                    .collect(),
                ..Section::new(name.clone())
            })
            .collect();
        schema
    }

    /// Checks that every template field of `schema` matches its template:
    /// same type, same target resource type, and every template option present.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] found.
    pub fn validate(&self, schema: &Schema) -> Result<(), SchemaError> {
        schema.check_names()?;
        for field in schema.all_fields() {
            let Some(template_id) = &field.template_id else {
                continue;
            };
            let template = self
                .fields
                .get(template_id)
                .ok_or_else(|| SchemaError::UnknownTemplate(template_id.clone()))?;
            let mismatch = |reason: String| SchemaError::TemplateMismatch {
                field: field.name.clone(),
                template: template_id.clone(),
                reason,
            };
            if field.field_type != template.field_type {
                return Err(mismatch(format!(
                    "type {} should be {}",
                    field.field_type, template.field_type
                )));
            }
            if field.resource_type != template.resource_type {
                return Err(mismatch("resource type differs".to_string()));
            }
            for option in &template.options {
                if !field
                    .options
                    .iter()
                    .any(|o| o.template_id.as_ref() == Some(&option.id))
                {
                    return Err(mismatch(format!("missing option {}", option.id)));
                }
            }
        }
        Ok(())
    }
}

fn field(id: TemplateId, name: &str, field_type: FieldType) -> FieldTemplate {
    FieldTemplate {
        id,
        name: name.to_string(),
        field_type,
        resource_type: None,
        options: Vec::new(),
        derived: false,
    }
}

fn reference(id: TemplateId, name: &str, resource_type: ResourceType) -> FieldTemplate {
    FieldTemplate {
        resource_type: Some(resource_type),
        ..field(id, name, FieldType::Resource)
    }
}

fn derived(id: TemplateId, name: &str, field_type: FieldType) -> FieldTemplate {
    FieldTemplate {
        derived: true,
        ..field(id, name, field_type)
    }
}

fn select(id: TemplateId, name: &str, options: &[(TemplateId, &str)]) -> FieldTemplate {
    FieldTemplate {
        options: options
            .iter()
            .map(|(id, name)| OptionTemplate {
                id: id.clone(),
                name: name.to_string(),
            })
            .collect(),
        ..field(id, name, FieldType::Select)
    }
}

fn standard_catalog() -> Catalog {
    use ResourceType as R;
    use TemplateId as T;

    let fields = vec![
        field(T::NAME, "Name", FieldType::Text),
        field(T::PO_NUMBER, "PO Number", FieldType::Text),
        reference(T::VENDOR, "Vendor", R::Vendor),
        reference(T::CUSTOMER, "Customer", R::Customer),
        reference(T::PURCHASE, "Purchase", R::Purchase),
        reference(T::BILL, "Bill", R::Bill),
        reference(T::JOB, "Job", R::Job),
        field(T::ADDRESS, "Address", FieldType::Address),
        field(T::CONTACT, "Contact", FieldType::Contact),
        field(T::DOCUMENT, "Document", FieldType::File),
        field(T::UNIT_COST, "Unit Cost", FieldType::Money),
        field(T::QUANTITY, "Quantity", FieldType::Number),
        derived(T::TOTAL_COST, "Total Cost", FieldType::Money),
        derived(T::SUBTOTAL_COST, "Subtotal", FieldType::Money),
        derived(T::ITEMIZED_COSTS, "Itemized Costs", FieldType::Money),
        field(T::INVOICE_DATE, "Invoice Date", FieldType::Date),
        field(T::NEED_DATE, "Need Date", FieldType::Date),
        field(T::PAYMENT_TERMS, "Payment Terms", FieldType::Number),
        derived(T::PAYMENT_DUE_DATE, "Payment Due Date", FieldType::Date),
        field(T::HOURS, "Hours", FieldType::Number),
        derived(T::PRODUCTION_DAYS, "Production Days", FieldType::Number),
        select(
            T::JOB_STATUS,
            "Job Status",
            &[(T::PLANNED, "Planned"), (T::IN_PROCESS, "In Process"), (T::DONE, "Done")],
        ),
        field(T::START_DATE, "Start Date", FieldType::Date),
        select(
            T::BILL_STATUS,
            "Bill Status",
            &[(T::DRAFT, "Draft"), (T::OPEN, "Open"), (T::PAID, "Paid")],
        ),
        select(
            T::PURCHASE_STATUS,
            "Purchase Status",
            &[(T::DRAFT, "Draft"), (T::ORDERED, "Ordered"), (T::RECEIVED, "Received")],
        ),
    ];

    let resources = vec![ResourceTemplate {
        id: T::MCMASTER_CARR,
        resource_type: R::Vendor,
        values: vec![(T::NAME, Value::text("McMaster-Carr"))],
    }];

    let costs = |title: &str| {
        (
            title.to_string(),
            vec![T::SUBTOTAL_COST, T::ITEMIZED_COSTS, T::TOTAL_COST],
        )
    };
    let layouts = vec![
        SchemaLayout {
            resource_type: R::Bill,
            fields: vec![T::NAME, T::VENDOR, T::PURCHASE, T::BILL_STATUS, T::DOCUMENT],
            sections: vec![
                (
                    "Payment".to_string(),
                    vec![T::INVOICE_DATE, T::PAYMENT_TERMS, T::PAYMENT_DUE_DATE],
                ),
                costs("Costs"),
            ],
        },
        SchemaLayout {
            resource_type: R::Purchase,
            fields: vec![T::PO_NUMBER, T::VENDOR, T::PURCHASE_STATUS],
            sections: vec![
                (
                    "Payment".to_string(),
                    vec![T::NEED_DATE, T::PAYMENT_TERMS, T::PAYMENT_DUE_DATE],
                ),
                costs("Costs"),
            ],
        },
        SchemaLayout {
            resource_type: R::Line,
            fields: vec![
                T::NAME,
                T::UNIT_COST,
                T::QUANTITY,
                T::TOTAL_COST,
                T::PURCHASE,
                T::BILL,
                T::JOB,
            ],
            sections: Vec::new(),
        },
        SchemaLayout {
            resource_type: R::Job,
            fields: vec![T::NAME, T::CUSTOMER, T::JOB_STATUS],
            sections: vec![(
                "Schedule".to_string(),
                vec![T::HOURS, T::PRODUCTION_DAYS, T::START_DATE],
            )],
        },
        SchemaLayout {
            resource_type: R::Vendor,
            fields: vec![T::NAME, T::ADDRESS, T::CONTACT],
            sections: Vec::new(),
        },
        SchemaLayout {
            resource_type: R::Customer,
            fields: vec![T::NAME, T::ADDRESS, T::CONTACT],
            sections: Vec::new(),
        },
        SchemaLayout {
            resource_type: R::Part,
            fields: vec![T::NAME, T::UNIT_COST],
            sections: Vec::new(),
        },
    ];

    Catalog {
        fields,
        resources,
        layouts,
    }
}
