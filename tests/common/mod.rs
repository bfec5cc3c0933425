//! Shared fixtures: a provisioned in-memory store and typed value readers.

#![allow(dead_code)]

use chrono::NaiveDate;
use fieldbook::{
    FieldInput, MemoryBackend, Resource, ResourceStore, ResourceType, StoreConfig, TemplateId, Value, ValueData,
    ValueResourceRef,
};
use rust_decimal::Decimal;
use uuid::Uuid;

pub type Store = ResourceStore<MemoryBackend>;

/// A store with one provisioned account.
pub fn store() -> (Store, Uuid) {
    let store = ResourceStore::new(MemoryBackend::new(), StoreConfig::default());
    let account = Uuid::new_v4();
    store.provision_account(account).expect("provision account");
    (store, account)
}

pub fn create(store: &Store, account: Uuid, resource_type: ResourceType, fields: Vec<FieldInput>) -> Resource {
    store
        .create_resource(account, resource_type, None, fields)
        .unwrap_or_else(|e| panic!("create {resource_type}: {e}"))
}

pub fn reread(store: &Store, account: Uuid, resource: &Resource) -> Resource {
    store.read_resource(account, resource.id).expect("reread")
}

pub fn input(template: TemplateId, value: Value) -> FieldInput {
    FieldInput::new(template, value)
}

pub fn link(target: &Resource) -> Value {
    Value::reference(target.reference())
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn data(resource: &Resource, template: &TemplateId) -> ValueData {
    resource
        .field_by_template(template)
        .unwrap_or_else(|| panic!("{} has no {template} field", resource.resource_type))
        .value
        .data
        .clone()
}

pub fn number(resource: &Resource, template: TemplateId) -> Option<Decimal> {
    match data(resource, &template) {
        ValueData::Number(n) => n,
        other => panic!("{template} holds {other:?}"),
    }
}

pub fn text(resource: &Resource, template: TemplateId) -> Option<String> {
    match data(resource, &template) {
        ValueData::String(s) => s,
        other => panic!("{template} holds {other:?}"),
    }
}

pub fn date_of(resource: &Resource, template: TemplateId) -> Option<NaiveDate> {
    match data(resource, &template) {
        ValueData::Date(d) => d,
        other => panic!("{template} holds {other:?}"),
    }
}

pub fn option(resource: &Resource, template: TemplateId) -> Option<Uuid> {
    match data(resource, &template) {
        ValueData::OptionId(id) => id,
        other => panic!("{template} holds {other:?}"),
    }
}

pub fn reference(resource: &Resource, template: TemplateId) -> Option<ValueResourceRef> {
    match data(resource, &template) {
        ValueData::Resource(r) => r,
        other => panic!("{template} holds {other:?}"),
    }
}

pub fn dec(n: i64) -> Decimal {
    Decimal::from(n)
}

/// A Line with the given unit cost and quantity, linked to `document` through `back_link`.
pub fn line(store: &Store, account: Uuid, document: &Resource, back_link: TemplateId, unit: i64, quantity: i64) -> Resource {
    create(
        store,
        account,
        ResourceType::Line,
        vec![
            input(TemplateId::UNIT_COST, Value::number(unit)),
            input(TemplateId::QUANTITY, Value::number(quantity)),
            input(back_link, link(document)),
        ],
    )
}
