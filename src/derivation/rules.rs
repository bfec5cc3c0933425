//! The standard derivation rules.

use super::Rule;
use crate::resource::{FieldValues, FieldWriter, ResourceUpdate};
use crate::schema::TemplateId;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// `paymentDueDate = start + paymentTerms days`; an empty start clears the due date.
fn due_date(start: Option<NaiveDate>, terms: Option<Decimal>) -> Option<NaiveDate> {
    let days = terms.unwrap_or_default().trunc().to_i64()?;
    start?.checked_add_signed(Duration::try_days(days)?)
}

/// Line total: `totalCost = unitCost × quantity`.
pub struct LineTotalCost;

impl Rule for LineTotalCost {
    fn name(&self) -> &'static str {
        "line_total_cost"
    }

    fn requires(&self) -> &'static [TemplateId] {
        const REQUIRES: &[TemplateId] = &[TemplateId::UNIT_COST, TemplateId::QUANTITY, TemplateId::TOTAL_COST];
        REQUIRES
    }

    fn triggers(&self) -> &'static [TemplateId] {
        const TRIGGERS: &[TemplateId] = &[TemplateId::UNIT_COST, TemplateId::QUANTITY];
        TRIGGERS
    }

    fn target(&self) -> TemplateId {
        TemplateId::TOTAL_COST
    }

    fn apply(&self, draft: &mut ResourceUpdate<'_>) {
        let unit_cost = draft.get_number(TemplateId::UNIT_COST).flatten().unwrap_or_default();
        let quantity = draft.get_number(TemplateId::QUANTITY).flatten().unwrap_or_default();
        draft.set_number(TemplateId::TOTAL_COST, Some(unit_cost * quantity));
    }
}

/// Itemized costs: the sum of the cost rows, percentages taken of the subtotal.
pub struct ItemizedCosts;

impl Rule for ItemizedCosts {
    fn name(&self) -> &'static str {
        "itemized_costs"
    }

    fn requires(&self) -> &'static [TemplateId] {
        const REQUIRES: &[TemplateId] = &[TemplateId::SUBTOTAL_COST, TemplateId::ITEMIZED_COSTS];
        REQUIRES
    }

    fn triggers(&self) -> &'static [TemplateId] {
        const TRIGGERS: &[TemplateId] = &[TemplateId::SUBTOTAL_COST];
        TRIGGERS
    }

    fn target(&self) -> TemplateId {
        TemplateId::ITEMIZED_COSTS
    }

    fn is_triggered(&self, draft: &ResourceUpdate<'_>) -> bool {
        draft.costs_changed() || draft.has_any_patch(self.triggers())
    }

    fn apply(&self, draft: &mut ResourceUpdate<'_>) {
        let subtotal = draft.get_number(TemplateId::SUBTOTAL_COST).flatten().unwrap_or_default();
        let itemized: Decimal = draft.costs().iter().map(|cost| cost.amount(subtotal)).sum();
        draft.set_number(TemplateId::ITEMIZED_COSTS, Some(itemized));
    }
}

/// Document total: `totalCost = subtotalCost + itemizedCosts`.
pub struct DocumentTotalCost;

impl Rule for DocumentTotalCost {
    fn name(&self) -> &'static str {
        "document_total_cost"
    }

    fn requires(&self) -> &'static [TemplateId] {
        const REQUIRES: &[TemplateId] = &[
            TemplateId::SUBTOTAL_COST,
            TemplateId::ITEMIZED_COSTS,
            TemplateId::TOTAL_COST,
        ];
        REQUIRES
    }

    fn triggers(&self) -> &'static [TemplateId] {
        const TRIGGERS: &[TemplateId] = &[TemplateId::SUBTOTAL_COST, TemplateId::ITEMIZED_COSTS];
        TRIGGERS
    }

    fn target(&self) -> TemplateId {
        TemplateId::TOTAL_COST
    }

    fn apply(&self, draft: &mut ResourceUpdate<'_>) {
        let subtotal = draft.get_number(TemplateId::SUBTOTAL_COST).flatten().unwrap_or_default();
        let itemized = draft.get_number(TemplateId::ITEMIZED_COSTS).flatten().unwrap_or_default();
        draft.set_number(TemplateId::TOTAL_COST, Some(subtotal + itemized));
    }
}

/// Payment due from the invoice date. An explicit due-date patch wins.
pub struct PaymentDueFromInvoiceDate;

impl Rule for PaymentDueFromInvoiceDate {
    fn name(&self) -> &'static str {
        "payment_due_from_invoice_date"
    }

    fn requires(&self) -> &'static [TemplateId] {
        const REQUIRES: &[TemplateId] = &[
            TemplateId::INVOICE_DATE,
            TemplateId::PAYMENT_TERMS,
            TemplateId::PAYMENT_DUE_DATE,
        ];
        REQUIRES
    }

    fn triggers(&self) -> &'static [TemplateId] {
        const TRIGGERS: &[TemplateId] = &[TemplateId::INVOICE_DATE, TemplateId::PAYMENT_TERMS];
        TRIGGERS
    }

    fn target(&self) -> TemplateId {
        TemplateId::PAYMENT_DUE_DATE
    }

    fn is_triggered(&self, draft: &ResourceUpdate<'_>) -> bool {
        draft.has_any_patch(self.triggers()) && !draft.has_patch(TemplateId::PAYMENT_DUE_DATE)
    }

    fn apply(&self, draft: &mut ResourceUpdate<'_>) {
        let due = due_date(
            draft.get_date(TemplateId::INVOICE_DATE).flatten(),
            draft.get_number(TemplateId::PAYMENT_TERMS).flatten(),
        );
        draft.set_date(TemplateId::PAYMENT_DUE_DATE, due);
    }
}

/// Payment due from the need date, for Schemas without an invoice date.
pub struct PaymentDueFromNeedDate;

impl Rule for PaymentDueFromNeedDate {
    fn name(&self) -> &'static str {
        "payment_due_from_need_date"
    }

    fn requires(&self) -> &'static [TemplateId] {
        const REQUIRES: &[TemplateId] = &[
            TemplateId::NEED_DATE,
            TemplateId::PAYMENT_TERMS,
            TemplateId::PAYMENT_DUE_DATE,
        ];
        REQUIRES
    }

    fn triggers(&self) -> &'static [TemplateId] {
        const TRIGGERS: &[TemplateId] = &[TemplateId::NEED_DATE, TemplateId::PAYMENT_TERMS];
        TRIGGERS
    }

    fn target(&self) -> TemplateId {
        TemplateId::PAYMENT_DUE_DATE
    }

    fn is_triggered(&self, draft: &ResourceUpdate<'_>) -> bool {
        !draft.schema().implements([TemplateId::INVOICE_DATE])
            && draft.has_any_patch(self.triggers())
            && !draft.has_patch(TemplateId::PAYMENT_DUE_DATE)
    }

    fn apply(&self, draft: &mut ResourceUpdate<'_>) {
        let due = due_date(
            draft.get_date(TemplateId::NEED_DATE).flatten(),
            draft.get_number(TemplateId::PAYMENT_TERMS).flatten(),
        );
        draft.set_date(TemplateId::PAYMENT_DUE_DATE, due);
    }
}

/// Production days: `ceil(hours / hours_per_day)`.
pub struct ProductionDays {
    hours_per_day: Decimal,
}

impl ProductionDays {
    pub fn new(hours_per_day: Decimal) -> Self {
        assert!(hours_per_day > Decimal::ZERO, "hours per production day must be positive");
        Self { hours_per_day }
    }
}

impl Rule for ProductionDays {
    fn name(&self) -> &'static str {
        "production_days"
    }

    fn requires(&self) -> &'static [TemplateId] {
        const REQUIRES: &[TemplateId] = &[TemplateId::HOURS, TemplateId::PRODUCTION_DAYS];
        REQUIRES
    }

    fn triggers(&self) -> &'static [TemplateId] {
        const TRIGGERS: &[TemplateId] = &[TemplateId::HOURS];
        TRIGGERS
    }

    fn target(&self) -> TemplateId {
        TemplateId::PRODUCTION_DAYS
    }

    fn apply(&self, draft: &mut ResourceUpdate<'_>) {
        let days = draft
            .get_number(TemplateId::HOURS)
            .flatten()
            .map(|hours| (hours / self.hours_per_day).ceil());
        draft.set_number(TemplateId::PRODUCTION_DAYS, days);
    }
}

/// Start date: set to today when the job status moves to In Process.
pub struct StartDateOnStatus;

impl Rule for StartDateOnStatus {
    fn name(&self) -> &'static str {
        "start_date_on_status"
    }

    fn requires(&self) -> &'static [TemplateId] {
        const REQUIRES: &[TemplateId] = &[TemplateId::JOB_STATUS, TemplateId::START_DATE];
        REQUIRES
    }

    fn triggers(&self) -> &'static [TemplateId] {
        const TRIGGERS: &[TemplateId] = &[TemplateId::JOB_STATUS];
        TRIGGERS
    }

    fn target(&self) -> TemplateId {
        TemplateId::START_DATE
    }

    fn is_triggered(&self, draft: &ResourceUpdate<'_>) -> bool {
        draft.has_any_patch(self.triggers()) && !draft.has_patch(TemplateId::START_DATE)
    }

    fn apply(&self, draft: &mut ResourceUpdate<'_>) {
        let in_process = draft
            .schema()
            .expect_field_option(TemplateId::JOB_STATUS, TemplateId::IN_PROCESS)
            .id;
        if draft.get_option(TemplateId::JOB_STATUS).flatten() == Some(in_process) {
            draft.set_date(TemplateId::START_DATE, Some(Utc::now().date_naive()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::DerivationEngine;
    use crate::resource::{Cost, Resource, ResourceRecord};
    use crate::schema::{ResourceType, Schema, TemplateRegistry};
    use crate::value::Value;
    use uuid::Uuid;

    fn resource(schema: &Schema, values: Vec<(TemplateId, Value)>, costs: Vec<Cost>) -> Resource {
        let record = ResourceRecord {
            id: Uuid::new_v4(),
            account_id: schema.account_id,
            resource_type: schema.resource_type,
            key: 1,
            template_id: None,
        };
        let values = values
            .into_iter()
            .map(|(t, v)| (schema.expect_field(t).id, v));
        Resource::hydrate(record, schema, values, costs)
    }

    fn schema(resource_type: ResourceType) -> Schema {
        TemplateRegistry::standard().default_schema(Uuid::new_v4(), resource_type)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_line_total_treats_missing_operand_as_zero() {
        let schema = schema(ResourceType::Line);
        let line = resource(&schema, vec![], vec![]);
        let mut draft = ResourceUpdate::new(&schema, &line);
        draft.set_number(TemplateId::UNIT_COST, Some(Decimal::from(10)));
        DerivationEngine::default().run(&mut draft);
        assert_eq!(draft.get_number(TemplateId::TOTAL_COST), Some(Some(Decimal::ZERO)));
    }

    #[test]
    fn test_line_total_reads_committed_operand() {
        let schema = schema(ResourceType::Line);
        let line = resource(&schema, vec![(TemplateId::QUANTITY, Value::number(3))], vec![]);
        let mut draft = ResourceUpdate::new(&schema, &line);
        draft.set_number(TemplateId::UNIT_COST, Some(Decimal::from(10)));
        let fired = DerivationEngine::default().run(&mut draft);
        assert_eq!(fired, vec!["line_total_cost"]);
        assert_eq!(draft.get_number(TemplateId::TOTAL_COST), Some(Some(Decimal::from(30))));
    }

    #[test]
    fn test_subtotal_patch_cascades_to_itemized_and_total() {
        let schema = schema(ResourceType::Purchase);
        let purchase = resource(&schema, vec![], vec![Cost::new("Tax", true, 10)]);
        let mut draft = ResourceUpdate::new(&schema, &purchase);
        draft.set_number(TemplateId::SUBTOTAL_COST, Some(Decimal::from(50)));
        let fired = DerivationEngine::default().run(&mut draft);
        assert_eq!(fired, vec!["itemized_costs", "document_total_cost"]);
        assert_eq!(draft.get_number(TemplateId::ITEMIZED_COSTS), Some(Some(Decimal::from(5))));
        assert_eq!(draft.get_number(TemplateId::TOTAL_COST), Some(Some(Decimal::from(55))));
    }

    #[test]
    fn test_cost_change_alone_triggers_itemized() {
        let schema = schema(ResourceType::Bill);
        let bill = resource(
            &schema,
            vec![(TemplateId::SUBTOTAL_COST, Value::number(200))],
            vec![Cost::new("Tax", true, 5), Cost::new("Freight", false, 15)],
        );
        let mut draft = ResourceUpdate::new(&schema, &bill);
        draft.mark_costs_changed();
        DerivationEngine::default().run(&mut draft);
        assert_eq!(draft.get_number(TemplateId::ITEMIZED_COSTS), Some(Some(Decimal::from(25))));
        assert_eq!(draft.get_number(TemplateId::TOTAL_COST), Some(Some(Decimal::from(225))));
    }

    #[test]
    fn test_payment_due_from_invoice_date() {
        let schema = schema(ResourceType::Bill);
        let bill = resource(&schema, vec![], vec![]);
        let mut draft = ResourceUpdate::new(&schema, &bill);
        draft.set_date(TemplateId::INVOICE_DATE, Some(date(2024, 1, 10)));
        draft.set_number(TemplateId::PAYMENT_TERMS, Some(Decimal::from(30)));
        DerivationEngine::default().run(&mut draft);
        assert_eq!(draft.get_date(TemplateId::PAYMENT_DUE_DATE), Some(Some(date(2024, 2, 9))));
    }

    #[test]
    fn test_explicit_payment_due_date_wins() {
        let schema = schema(ResourceType::Bill);
        let bill = resource(&schema, vec![], vec![]);
        let mut draft = ResourceUpdate::new(&schema, &bill);
        draft.set_date(TemplateId::INVOICE_DATE, Some(date(2024, 1, 10)));
        draft.set_number(TemplateId::PAYMENT_TERMS, Some(Decimal::from(30)));
        draft.set_date(TemplateId::PAYMENT_DUE_DATE, Some(date(2024, 3, 1)));
        let fired = DerivationEngine::default().run(&mut draft);
        assert!(fired.is_empty());
        assert_eq!(draft.get_date(TemplateId::PAYMENT_DUE_DATE), Some(Some(date(2024, 3, 1))));
    }

    #[test]
    fn test_payment_due_from_need_date_on_purchase() {
        let schema = schema(ResourceType::Purchase);
        let purchase = resource(&schema, vec![(TemplateId::NEED_DATE, Value::date(date(2024, 5, 1)))], vec![]);
        let mut draft = ResourceUpdate::new(&schema, &purchase);
        draft.set_number(TemplateId::PAYMENT_TERMS, Some(Decimal::from(15)));
        DerivationEngine::default().run(&mut draft);
        assert_eq!(draft.get_date(TemplateId::PAYMENT_DUE_DATE), Some(Some(date(2024, 5, 16))));
    }

    #[test]
    fn test_need_date_rule_yields_to_invoice_date() {
        let registry = TemplateRegistry::standard();
        let mut schema = schema(ResourceType::Bill);
        schema
            .fields
            .push(registry.field(&TemplateId::NEED_DATE).unwrap().instantiate());
        let bill = resource(
            &schema,
            vec![
                (TemplateId::INVOICE_DATE, Value::date(date(2024, 1, 10))),
                (TemplateId::NEED_DATE, Value::date(date(2024, 6, 1))),
            ],
            vec![],
        );
        let mut draft = ResourceUpdate::new(&schema, &bill);
        draft.set_number(TemplateId::PAYMENT_TERMS, Some(Decimal::from(30)));
        let fired = DerivationEngine::default().run(&mut draft);
        assert_eq!(fired, vec!["payment_due_from_invoice_date"]);
        assert_eq!(draft.get_date(TemplateId::PAYMENT_DUE_DATE), Some(Some(date(2024, 2, 9))));
    }

    #[test]
    fn test_clearing_invoice_date_clears_due_date() {
        let schema = schema(ResourceType::Bill);
        let bill = resource(
            &schema,
            vec![(TemplateId::PAYMENT_DUE_DATE, Value::date(date(2024, 2, 9)))],
            vec![],
        );
        let mut draft = ResourceUpdate::new(&schema, &bill);
        draft.set_date(TemplateId::INVOICE_DATE, None);
        DerivationEngine::default().run(&mut draft);
        assert_eq!(draft.get_date(TemplateId::PAYMENT_DUE_DATE), Some(None));
    }

    #[test]
    fn test_production_days_round_up() {
        let schema = schema(ResourceType::Job);
        let job = resource(&schema, vec![], vec![]);
        let mut draft = ResourceUpdate::new(&schema, &job);
        draft.set_number(TemplateId::HOURS, Some(Decimal::from(17)));
        DerivationEngine::default().run(&mut draft);
        assert_eq!(draft.get_number(TemplateId::PRODUCTION_DAYS), Some(Some(Decimal::from(3))));

        draft.set_number(TemplateId::HOURS, Some(Decimal::from(16)));
        DerivationEngine::new(10).run(&mut draft);
        assert_eq!(draft.get_number(TemplateId::PRODUCTION_DAYS), Some(Some(Decimal::TWO)));
    }

    #[test]
    fn test_start_date_only_on_in_process() {
        let schema = schema(ResourceType::Job);
        let job = resource(&schema, vec![], vec![]);
        let planned = schema.expect_field_option(TemplateId::JOB_STATUS, TemplateId::PLANNED).id;
        let in_process = schema.expect_field_option(TemplateId::JOB_STATUS, TemplateId::IN_PROCESS).id;

        let mut draft = ResourceUpdate::new(&schema, &job);
        draft.set_option(TemplateId::JOB_STATUS, Some(planned));
        DerivationEngine::default().run(&mut draft);
        assert!(!draft.has_patch(TemplateId::START_DATE));

        let mut draft = ResourceUpdate::new(&schema, &job);
        draft.set_option(TemplateId::JOB_STATUS, Some(in_process));
        DerivationEngine::default().run(&mut draft);
        assert_eq!(
            draft.get_date(TemplateId::START_DATE),
            Some(Some(Utc::now().date_naive()))
        );
    }

    #[test]
    fn test_rules_skip_schemas_without_their_fields() {
        let schema = schema(ResourceType::Vendor);
        let vendor = resource(&schema, vec![], vec![]);
        let mut draft = ResourceUpdate::new(&schema, &vendor);
        draft.mark_costs_changed();
        assert!(DerivationEngine::default().run(&mut draft).is_empty());
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let schema = schema(ResourceType::Line);
        let line = resource(&schema, vec![], vec![]);
        let mut draft = ResourceUpdate::new(&schema, &line);
        draft.set_number(TemplateId::UNIT_COST, Some(Decimal::from(7)));
        draft.set_number(TemplateId::QUANTITY, Some(Decimal::from(6)));
        let engine = DerivationEngine::default();
        engine.run(&mut draft);
        let first = draft.get_number(TemplateId::TOTAL_COST);
        engine.run(&mut draft);
        assert_eq!(draft.get_number(TemplateId::TOTAL_COST), first);
        assert_eq!(draft.patch().patches().len(), 3);
    }
}
