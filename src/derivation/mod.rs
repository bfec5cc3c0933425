//! Derivation engine
//!
//! A fixed, ordered list of [`Rule`]s runs once over a [`ResourceUpdate`]
//! draft. Each rule guards itself twice: the Schema must implement the
//! rule's fields, and one of the rule's trigger fields must have been
//! patched in this batch. Rules only write through the draft, so running a
//! rule twice on the same inputs writes the same value.
//!
//! Order matters only where a later rule reads a field an earlier rule
//! writes (itemized costs before the document total). No rule writes a
//! field that triggers an earlier rule, so one pass suffices.

pub mod rules;

use crate::resource::{FieldValues, ResourceUpdate};
use crate::schema::TemplateId;
use rust_decimal::Decimal;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;
#[cfg(feature = "metrics")]
use crate::metrics::METRICS;

/// A guarded recomputation of one field from others.
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fields the Schema must implement for the rule to apply.
    fn requires(&self) -> &'static [TemplateId];

    /// Fields whose patch triggers the rule.
    fn triggers(&self) -> &'static [TemplateId];

    /// The field the rule writes.
    fn target(&self) -> TemplateId;

    /// Whether the rule fires for this draft. The default checks the triggers.
    fn is_triggered(&self, draft: &ResourceUpdate<'_>) -> bool {
        draft.has_any_patch(self.triggers())
    }

    fn apply(&self, draft: &mut ResourceUpdate<'_>);
}

pub struct DerivationEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl DerivationEngine {
    /// The standard rule list.
    pub fn new(hours_per_production_day: u32) -> Self {
        Self::with_rules(vec![
            Box::new(rules::LineTotalCost),
            Box::new(rules::ItemizedCosts),
            Box::new(rules::DocumentTotalCost),
            Box::new(rules::PaymentDueFromInvoiceDate),
            Box::new(rules::PaymentDueFromNeedDate),
            Box::new(rules::ProductionDays::new(Decimal::from(hours_per_production_day))),
            Box::new(rules::StartDateOnStatus),
        ])
    }

    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Runs every applicable rule once, in order. Returns the names of the
    /// rules that fired.
    pub fn run(&self, draft: &mut ResourceUpdate<'_>) -> Vec<&'static str> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::derivation_span(draft.resource().resource_type.as_str()).entered();

        let mut fired = Vec::new();
        for rule in &self.rules {
            if !draft.schema().implements(rule.requires()) || !rule.is_triggered(draft) {
                continue;
            }
            log::debug!(
                "rule {} fired on {} {}",
                rule.name(),
                draft.resource().resource_type,
                draft.resource().id
            );
            rule.apply(draft);
            #[cfg(feature = "metrics")]
            METRICS.record_derivation(rule.name());
            fired.push(rule.name());
        }
        fired
    }
}

impl Default for DerivationEngine {
    fn default() -> Self {
        Self::new(8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_itemized_costs_precede_document_total() {
        let names = DerivationEngine::default().rule_names();
        let position = |name| names.iter().position(|n| *n == name).unwrap();
        assert!(position("itemized_costs") < position("document_total_cost"));
        assert!(position("line_total_cost") < position("document_total_cost"));
        assert!(position("payment_due_from_invoice_date") < position("payment_due_from_need_date"));
    }

    #[test]
    fn test_no_rule_writes_an_earlier_rules_trigger() {
        let engine = DerivationEngine::default();
        for (i, rule) in engine.rules.iter().enumerate() {
            let target = rule.target();
            assert!(rule.requires().contains(&target), "{} must require its target", rule.name());
            for earlier in &engine.rules[..i] {
                assert!(
                    !earlier.triggers().contains(&target),
                    "{} writes {target}, which triggers earlier rule {}",
                    rule.name(),
                    earlier.name()
                );
            }
        }
    }
}
