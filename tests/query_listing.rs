//! Listing Resources with JSON-Logic filters and orderings.

mod common;

use common::*;
use fieldbook::{QueryError, ResourceType, StoreError, TemplateId, Value};
use serde_json::json;

#[test]
fn test_filter_bills_by_status_option() {
    let (store, account) = store();
    let schema = store.read_schema(account, ResourceType::Bill).unwrap();
    let paid = schema.get_field_option(TemplateId::BILL_STATUS, TemplateId::PAID).unwrap().id;
    let open = schema.get_field_option(TemplateId::BILL_STATUS, TemplateId::OPEN).unwrap().id;

    let paid_bill = create(&store, account, ResourceType::Bill, vec![input(TemplateId::BILL_STATUS, Value::option(paid))]);
    create(&store, account, ResourceType::Bill, vec![input(TemplateId::BILL_STATUS, Value::option(open))]);
    create(&store, account, ResourceType::Bill, Vec::new());

    let filter = json!({"==": [{"var": "Bill Status"}, paid.to_string()]});
    let bills = store
        .read_resources(account, ResourceType::Bill, Some(&filter), None)
        .unwrap();
    assert_eq!(bills.iter().map(|b| b.id).collect::<Vec<_>>(), vec![paid_bill.id]);

    // options also resolve by name
    let filter = json!({"==": [{"var": "Bill Status"}, "Paid"]});
    let bills = store
        .read_resources(account, ResourceType::Bill, Some(&filter), None)
        .unwrap();
    assert_eq!(bills.len(), 1);

    let filter = json!({"==": [{"var": "Bill Status"}, null]});
    let unset = store
        .read_resources(account, ResourceType::Bill, Some(&filter), None)
        .unwrap();
    assert_eq!(unset.len(), 1);
    assert_eq!(option(&unset[0], TemplateId::BILL_STATUS), None);
}

#[test]
fn test_unknown_field_fails_compilation() {
    let (store, account) = store();
    create(&store, account, ResourceType::Bill, Vec::new());

    let filter = json!({"==": [{"var": "Colour"}, "red"]});
    let err = store
        .read_resources(account, ResourceType::Bill, Some(&filter), None)
        .unwrap_err();
    assert!(matches!(err, StoreError::Query(QueryError::UnknownField(ref f)) if f == "Colour"), "{err}");

    let order = json!([{"var": "Colour"}]);
    let err = store
        .read_resources(account, ResourceType::Bill, None, Some(&order))
        .unwrap_err();
    assert!(matches!(err, StoreError::Query(QueryError::UnknownField(_))), "{err}");
}

#[test]
fn test_type_mismatched_literal_fails_compilation() {
    let (store, account) = store();
    let filter = json!({">=": [{"var": "Total Cost"}, "lots"]});
    let err = store
        .read_resources(account, ResourceType::Bill, Some(&filter), None)
        .unwrap_err();
    assert!(matches!(err, StoreError::Query(QueryError::TypeMismatch { .. })), "{err}");
}

#[test]
fn test_default_order_is_newest_first() {
    let (store, account) = store();
    for _ in 0..3 {
        create(&store, account, ResourceType::Job, Vec::new());
    }
    let jobs = store.read_resources(account, ResourceType::Job, None, None).unwrap();
    assert_eq!(jobs.iter().map(|j| j.key).collect::<Vec<_>>(), vec![3, 2, 1]);
}

#[test]
fn test_order_by_is_honored_with_empty_values_last() {
    let (store, account) = store();
    let cost = |n: Option<i64>| match n {
        Some(n) => vec![input(TemplateId::UNIT_COST, Value::number(n))],
        None => Vec::new(),
    };
    let five = create(&store, account, ResourceType::Part, cost(Some(5)));
    let empty = create(&store, account, ResourceType::Part, cost(None));
    let nine = create(&store, account, ResourceType::Part, cost(Some(9)));
    let five_again = create(&store, account, ResourceType::Part, cost(Some(5)));

    let order = json!([{"var": "Unit Cost", "dir": "asc"}]);
    let parts = store
        .read_resources(account, ResourceType::Part, None, Some(&order))
        .unwrap();
    assert_eq!(
        parts.iter().map(|p| p.id).collect::<Vec<_>>(),
        vec![five_again.id, five.id, nine.id, empty.id]
    );

    let order = json!([{"var": "Unit Cost", "dir": "desc"}]);
    let parts = store
        .read_resources(account, ResourceType::Part, None, Some(&order))
        .unwrap();
    assert_eq!(parts.last().map(|p| p.id), Some(empty.id));
    assert_eq!(parts[0].id, nine.id);
}

#[test]
fn test_conjunction_of_ranges() {
    let (store, account) = store();
    let line = |unit: i64| {
        create(
            &store,
            account,
            ResourceType::Line,
            vec![
                input(TemplateId::UNIT_COST, Value::number(unit)),
                input(TemplateId::QUANTITY, Value::number(1)),
            ],
        )
    };
    line(5);
    let twelve = line(12);
    line(40);

    let filter = json!({"and": [
        {">=": [{"var": "Total Cost"}, 10]},
        {"<": [{"var": "Total Cost"}, 20]}
    ]});
    let lines = store
        .read_resources(account, ResourceType::Line, Some(&filter), None)
        .unwrap();
    assert_eq!(lines.iter().map(|l| l.id).collect::<Vec<_>>(), vec![twelve.id]);

    let filter = json!({"!=": [{"var": "Total Cost"}, 40]});
    let lines = store
        .read_resources(account, ResourceType::Line, Some(&filter), None)
        .unwrap();
    assert_eq!(lines.len(), 2);
}

#[test]
fn test_uncompilable_filters_are_counted() {
    let (store, account) = store();
    let filter = json!({"==": [{"var": "Colour"}, "red"]});
    assert!(store
        .read_resources(account, ResourceType::Bill, Some(&filter), None)
        .is_err());

    let rendered = fieldbook::metrics::METRICS.render();
    assert!(rendered.contains("fieldbook_filter_errors"), "{rendered}");
}
