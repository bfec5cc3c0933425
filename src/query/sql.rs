//! PostgreSQL rendering of a [`ResourceQuery`] over the EAV tables.
//!
//! ```sql
//! SELECT "r"."id" FROM "fb_resource" AS "r"
//! LEFT JOIN "fb_value" AS "o0" ON "o0"."resource_id" = "r"."id" AND "o0"."field_id" = $1
//! WHERE "r"."account_id" = $2 AND "r"."resource_type" = $3
//!   AND "r"."id" IN (SELECT "resource_id" FROM "fb_value" WHERE "field_id" = $4 AND "option_id" = $5)
//! ORDER BY "o0"."date" DESC NULLS LAST, "r"."key" DESC
//! ```
//!
//! Each predicate becomes an `IN` / `NOT IN` subquery over `fb_value`, so a
//! resource with no row for the field behaves like an empty value.

use super::compiler::{Predicate, ResourceQuery};
use super::json_logic::{CompareOp, Direction};
use crate::value::ValueColumn;
use sea_query::{
    Alias, Cond, Expr, ExprTrait, Iden, JoinType, NullOrdering, Order, PostgresQueryBuilder, Query,
    SelectStatement, Values,
};

#[derive(Debug, Clone, Copy)]
pub enum FbSchema {
    Table,
    Id,
    AccountId,
    ResourceType,
    Document,
}

impl Iden for FbSchema {
    fn unquoted(&self) -> &str {
        match self {
            FbSchema::Table => "fb_schema",
            FbSchema::Id => "id",
            FbSchema::AccountId => "account_id",
            FbSchema::ResourceType => "resource_type",
            FbSchema::Document => "document",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FbResource {
    Table,
    Id,
    AccountId,
    ResourceType,
    Key,
    TemplateId,
}

impl Iden for FbResource {
    fn unquoted(&self) -> &str {
        match self {
            FbResource::Table => "fb_resource",
            FbResource::Id => "id",
            FbResource::AccountId => "account_id",
            FbResource::ResourceType => "resource_type",
            FbResource::Key => "key",
            FbResource::TemplateId => "template_id",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FbValue {
    Table,
    ResourceId,
    FieldId,
    Slot,
    String,
    Number,
    Boolean,
    Date,
    OptionId,
    UserId,
    ReferenceId,
    Document,
    UpdatedAt,
}

impl FbValue {
    pub fn column(column: ValueColumn) -> Self {
        match column {
            ValueColumn::String => FbValue::String,
            ValueColumn::Number => FbValue::Number,
            ValueColumn::Boolean => FbValue::Boolean,
            ValueColumn::Date => FbValue::Date,
            ValueColumn::OptionId => FbValue::OptionId,
            ValueColumn::UserId => FbValue::UserId,
            ValueColumn::ReferenceId => FbValue::ReferenceId,
        }
    }
}

impl Iden for FbValue {
    fn unquoted(&self) -> &str {
        match self {
            FbValue::Table => "fb_value",
            FbValue::ResourceId => "resource_id",
            FbValue::FieldId => "field_id",
            FbValue::Slot => "slot",
            FbValue::String => "string",
            FbValue::Number => "number",
            FbValue::Boolean => "boolean",
            FbValue::Date => "date",
            FbValue::OptionId => "option_id",
            FbValue::UserId => "user_id",
            FbValue::ReferenceId => "reference_id",
            FbValue::Document => "document",
            FbValue::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum FbCost {
    Table,
    Id,
    ResourceId,
    Name,
    IsPercentage,
    Value,
    Position,
}

impl Iden for FbCost {
    fn unquoted(&self) -> &str {
        match self {
            FbCost::Table => "fb_cost",
            FbCost::Id => "id",
            FbCost::ResourceId => "resource_id",
            FbCost::Name => "name",
            FbCost::IsPercentage => "is_percentage",
            FbCost::Value => "value",
            FbCost::Position => "position",
        }
    }
}

fn resource_alias() -> Alias {
    Alias::new("r")
}

/// `SELECT resource_id FROM fb_value WHERE field_id = .. AND <column cond>`.
fn value_subquery(predicate: &Predicate, op: CompareOp) -> SelectStatement {
    let column = Expr::col(FbValue::column(predicate.column));
    let condition = match (&predicate.operand, op) {
        (None, _) => column.is_not_null(),
        (Some(operand), CompareOp::Eq | CompareOp::Ne) => column.eq(operand.to_sea_value()),
        (Some(operand), CompareOp::Lt) => column.lt(operand.to_sea_value()),
        (Some(operand), CompareOp::Gte) => column.gte(operand.to_sea_value()),
    };
    Query::select()
        .column(FbValue::ResourceId)
        .from(FbValue::Table)
        .and_where(Expr::col(FbValue::FieldId).eq(predicate.field_id))
        .and_where(condition)
        .to_owned()
}

fn predicate_condition(predicate: &Predicate) -> Expr {
    let id = Expr::col((resource_alias(), FbResource::Id));
    // `== null` is "no non-null value", `!= x` is "no value equal to x".
    let negated = match (&predicate.operand, predicate.op) {
        (None, CompareOp::Eq) => true,
        (None, _) => false,
        (Some(_), CompareOp::Ne) => true,
        (Some(_), _) => false,
    };
    let subquery = value_subquery(predicate, predicate.op);
    if negated {
        id.not_in_subquery(subquery)
    } else {
        id.in_subquery(subquery)
    }
}

/// Builds the id-selecting statement for `query`.
pub fn select_ids(query: &ResourceQuery) -> SelectStatement {
    let r = resource_alias();
    let mut select = Query::select();
    select
        .column((r.clone(), FbResource::Id))
        .from_as(FbResource::Table, r.clone());

    for (i, term) in query.order_by.iter().enumerate() {
        let alias = Alias::new(format!("o{i}"));
        select.join_as(
            JoinType::LeftJoin,
            FbValue::Table,
            alias.clone(),
            Cond::all()
                .add(Expr::col((alias.clone(), FbValue::ResourceId)).eq(Expr::col((r.clone(), FbResource::Id))))
                .add(Expr::col((alias, FbValue::FieldId)).eq(term.field_id)),
        );
    }

    select
        .and_where(Expr::col((r.clone(), FbResource::AccountId)).eq(query.account_id))
        .and_where(Expr::col((r.clone(), FbResource::ResourceType)).eq(query.resource_type.as_str()));
    for predicate in &query.predicates {
        select.and_where(predicate_condition(predicate));
    }

    for (i, term) in query.order_by.iter().enumerate() {
        let order = match term.direction {
            Direction::Asc => Order::Asc,
            Direction::Desc => Order::Desc,
        };
        select.order_by_with_nulls(
            (Alias::new(format!("o{i}")), FbValue::column(term.column)),
            order,
            NullOrdering::Last,
        );
    }
    select.order_by((r, FbResource::Key), Order::Desc);
    select.to_owned()
}

/// Renders `query` to PostgreSQL with `$n` placeholders.
pub fn render(query: &ResourceQuery) -> (String, Values) {
    select_ids(query).build(PostgresQueryBuilder)
}
