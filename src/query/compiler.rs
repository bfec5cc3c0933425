//! Compilation of filters against a Schema.
//!
//! [`compile`] resolves each `var` to a Field, picks the Field's comparable
//! column and checks the literal against the Field's type. The result is a
//! [`ResourceQuery`] that the storage backends execute: PostgreSQL through
//! the SQL rendering in [`super::sql`], the in-memory backend through
//! [`Predicate::matches`].

use super::json_logic::{CompareOp, Direction, JsonLogic, Literal, OrderBy};
use super::QueryError;
use crate::schema::{Field, ResourceType, Schema};
use crate::value::{FieldType, Scalar, ValueColumn, ValueData};
use chrono::NaiveDate;
use serde_json::Value as Json;
use std::cmp::Ordering;
use uuid::Uuid;

/// One comparison against one field's typed column.
///
/// `operand == None` compares against null: `==` matches resources whose
/// field is empty, `!=` those whose field is set. Ordered comparisons never
/// match an empty field, and `!=` against a value matches empty fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field_id: Uuid,
    pub column: ValueColumn,
    pub op: CompareOp,
    pub operand: Option<Scalar>,
}

impl Predicate {
    /// Evaluates the predicate against a field's current data.
    pub fn matches(&self, data: Option<&ValueData>) -> bool {
        let current = data.and_then(ValueData::scalar);
        let Some(operand) = &self.operand else {
            return match self.op {
                CompareOp::Eq => current.is_none(),
                CompareOp::Ne => current.is_some(),
                CompareOp::Lt | CompareOp::Gte => false,
            };
        };
        let ordering = current.as_ref().and_then(|c| c.compare(operand));
        match self.op {
            CompareOp::Eq => ordering == Some(Ordering::Equal),
            CompareOp::Ne => ordering != Some(Ordering::Equal),
            CompareOp::Lt => ordering == Some(Ordering::Less),
            CompareOp::Gte => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub field_id: Uuid,
    pub column: ValueColumn,
    pub direction: Direction,
}

/// A compiled listing query: every predicate must hold. Results are sorted by
/// the order terms (empty values last), then by `key` descending.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceQuery {
    pub account_id: Uuid,
    pub resource_type: ResourceType,
    pub predicates: Vec<Predicate>,
    pub order_by: Vec<OrderTerm>,
}

impl ResourceQuery {
    /// All resources of a type, newest first.
    pub fn all(account_id: Uuid, resource_type: ResourceType) -> Self {
        Self {
            account_id,
            resource_type,
            predicates: Vec::new(),
            order_by: Vec::new(),
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }
}

fn comparable_column<'s>(schema: &'s Schema, var: &str) -> Result<(&'s Field, ValueColumn), QueryError> {
    let field = schema
        .get_field(var)
        .map_err(|_| QueryError::UnknownField(var.to_string()))?;
    let column = ValueColumn::for_slot(field.field_type.slot()).ok_or_else(|| {
        QueryError::UnsupportedFieldType {
            field: field.name.clone(),
            field_type: field.field_type,
        }
    })?;
    Ok((field, column))
}

fn operand(field: &Field, op: CompareOp, literal: &Literal) -> Result<Option<Scalar>, QueryError> {
    let mismatch = || QueryError::TypeMismatch {
        field: field.name.clone(),
        field_type: field.field_type,
        literal: literal.to_string(),
    };
    let scalar = match (field.field_type, literal) {
        (_, Literal::Null) => {
            return match op {
                CompareOp::Eq | CompareOp::Ne => Ok(None),
                CompareOp::Lt | CompareOp::Gte => Err(mismatch()),
            }
        }
        (FieldType::Text | FieldType::Textarea, Literal::String(s)) => Scalar::String(s.clone()),
        (FieldType::Number | FieldType::Money, Literal::Number(n)) => Scalar::Number(*n),
        (FieldType::Checkbox, Literal::Boolean(b)) => Scalar::Boolean(*b),
        (FieldType::Date, Literal::String(s)) => {
            Scalar::Date(NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| mismatch())?)
        }
        (FieldType::Select, Literal::String(s)) => match Uuid::parse_str(s) {
            Ok(id) => Scalar::Id(id),
            Err(_) => {
                let option = field.options.iter().find(|o| o.name == *s).ok_or_else(mismatch)?;
                Scalar::Id(option.id)
            }
        },
        (FieldType::User | FieldType::Resource, Literal::String(s)) => {
            Scalar::Id(Uuid::parse_str(s).map_err(|_| mismatch())?)
        }
        _ => return Err(mismatch()),
    };
    Ok(Some(scalar))
}

/// Compiles a filter and ordering against `schema`.
///
/// # Errors
///
/// Returns [`QueryError::UnknownField`] when a `var` names no Field,
/// [`QueryError::UnsupportedFieldType`] for fields without a comparable
/// column, and [`QueryError::TypeMismatch`] for literals that do not fit the
/// Field's type.
pub fn compile(
    account_id: Uuid,
    schema: &Schema,
    filter: Option<&JsonLogic>,
    order_by: &[OrderBy],
) -> Result<ResourceQuery, QueryError> {
    let mut predicates = Vec::new();
    for (op, var, literal) in filter.map(JsonLogic::comparisons).unwrap_or_default() {
        let (field, column) = comparable_column(schema, var)?;
        predicates.push(Predicate {
            field_id: field.id,
            column,
            op,
            operand: operand(field, op, literal)?,
        });
    }

    let order_by = order_by
        .iter()
        .map(|order| {
            let (field, column) = comparable_column(schema, &order.var)?;
            Ok(OrderTerm {
                field_id: field.id,
                column,
                direction: order.dir,
            })
        })
        .collect::<Result<_, QueryError>>()?;

    Ok(ResourceQuery {
        account_id,
        resource_type: schema.resource_type,
        predicates,
        order_by,
    })
}

/// Parses and compiles raw JSON `where` / `orderBy` inputs.
///
/// # Errors
///
/// Any parse error of [`JsonLogic::parse`] / [`OrderBy::parse_list`] and any
/// compile error of [`compile`].
pub fn compile_json(
    account_id: Uuid,
    schema: &Schema,
    filter: Option<&Json>,
    order_by: Option<&Json>,
) -> Result<ResourceQuery, QueryError> {
    let filter = filter.map(JsonLogic::parse).transpose()?;
    let order_by = order_by.map(OrderBy::parse_list).transpose()?.unwrap_or_default();
    compile(account_id, schema, filter.as_ref(), &order_by)
}
