//! Table layout of the PostgreSQL backend.
//!
//! One row per Resource in `fb_resource`, one row per (Resource, Field) in
//! `fb_value` with a typed column per comparable slot, cost rows in
//! `fb_cost`, and one JSONB Schema document per account and type in
//! `fb_schema`. Name search uses `pg_trgm`.

use crate::query::sql::{FbCost, FbResource, FbSchema, FbValue};
use sea_query::{ColumnDef, Index, IndexCreateStatement, PostgresQueryBuilder, Table, TableCreateStatement};

pub fn tables() -> Vec<TableCreateStatement> {
    vec![
        Table::create()
            .table(FbSchema::Table)
            .if_not_exists()
            .col(ColumnDef::new(FbSchema::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(FbSchema::AccountId).uuid().not_null())
            .col(ColumnDef::new(FbSchema::ResourceType).text().not_null())
            .col(ColumnDef::new(FbSchema::Document).json_binary().not_null())
            .to_owned(),
        Table::create()
            .table(FbResource::Table)
            .if_not_exists()
            .col(ColumnDef::new(FbResource::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(FbResource::AccountId).uuid().not_null())
            .col(ColumnDef::new(FbResource::ResourceType).text().not_null())
            .col(ColumnDef::new(FbResource::Key).big_integer().not_null())
            .col(ColumnDef::new(FbResource::TemplateId).text().null())
            .to_owned(),
        Table::create()
            .table(FbValue::Table)
            .if_not_exists()
            .col(ColumnDef::new(FbValue::ResourceId).uuid().not_null())
            .col(ColumnDef::new(FbValue::FieldId).uuid().not_null())
            .col(ColumnDef::new(FbValue::Slot).text().not_null())
            .col(ColumnDef::new(FbValue::String).text().null())
            .col(ColumnDef::new(FbValue::Number).decimal().null())
            .col(ColumnDef::new(FbValue::Boolean).boolean().null())
            .col(ColumnDef::new(FbValue::Date).date().null())
            .col(ColumnDef::new(FbValue::OptionId).uuid().null())
            .col(ColumnDef::new(FbValue::UserId).uuid().null())
            .col(ColumnDef::new(FbValue::ReferenceId).uuid().null())
            .col(ColumnDef::new(FbValue::Document).json_binary().null())
            .col(ColumnDef::new(FbValue::UpdatedAt).timestamp_with_time_zone().null())
            .to_owned(),
        Table::create()
            .table(FbCost::Table)
            .if_not_exists()
            .col(ColumnDef::new(FbCost::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(FbCost::ResourceId).uuid().not_null())
            .col(ColumnDef::new(FbCost::Name).text().not_null())
            .col(ColumnDef::new(FbCost::IsPercentage).boolean().not_null())
            .col(ColumnDef::new(FbCost::Value).decimal().not_null())
            .col(ColumnDef::new(FbCost::Position).big_integer().not_null())
            .to_owned(),
    ]
}

pub fn indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("fb_schema_account_type")
            .table(FbSchema::Table)
            .col(FbSchema::AccountId)
            .col(FbSchema::ResourceType)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("fb_resource_account_type_key")
            .table(FbResource::Table)
            .col(FbResource::AccountId)
            .col(FbResource::ResourceType)
            .col(FbResource::Key)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("fb_value_resource_field")
            .table(FbValue::Table)
            .col(FbValue::ResourceId)
            .col(FbValue::FieldId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("fb_value_field_reference")
            .table(FbValue::Table)
            .col(FbValue::FieldId)
            .col(FbValue::ReferenceId)
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("fb_cost_resource")
            .table(FbCost::Table)
            .col(FbCost::ResourceId)
            .if_not_exists()
            .to_owned(),
    ]
}

/// Every statement needed on an empty database, in execution order.
pub fn install_statements() -> Vec<String> {
    let mut statements = vec!["CREATE EXTENSION IF NOT EXISTS pg_trgm".to_string()];
    statements.extend(tables().iter().map(|t| t.build(PostgresQueryBuilder)));
    statements.extend(indexes().iter().map(|i| i.build(PostgresQueryBuilder)));
    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_order() {
        let statements = install_statements();
        assert_eq!(statements.len(), 1 + 4 + 5);
        assert!(statements[0].contains("pg_trgm"));
        assert!(statements[1].starts_with(r#"CREATE TABLE IF NOT EXISTS "fb_schema""#));
        assert!(statements.iter().skip(5).all(|s| s.starts_with("CREATE")));
    }

    #[test]
    fn test_value_table_has_typed_columns() {
        let sql = tables()[2].build(PostgresQueryBuilder);
        for column in ["\"number\" numeric", "\"date\" date", "\"document\" jsonb", "\"option_id\" uuid"] {
            assert!(sql.contains(column), "{column} missing from {sql}");
        }
    }

    #[test]
    fn test_value_rows_are_unique_per_field() {
        let sql = indexes()[2].build(PostgresQueryBuilder);
        assert!(sql.contains("UNIQUE INDEX"), "{sql}");
        assert!(sql.contains(r#"("resource_id", "field_id")"#), "{sql}");
    }
}
