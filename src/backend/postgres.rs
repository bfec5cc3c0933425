//! PostgreSQL storage over an [`Executor`].
//!
//! Statements are built with `sea-query` and run on one connection. A
//! transaction holds the connection for its whole duration, so statements
//! of concurrent operations never interleave inside another's `BEGIN`.
//! The connection lock is a `may` mutex: driver I/O parks the holding
//! coroutine, and waiters park too instead of blocking a worker thread.
//! Key allocation takes a transaction-scoped advisory lock per account and
//! type before reading `max(key)`.

use super::ddl;
use super::{SearchQuery, StorageBackend};
use crate::config::DatabaseConfig;
use crate::connection;
use crate::error::StoreError;
use crate::executor::{Executor, ExecutorError, MayPostgresExecutor};
use crate::query::sql::{self as query_sql, FbCost, FbResource, FbSchema, FbValue};
use crate::query::ResourceQuery;
use crate::resource::{Cost, ResourceRecord};
use crate::schema::{ResourceType, Schema, TemplateId};
use crate::transaction::Transaction;
use crate::value::{Slot, Value, ValueColumns};
use chrono::{DateTime, NaiveDate, Utc};
use may_postgres::types::{FromSql, ToSql};
use may_postgres::Row;
use rust_decimal::Decimal;
use sea_query::{Expr, ExprTrait, OnConflict, Order, PostgresQueryBuilder, Query, Values};
use may::sync::Mutex;
use serde_json::Value as Json;
use uuid::Uuid;

const INSERT_RESOURCE: &str = r#"INSERT INTO "fb_resource" ("id", "account_id", "resource_type", "key", "template_id")
SELECT $1, $2, $3, COALESCE(MAX("key"), 0) + 1, $4 FROM "fb_resource" WHERE "account_id" = $2 AND "resource_type" = $3
RETURNING "key""#;

const INSERT_COST: &str = r#"INSERT INTO "fb_cost" ("id", "resource_id", "name", "is_percentage", "value", "position")
SELECT $1, $2, $3, $4, $5, COALESCE(MAX("position"), 0) + 1 FROM "fb_cost" WHERE "resource_id" = $2"#;

const LOCK_KEYS: &str = "SELECT pg_advisory_xact_lock(hashtext($1))";

const SEARCH_FUZZY: &str = r#"SELECT "r"."id", MAX(similarity("v"."string", $3)) AS "score", "r"."key"
FROM "fb_resource" AS "r" JOIN "fb_value" AS "v" ON "v"."resource_id" = "r"."id"
WHERE "r"."account_id" = $1 AND "r"."resource_type" = $2 AND "v"."field_id" = ANY($4)
  AND (similarity("v"."string", $3) >= $5 OR "v"."string" ILIKE $6)
GROUP BY "r"."id", "r"."key"
ORDER BY "score" DESC, "r"."key" DESC
LIMIT $7"#;

const SEARCH_EXACT: &str = r#"SELECT DISTINCT "r"."id", "r"."key"
FROM "fb_resource" AS "r" JOIN "fb_value" AS "v" ON "v"."resource_id" = "r"."id"
WHERE "r"."account_id" = $1 AND "r"."resource_type" = $2 AND "v"."field_id" = ANY($4)
  AND lower("v"."string") = lower($3)
ORDER BY "r"."key" DESC
LIMIT $5"#;

/// Converts `sea-query` bind values into driver parameters.
///
/// Nulls keep their column type so PostgreSQL can infer the parameter type.
fn bind(values: &Values) -> Result<Vec<Box<dyn ToSql>>, StoreError> {
    use sea_query::Value as V;
    values
        .iter()
        .map(|value| {
            let param: Box<dyn ToSql> = match value {
                V::Bool(v) => Box::new(*v),
                V::Int(v) => Box::new(*v),
                V::BigInt(v) => Box::new(*v),
                V::Float(v) => Box::new(*v),
                V::Double(v) => Box::new(*v),
                V::String(v) => Box::new(v.as_ref().map(|s| String::clone(s))),
                V::Json(v) => Box::new(v.as_ref().map(|j| Json::clone(j))),
                V::Uuid(v) => Box::new(v.as_ref().map(|u| Uuid::clone(u))),
                V::Decimal(v) => Box::new(v.as_ref().map(|d| Decimal::clone(d))),
                V::ChronoDate(v) => Box::new(v.as_ref().map(|d| NaiveDate::clone(d))),
                V::ChronoDateTimeUtc(v) => Box::new(v.as_ref().map(|t| DateTime::<Utc>::clone(t))),
                other => {
                    return Err(StoreError::Executor(ExecutorError::QueryError(format!(
                        "unsupported bind value {other:?}"
                    ))))
                }
            };
            Ok(param)
        })
        .collect()
}

fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T, StoreError> {
    row.try_get(name)
        .map_err(|e| StoreError::Executor(ExecutorError::ParseError(format!("column {name}: {e}"))))
}

fn corrupt(what: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(format!("corrupted row: {what}"))
}

fn record_from_row(row: &Row) -> Result<ResourceRecord, StoreError> {
    let resource_type: String = column(row, "resource_type")?;
    Ok(ResourceRecord {
        id: column(row, "id")?,
        account_id: column(row, "account_id")?,
        resource_type: ResourceType::parse(&resource_type)
            .ok_or_else(|| corrupt(format!("resource type {resource_type:?}")))?,
        key: column(row, "key")?,
        template_id: column::<Option<String>>(row, "template_id")?.map(TemplateId::new),
    })
}

fn value_from_row(row: &Row) -> Result<(Uuid, Value), StoreError> {
    let slot: String = column(row, "slot")?;
    let slot = Slot::parse(&slot).ok_or_else(|| corrupt(format!("slot {slot:?}")))?;
    let columns = ValueColumns {
        string: column(row, "string")?,
        number: column(row, "number")?,
        boolean: column(row, "boolean")?,
        date: column(row, "date")?,
        option_id: column(row, "option_id")?,
        user_id: column(row, "user_id")?,
        reference_id: column(row, "reference_id")?,
        document: column(row, "document")?,
    };
    let value = Value {
        data: columns.into_data(slot)?,
        updated_at: column(row, "updated_at")?,
    };
    Ok((column(row, "field_id")?, value))
}

fn cost_from_row(row: &Row) -> Result<Cost, StoreError> {
    Ok(Cost {
        id: Some(column(row, "id")?),
        name: column(row, "name")?,
        is_percentage: column(row, "is_percentage")?,
        value: column(row, "value")?,
    })
}

/// Escapes `%`, `_` and `\` for use inside an `ILIKE` pattern.
fn like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len() + 2);
    escaped.push('%');
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

pub struct PostgresBackend<E> {
    executor: E,
    connection: Mutex<()>,
}

impl PostgresBackend<MayPostgresExecutor> {
    /// Connects to the configured database.
    ///
    /// # Errors
    ///
    /// [`StoreError::Connection`] if the URL is malformed or the server
    /// cannot be reached.
    pub fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let client = connection::connect(&config.url)?;
        Ok(Self::new(MayPostgresExecutor::new(client)))
    }
}

impl<E: Executor + Send + Sync> PostgresBackend<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            connection: Mutex::new(()),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Creates the tables, indexes and the `pg_trgm` extension if missing.
    ///
    /// # Errors
    ///
    /// Returns the first failing statement's error.
    pub fn install(&self) -> Result<(), StoreError> {
        for statement in ddl::install_statements() {
            self.executor.execute(&statement, &[])?;
        }
        log::info!("installed fieldbook tables");
        Ok(())
    }

    fn query(&self, (sql, values): (String, Values)) -> Result<Vec<Row>, StoreError> {
        let params = bind(&values)?;
        let params: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        Ok(self.executor.query_all(&sql, &params)?)
    }

    fn execute(&self, (sql, values): (String, Values)) -> Result<u64, StoreError> {
        let params = bind(&values)?;
        let params: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        Ok(self.executor.execute(&sql, &params)?)
    }

    fn select_record(&self, condition: Expr) -> Result<Option<ResourceRecord>, StoreError> {
        let statement = Query::select()
            .columns([
                FbResource::Id,
                FbResource::AccountId,
                FbResource::ResourceType,
                FbResource::Key,
                FbResource::TemplateId,
            ])
            .from(FbResource::Table)
            .and_where(condition)
            .to_owned();
        self.query(statement.build(PostgresQueryBuilder))?
            .first()
            .map(record_from_row)
            .transpose()
    }
}

impl<E: Executor + Send + Sync> StorageBackend for PostgresBackend<E> {
    fn transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        let _connection = self
            .connection
            .lock()
            .map_err(|_| StoreError::Storage("connection lock poisoned".to_string()))?;
        let transaction = Transaction::begin(&self.executor)?;
        match f(self) {
            Ok(value) => {
                transaction.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = transaction.rollback() {
                    log::warn!("rollback after {err} failed: {rollback}");
                }
                Err(err)
            }
        }
    }

    fn read_schema(&self, account_id: Uuid, resource_type: ResourceType) -> Result<Option<Schema>, StoreError> {
        let statement = Query::select()
            .column(FbSchema::Document)
            .from(FbSchema::Table)
            .and_where(Expr::col(FbSchema::AccountId).eq(account_id))
            .and_where(Expr::col(FbSchema::ResourceType).eq(resource_type.as_str()))
            .to_owned();
        let rows = self.query(statement.build(PostgresQueryBuilder))?;
        match rows.first() {
            Some(row) => Ok(Some(serde_json::from_value(column::<Json>(row, "document")?)?)),
            None => Ok(None),
        }
    }

    fn save_schema(&self, schema: &Schema) -> Result<(), StoreError> {
        let document = serde_json::to_value(schema)?;
        let mut statement = Query::insert();
        statement
            .into_table(FbSchema::Table)
            .columns([
                FbSchema::Id,
                FbSchema::AccountId,
                FbSchema::ResourceType,
                FbSchema::Document,
            ])
            .values_panic([
                schema.id.into(),
                schema.account_id.into(),
                schema.resource_type.as_str().into(),
                document.into(),
            ])
            .on_conflict(
                OnConflict::columns([FbSchema::AccountId, FbSchema::ResourceType])
                    .update_columns([FbSchema::Document])
                    .to_owned(),
            );
        self.execute(statement.build(PostgresQueryBuilder))?;
        Ok(())
    }

    fn insert_resource(
        &self,
        account_id: Uuid,
        resource_type: ResourceType,
        template_id: Option<&TemplateId>,
    ) -> Result<ResourceRecord, StoreError> {
        let lock_key = format!("{account_id}:{resource_type}");
        self.executor.execute(LOCK_KEYS, &[&lock_key])?;

        let id = Uuid::new_v4();
        let type_name = resource_type.as_str();
        let template = template_id.map(|t| t.as_str().to_string());
        let row = self
            .executor
            .query_one(INSERT_RESOURCE, &[&id, &account_id, &type_name, &template])?;
        Ok(ResourceRecord {
            id,
            account_id,
            resource_type,
            key: column(&row, "key")?,
            template_id: template_id.cloned(),
        })
    }

    fn read_record(&self, id: Uuid) -> Result<Option<ResourceRecord>, StoreError> {
        self.select_record(Expr::col(FbResource::Id).eq(id))
    }

    fn read_record_by_key(
        &self,
        account_id: Uuid,
        resource_type: ResourceType,
        key: i64,
    ) -> Result<Option<ResourceRecord>, StoreError> {
        self.select_record(
            Expr::col(FbResource::AccountId)
                .eq(account_id)
                .and(Expr::col(FbResource::ResourceType).eq(resource_type.as_str()))
                .and(Expr::col(FbResource::Key).eq(key)),
        )
    }

    fn delete_resource(&self, id: Uuid) -> Result<bool, StoreError> {
        self.execute(
            Query::delete()
                .from_table(FbValue::Table)
                .and_where(Expr::col(FbValue::ResourceId).eq(id))
                .to_owned()
                .build(PostgresQueryBuilder),
        )?;
        self.execute(
            Query::delete()
                .from_table(FbCost::Table)
                .and_where(Expr::col(FbCost::ResourceId).eq(id))
                .to_owned()
                .build(PostgresQueryBuilder),
        )?;
        let deleted = self.execute(
            Query::delete()
                .from_table(FbResource::Table)
                .and_where(Expr::col(FbResource::Id).eq(id))
                .to_owned()
                .build(PostgresQueryBuilder),
        )?;
        Ok(deleted > 0)
    }

    fn read_values(&self, resource_id: Uuid) -> Result<Vec<(Uuid, Value)>, StoreError> {
        let statement = Query::select()
            .columns([
                FbValue::FieldId,
                FbValue::Slot,
                FbValue::String,
                FbValue::Number,
                FbValue::Boolean,
                FbValue::Date,
                FbValue::OptionId,
                FbValue::UserId,
                FbValue::ReferenceId,
                FbValue::Document,
                FbValue::UpdatedAt,
            ])
            .from(FbValue::Table)
            .and_where(Expr::col(FbValue::ResourceId).eq(resource_id))
            .to_owned();
        self.query(statement.build(PostgresQueryBuilder))?
            .iter()
            .map(value_from_row)
            .collect()
    }

    fn upsert_value(&self, resource_id: Uuid, field_id: Uuid, value: &Value) -> Result<(), StoreError> {
        let columns = ValueColumns::from_data(&value.data)?;
        let mut statement = Query::insert();
        statement
            .into_table(FbValue::Table)
            .columns([
                FbValue::ResourceId,
                FbValue::FieldId,
                FbValue::Slot,
                FbValue::String,
                FbValue::Number,
                FbValue::Boolean,
                FbValue::Date,
                FbValue::OptionId,
                FbValue::UserId,
                FbValue::ReferenceId,
                FbValue::Document,
                FbValue::UpdatedAt,
            ])
            .values_panic([
                resource_id.into(),
                field_id.into(),
                value.slot().as_str().into(),
                columns.string.into(),
                columns.number.into(),
                columns.boolean.into(),
                columns.date.into(),
                columns.option_id.into(),
                columns.user_id.into(),
                columns.reference_id.into(),
                columns.document.into(),
                value.updated_at.into(),
            ])
            .on_conflict(
                OnConflict::columns([FbValue::ResourceId, FbValue::FieldId])
                    .update_columns([
                        FbValue::Slot,
                        FbValue::String,
                        FbValue::Number,
                        FbValue::Boolean,
                        FbValue::Date,
                        FbValue::OptionId,
                        FbValue::UserId,
                        FbValue::ReferenceId,
                        FbValue::Document,
                        FbValue::UpdatedAt,
                    ])
                    .to_owned(),
            );
        self.execute(statement.build(PostgresQueryBuilder))?;
        Ok(())
    }

    fn read_costs(&self, resource_id: Uuid) -> Result<Vec<Cost>, StoreError> {
        let statement = Query::select()
            .columns([FbCost::Id, FbCost::Name, FbCost::IsPercentage, FbCost::Value])
            .from(FbCost::Table)
            .and_where(Expr::col(FbCost::ResourceId).eq(resource_id))
            .order_by(FbCost::Position, Order::Asc)
            .to_owned();
        self.query(statement.build(PostgresQueryBuilder))?
            .iter()
            .map(cost_from_row)
            .collect()
    }

    fn insert_cost(&self, resource_id: Uuid, cost: &Cost) -> Result<Cost, StoreError> {
        let id = Uuid::new_v4();
        self.executor.execute(
            INSERT_COST,
            &[&id, &resource_id, &cost.name, &cost.is_percentage, &cost.value],
        )?;
        Ok(Cost {
            id: Some(id),
            ..cost.clone()
        })
    }

    fn update_cost(&self, resource_id: Uuid, cost: &Cost) -> Result<bool, StoreError> {
        let Some(id) = cost.id else {
            return Ok(false);
        };
        let statement = Query::update()
            .table(FbCost::Table)
            .values([
                (FbCost::Name, cost.name.clone().into()),
                (FbCost::IsPercentage, cost.is_percentage.into()),
                (FbCost::Value, cost.value.into()),
            ])
            .and_where(Expr::col(FbCost::Id).eq(id))
            .and_where(Expr::col(FbCost::ResourceId).eq(resource_id))
            .to_owned();
        Ok(self.execute(statement.build(PostgresQueryBuilder))? > 0)
    }

    fn delete_cost(&self, resource_id: Uuid, cost_id: Uuid) -> Result<bool, StoreError> {
        let statement = Query::delete()
            .from_table(FbCost::Table)
            .and_where(Expr::col(FbCost::Id).eq(cost_id))
            .and_where(Expr::col(FbCost::ResourceId).eq(resource_id))
            .to_owned();
        Ok(self.execute(statement.build(PostgresQueryBuilder))? > 0)
    }

    fn query_ids(&self, query: &ResourceQuery) -> Result<Vec<Uuid>, StoreError> {
        self.query(query_sql::render(query))?
            .iter()
            .map(|row| column(row, "id"))
            .collect()
    }

    fn search(&self, query: &SearchQuery) -> Result<Vec<Uuid>, StoreError> {
        let type_name = query.resource_type.as_str();
        let input = query.input.trim();
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows = if query.exact {
            self.executor.query_all(
                SEARCH_EXACT,
                &[&query.account_id, &type_name, &input, &query.field_ids, &limit],
            )?
        } else {
            // similarity() returns real
            let threshold = query.threshold as f32;
            let pattern = like_pattern(input);
            self.executor.query_all(
                SEARCH_FUZZY,
                &[
                    &query.account_id,
                    &type_name,
                    &input,
                    &query.field_ids,
                    &threshold,
                    &pattern,
                    &limit,
                ],
            )?
        };
        rows.iter().map(|row| column(row, "id")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// Records every statement; queries return no rows.
    #[derive(Default)]
    struct CapturingExecutor {
        statements: StdMutex<Vec<(String, usize)>>,
    }

    impl CapturingExecutor {
        fn sql(&self) -> Vec<String> {
            self.statements.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
        }
    }

    impl Executor for CapturingExecutor {
        fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, ExecutorError> {
            self.statements.lock().unwrap().push((query.to_string(), params.len()));
            Ok(1)
        }

        fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, ExecutorError> {
            self.statements.lock().unwrap().push((query.to_string(), params.len()));
            Err(ExecutorError::QueryError("no rows".to_string()))
        }

        fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecutorError> {
            self.statements.lock().unwrap().push((query.to_string(), params.len()));
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_transaction_commits_on_success() {
        let backend = PostgresBackend::new(CapturingExecutor::default());
        backend
            .transaction(|tx| tx.upsert_value(Uuid::new_v4(), Uuid::new_v4(), &Value::text("Acme")))
            .unwrap();
        let sql = backend.executor().sql();
        assert_eq!(sql.first().map(String::as_str), Some("BEGIN"));
        assert!(sql[1].starts_with(r#"INSERT INTO "fb_value""#), "{}", sql[1]);
        assert!(sql[1].contains(r#"ON CONFLICT ("resource_id", "field_id") DO UPDATE"#), "{}", sql[1]);
        assert_eq!(sql.last().map(String::as_str), Some("COMMIT"));
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let backend = PostgresBackend::new(CapturingExecutor::default());
        let result: Result<(), StoreError> =
            backend.transaction(|_| Err(StoreError::Storage("boom".to_string())));
        assert!(result.is_err());
        assert_eq!(backend.executor().sql(), vec!["BEGIN", "ROLLBACK"]);
    }

    #[test]
    fn test_insert_resource_locks_account_and_type() {
        let backend = PostgresBackend::new(CapturingExecutor::default());
        let result = backend.insert_resource(Uuid::new_v4(), ResourceType::Bill, None);
        assert!(result.is_err());
        let statements = backend.executor().statements.lock().unwrap().clone();
        assert_eq!(statements[0], (LOCK_KEYS.to_string(), 1));
        assert_eq!(statements[1], (INSERT_RESOURCE.to_string(), 4));
    }

    #[test]
    fn test_upsert_binds_every_column() {
        let backend = PostgresBackend::new(CapturingExecutor::default());
        backend
            .upsert_value(Uuid::new_v4(), Uuid::new_v4(), &Value::number(3))
            .unwrap();
        let statements = backend.executor().statements.lock().unwrap().clone();
        assert_eq!(statements[0].1, 12);
    }

    #[test]
    fn test_query_ids_runs_rendered_sql() {
        let backend = PostgresBackend::new(CapturingExecutor::default());
        let query = ResourceQuery::all(Uuid::new_v4(), ResourceType::Job);
        assert!(backend.query_ids(&query).unwrap().is_empty());
        assert_eq!(backend.executor().sql(), vec![query_sql::render(&query).0]);
    }

    fn search_query(exact: bool) -> SearchQuery {
        SearchQuery {
            account_id: Uuid::new_v4(),
            resource_type: ResourceType::Vendor,
            field_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            input: "  acme ".to_string(),
            exact,
            threshold: 0.3,
            limit: 15,
        }
    }

    #[test]
    fn test_exact_search_compares_lowercased_names() {
        let backend = PostgresBackend::new(CapturingExecutor::default());
        assert!(backend.search(&search_query(true)).unwrap().is_empty());
        let statements = backend.executor().statements.lock().unwrap().clone();
        assert_eq!(statements, vec![(SEARCH_EXACT.to_string(), 5)]);
        assert!(statements[0].0.contains(r#"lower("v"."string") = lower($3)"#));
        assert!(statements[0].0.contains("LIMIT $5"));
    }

    #[test]
    fn test_fuzzy_search_ranks_by_trigram_similarity() {
        let backend = PostgresBackend::new(CapturingExecutor::default());
        assert!(backend.search(&search_query(false)).unwrap().is_empty());
        let statements = backend.executor().statements.lock().unwrap().clone();
        assert_eq!(statements, vec![(SEARCH_FUZZY.to_string(), 7)]);
        let sql = &statements[0].0;
        assert!(sql.contains(r#"similarity("v"."string", $3) >= $5"#), "{sql}");
        assert!(sql.contains(r#""v"."string" ILIKE $6"#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "score" DESC, "r"."key" DESC"#), "{sql}");
    }

    /// Parks the calling coroutine inside every statement, as driver I/O does.
    #[derive(Default)]
    struct YieldingExecutor {
        inner: CapturingExecutor,
    }

    impl Executor for YieldingExecutor {
        fn execute(&self, query: &str, params: &[&dyn ToSql]) -> Result<u64, ExecutorError> {
            may::coroutine::yield_now();
            self.inner.execute(query, params)
        }

        fn query_one(&self, query: &str, params: &[&dyn ToSql]) -> Result<Row, ExecutorError> {
            may::coroutine::yield_now();
            self.inner.query_one(query, params)
        }

        fn query_all(&self, query: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>, ExecutorError> {
            may::coroutine::yield_now();
            self.inner.query_all(query, params)
        }
    }

    #[test]
    fn test_concurrent_coroutine_transactions_do_not_interleave() {
        may::config().set_workers(1).set_stack_size(0x20000);
        let backend = std::sync::Arc::new(PostgresBackend::new(YieldingExecutor::default()));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let backend = std::sync::Arc::clone(&backend);
                may::go!(move || {
                    backend
                        .transaction(|tx| tx.upsert_value(Uuid::new_v4(), Uuid::new_v4(), &Value::number(1)))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sql = backend.executor().inner.sql();
        assert_eq!(sql.len(), 12);
        for statements in sql.chunks(3) {
            assert_eq!(statements[0], "BEGIN");
            assert!(statements[1].starts_with(r#"INSERT INTO "fb_value""#), "{}", statements[1]);
            assert_eq!(statements[2], "COMMIT");
        }
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), r"%50\%\_off%");
    }
}
