//! PostgreSQL connection implementation

use crate::database::dialect::Driver;
use crate::database::traits::{Connection, DatabaseError, ExecResult, Row};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::types::Uuid;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};
use tracing::debug;

/// PostgreSQL connection backed by a `sqlx` pool
#[derive(Clone)]
pub struct PostgresConnection {
    pool: PgPool,
}

impl PostgresConnection {
    /// Create a new PostgreSQL connection
    ///
    /// # Arguments
    ///
    /// * `pool` - PostgreSQL connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Bind JSON arguments in placeholder order
    ///
    /// Text arguments aimed at typed columns rely on the `CAST(? AS type)`
    /// wrapping produced by the dialect.
    fn bind_args<'q>(
        mut query: Query<'q, Postgres, PgArguments>,
        args: &[Value],
    ) -> Query<'q, Postgres, PgArguments> {
        for arg in args {
            query = match arg {
                Value::Null => query.bind(None::<String>),
                Value::Bool(flag) => query.bind(*flag),
                Value::Number(number) => match number.as_i64() {
                    Some(integer) => query.bind(integer),
                    None => query.bind(number.as_f64()),
                },
                Value::String(text) => query.bind(text.clone()),
                other => query.bind(other.clone()),
            };
        }
        query
    }

    /// Convert a PostgreSQL row to a JSON object
    fn row_to_json(row: &PgRow) -> Result<Row, DatabaseError> {
        let mut map = Row::new();

        for column in row.columns() {
            let name = column.name();
            let value = match column.type_info().name() {
                "BOOL" => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
                "INT2" => row.try_get::<Option<i16>, _>(name)?.map(Value::from),
                "INT4" => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
                "INT8" => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
                "FLOAT4" => row
                    .try_get::<Option<f32>, _>(name)?
                    .and_then(|value| serde_json::Number::from_f64(f64::from(value)))
                    .map(Value::Number),
                "FLOAT8" => row
                    .try_get::<Option<f64>, _>(name)?
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number),
                "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "BPCHAR" => {
                    row.try_get::<Option<String>, _>(name)?.map(Value::String)
                }
                "BYTEA" => row
                    .try_get::<Option<Vec<u8>>, _>(name)?
                    .map(|bytes| Value::String(format!("[BLOB: {} bytes]", bytes.len()))),
                "TIMESTAMP" => row
                    .try_get::<Option<NaiveDateTime>, _>(name)?
                    .map(|value| Value::String(value.format("%Y-%m-%d %H:%M:%S").to_string())),
                "TIMESTAMPTZ" => row
                    .try_get::<Option<DateTime<Utc>>, _>(name)?
                    .map(|value| Value::String(value.to_rfc3339())),
                "DATE" => row
                    .try_get::<Option<NaiveDate>, _>(name)?
                    .map(|value| Value::String(value.to_string())),
                "TIME" => row
                    .try_get::<Option<NaiveTime>, _>(name)?
                    .map(|value| Value::String(value.to_string())),
                "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(name)?,
                "UUID" => row
                    .try_get::<Option<Uuid>, _>(name)?
                    .map(|value| Value::String(value.to_string())),
                // NUMERIC and anything else: text representation when decodable
                _ => row.try_get::<Option<String>, _>(name).ok().flatten().map(Value::String),
            };

            map.insert(name.to_string(), value.unwrap_or(Value::Null));
        }

        Ok(map)
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver(&self) -> Driver {
        Driver::Postgresql
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DatabaseError> {
        debug!(target: "axum_admin_table::sql", sql, ?args, "query");
        let rows = Self::bind_args(sqlx::query(sql), args)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_json).collect()
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, DatabaseError> {
        debug!(target: "axum_admin_table::sql", sql, ?args, "exec");
        let outcome = Self::bind_args(sqlx::query(sql), args)
            .execute(&self.pool)
            .await?;
        Ok(ExecResult {
            rows_affected: outcome.rows_affected(),
            last_insert_id: None,
        })
    }
}
