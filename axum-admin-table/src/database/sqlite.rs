//! SQLite connection implementation

use crate::database::dialect::Driver;
use crate::database::traits::{Connection, DatabaseError, ExecResult, Row};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteColumn, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, SqlitePool, TypeInfo, ValueRef};
use tracing::debug;

/// SQLite connection backed by a `sqlx` pool
#[derive(Clone)]
pub struct SqliteConnection {
    pool: SqlitePool,
}

impl SqliteConnection {
    /// Create a new SQLite connection
    ///
    /// # Arguments
    ///
    /// * `pool` - SQLite connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Bind JSON arguments in placeholder order
    fn bind_args<'q>(
        mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
        args: &[Value],
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        for arg in args {
            query = match arg {
                Value::Null => query.bind(None::<String>),
                Value::Bool(flag) => query.bind(*flag),
                Value::Number(number) => match number.as_i64() {
                    Some(integer) => query.bind(integer),
                    None => query.bind(number.as_f64()),
                },
                Value::String(text) => query.bind(text.clone()),
                other => query.bind(other.to_string()),
            };
        }
        query
    }

    /// Convert a SQLite row to a JSON object
    fn row_to_json(row: &SqliteRow) -> Result<Row, DatabaseError> {
        let mut map = Row::new();
        for column in row.columns() {
            let value = Self::extract_column_value(row, column)?;
            map.insert(column.name().to_string(), value);
        }
        Ok(map)
    }

    /// Extract a column value from a SQLite row and convert to JSON
    ///
    /// SQLite is dynamically typed, so the declared affinity is only a hint:
    /// when decoding by affinity fails the common types are tried in order.
    fn extract_column_value(row: &SqliteRow, column: &SqliteColumn) -> Result<Value, DatabaseError> {
        let index = column.ordinal();

        if row
            .try_get_raw(index)
            .map_err(|error| DatabaseError::Query(error.to_string()))?
            .is_null()
        {
            return Ok(Value::Null);
        }

        let decoded = match column.type_info().name() {
            "INTEGER" | "BIGINT" | "INT" => row.try_get::<i64, _>(index).ok().map(Value::from),
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
                .try_get::<f64, _>(index)
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            "BOOLEAN" | "BOOL" => row.try_get::<bool, _>(index).ok().map(Value::Bool),
            "BLOB" => row
                .try_get::<Vec<u8>, _>(index)
                .ok()
                .map(|bytes| Value::String(format!("[BLOB: {} bytes]", bytes.len()))),
            _ => row.try_get::<String, _>(index).ok().map(Value::String),
        };
        if let Some(value) = decoded {
            return Ok(value);
        }

        if let Ok(value) = row.try_get::<i64, _>(index) {
            return Ok(Value::from(value));
        }
        if let Ok(value) = row.try_get::<f64, _>(index) {
            if let Some(number) = serde_json::Number::from_f64(value) {
                return Ok(Value::Number(number));
            }
        }
        if let Ok(value) = row.try_get::<String, _>(index) {
            return Ok(Value::String(value));
        }
        if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
            return Ok(Value::String(String::from_utf8_lossy(&value).into_owned()));
        }

        Ok(Value::Null)
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    fn driver(&self) -> Driver {
        Driver::Sqlite
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
        let rows_affected = outcome.rows_affected();
        let last_insert_id = Some(outcome.last_insert_rowid()).filter(|id| rows_affected > 0 && *id > 0);
        Ok(ExecResult {
            rows_affected,
            last_insert_id,
        })
    }
}
