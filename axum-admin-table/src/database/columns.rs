//! Column introspection
//!
//! Columns are read from the database on every operation; nothing is cached so
//! schema changes are picked up immediately.

use crate::database::dialect::Dialect;
use crate::database::traits::{Connection, DatabaseError};
use serde_json::Value;
use tracing::debug;

/// One physical column of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,

    /// Declared type as reported by the engine (if any)
    pub data_type: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.filter(|value| !value.is_empty()).map(str::to_string),
        }
    }
}

/// Ordered column set of a table plus the auto-increment flag of its primary key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns {
    columns: Vec<Column>,
    auto: bool,
}

impl Columns {
    pub fn new(columns: Vec<Column>, auto: bool) -> Self {
        Self { columns, auto }
    }

    /// Build from bare names (types unknown)
    pub fn from_names<I, S>(names: I, auto: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns = names
            .into_iter()
            .map(|name| Column {
                name: name.into(),
                data_type: None,
            })
            .collect();
        Self { columns, auto }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    pub fn type_of(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .and_then(|column| column.data_type.as_deref())
    }

    /// Whether the primary key is generated by the database
    pub fn is_auto(&self) -> bool {
        self.auto
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

/// Fetch the columns of `table` and detect whether `primary_key` is auto-generated
pub async fn introspect(
    connection: &dyn Connection,
    dialect: &dyn Dialect,
    table: &str,
    primary_key: &str,
) -> Result<Columns, DatabaseError> {
    let (sql, args) = dialect.columns_query(table);
    let rows = connection.query(&dialect.finalize(&sql), &args).await?;
    let mut columns = dialect.parse_columns(&rows, primary_key);
    if columns.is_empty() {
        return Err(DatabaseError::TableNotFound(table.to_string()));
    }

    if !columns.auto {
        if let Some((lookup, lookup_args)) = dialect.sequence_lookup(table) {
            // the tracking table only exists once some table used AUTOINCREMENT
            columns.auto = match connection.query(&dialect.finalize(&lookup), &lookup_args).await {
                Ok(rows) => rows
                    .first()
                    .and_then(|row| row.values().next())
                    .map(count_value)
                    .is_some_and(|count| count > 0),
                Err(error) => {
                    debug!(table, %error, "sequence lookup failed, assuming no auto increment");
                    false
                }
            };
        }
    }

    debug!(
        table,
        columns = columns.len(),
        auto = columns.auto,
        "introspected table columns"
    );
    Ok(columns)
}

/// Read a count that may arrive as a number or as text
pub fn count_value(value: &Value) -> u64 {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().map(|float| float as u64))
            .unwrap_or_default(),
        Value::String(text) => text.trim().parse().unwrap_or_default(),
        _ => 0,
    }
}
