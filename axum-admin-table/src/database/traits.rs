//! SQL executor trait
//!
//! This trait defines the narrow interface the table engine needs from a
//! database: run a statement returning rows, run a statement returning an
//! outcome, and tell which engine it talks to.

use crate::database::dialect::Driver;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// One result row, keyed by column name (or alias)
pub type Row = serde_json::Map<String, Value>;

/// Outcome of a statement that does not return rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Number of rows affected
    pub rows_affected: u64,

    /// Generated identifier of the last inserted row (if the engine reports one)
    pub last_insert_id: Option<i64>,
}

/// SQL executor
///
/// Statements arrive already finalized for the connection's dialect, with
/// arguments in placeholder order.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// The engine behind this connection
    fn driver(&self) -> Driver;

    /// Run a statement and return its rows
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DatabaseError>;

    /// Run a statement and return the affected row count
    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, DatabaseError>;
}

/// Database error type
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Generic database error
    #[error("Database error: {0}")]
    Query(String),

    /// Introspection found no columns
    #[error("Table not found: {0}")]
    TableNotFound(String),
}

/// Write outcomes some drivers report as errors although the write went through
const NO_AFFECT: &str = "no affect";
const IDENTITY_MESSAGES: [&str; 2] = ["LastInsertId is not supported", "There is no generated identity value"];

impl DatabaseError {
    /// Whether a write error is benign for `driver` and must not fail the operation
    pub fn is_tolerated(&self, driver: Driver) -> bool {
        let DatabaseError::Query(message) = self else {
            return false;
        };
        let identity_driver = matches!(driver, Driver::Postgresql | Driver::Mssql);
        message.contains(NO_AFFECT)
            || (identity_driver && IDENTITY_MESSAGES.iter().any(|known| message.contains(known)))
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        DatabaseError::Query(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerated_errors() {
        assert!(DatabaseError::Query("no affect".into()).is_tolerated(Driver::Mysql));
        assert!(DatabaseError::Query("LastInsertId is not supported".into()).is_tolerated(Driver::Postgresql));
        assert!(!DatabaseError::Query("LastInsertId is not supported".into()).is_tolerated(Driver::Sqlite));
        assert!(!DatabaseError::TableNotFound("users".into()).is_tolerated(Driver::Mysql));
        assert!(DatabaseError::Query("pq: no affect".into()).is_tolerated(Driver::Sqlite));
        assert!(!DatabaseError::Query("UNIQUE constraint failed".into()).is_tolerated(Driver::Postgresql));
        assert!(DatabaseError::Query("There is no generated identity value".into())
            .is_tolerated(Driver::Mssql));
    }
}
