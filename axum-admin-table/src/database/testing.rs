//! In-memory connection that records statements, for tests

use crate::database::dialect::Driver;
use crate::database::traits::{Connection, DatabaseError, ExecResult, Row};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

/// A statement as received by the connection
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Connection answering queries from canned responses, matched by SQL substring
pub struct RecordingConnection {
    driver: Driver,
    responses: Vec<(String, Vec<Row>)>,
    failures: Vec<(String, String)>,
    last_insert_id: Option<i64>,
    statements: Mutex<Vec<Recorded>>,
}

impl RecordingConnection {
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            responses: Vec::new(),
            failures: Vec::new(),
            last_insert_id: None,
            statements: Mutex::new(Vec::new()),
        }
    }

    /// Answer statements containing `needle` with `rows`
    pub fn respond(mut self, needle: &str, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| row.as_object().cloned().unwrap_or_default())
            .collect();
        self.responses.push((needle.to_string(), rows));
        self
    }

    /// Fail statements containing `needle` with a query error
    pub fn fail(mut self, needle: &str, message: &str) -> Self {
        self.failures.push((needle.to_string(), message.to_string()));
        self
    }

    pub fn with_last_insert_id(mut self, id: i64) -> Self {
        self.last_insert_id = Some(id);
        self
    }

    pub fn statements(&self) -> Vec<Recorded> {
        self.statements.lock().map(|list| list.clone()).unwrap_or_default()
    }

    fn record(&self, sql: &str, args: &[Value]) -> Result<(), DatabaseError> {
        if let Ok(mut list) = self.statements.lock() {
            list.push(Recorded {
                sql: sql.to_string(),
                args: args.to_vec(),
            });
        }
        match self.failures.iter().find(|(needle, _)| sql.contains(needle.as_str())) {
            Some((_, message)) => Err(DatabaseError::Query(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn driver(&self) -> Driver {
        self.driver
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, DatabaseError> {
        self.record(sql, args)?;
        Ok(self
            .responses
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }

    async fn exec(&self, sql: &str, args: &[Value]) -> Result<ExecResult, DatabaseError> {
        self.record(sql, args)?;
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: self.last_insert_id,
        })
    }
}
