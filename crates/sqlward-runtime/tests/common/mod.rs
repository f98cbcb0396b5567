//! In-memory connection pool for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlward_core::{SqlValue, WriteOutcome};
use sqlward_runtime::{ConnectionPool, PoolError, QueryRows};
use std::sync::Mutex;

/// A statement the pool was asked to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Records every statement and answers queries from scripted responses,
/// matched by statement prefix. Unmatched queries return no rows.
#[derive(Default)]
pub struct RecordingPool {
    statements: Mutex<Vec<Recorded>>,
    responses: Mutex<Vec<(String, Result<QueryRows, PoolError>)>>,
    write_error: Mutex<Option<PoolError>>,
    write_failures: Mutex<Vec<(String, PoolError)>>,
}

impl RecordingPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries starting with `prefix`. Later scripts win.
    pub fn respond(&self, prefix: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) {
        let rows = QueryRows::new(columns.iter().map(|c| c.to_string()).collect(), rows);
        self.responses
            .lock()
            .unwrap()
            .insert(0, (prefix.to_string(), Ok(rows)));
    }

    pub fn fail_queries(&self, prefix: &str, err: PoolError) {
        self.responses
            .lock()
            .unwrap()
            .insert(0, (prefix.to_string(), Err(err)));
    }

    pub fn fail_writes(&self, err: PoolError) {
        *self.write_error.lock().unwrap() = Some(err);
    }

    /// Fail only writes starting with `prefix`.
    pub fn fail_writes_matching(&self, prefix: &str, err: PoolError) {
        self.write_failures
            .lock()
            .unwrap()
            .push((prefix.to_string(), err));
    }

    pub fn statements(&self) -> Vec<Recorded> {
        self.statements.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|s| s.sql).collect()
    }

    pub fn last(&self) -> Recorded {
        self.statements().pop().expect("no statement recorded")
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.sql().iter().filter(|s| s.starts_with(prefix)).count()
    }

    pub fn clear(&self) {
        self.statements.lock().unwrap().clear();
    }

    fn record(&self, sql: &str, params: &[SqlValue]) {
        self.statements.lock().unwrap().push(Recorded {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
    }
}

#[async_trait]
impl ConnectionPool for RecordingPool {
    async fn fetch_all(&self, statement: &str, params: &[SqlValue]) -> Result<QueryRows, PoolError> {
        self.record(statement, params);
        let responses = self.responses.lock().unwrap();
        match responses.iter().find(|(prefix, _)| statement.starts_with(prefix.as_str())) {
            Some((_, response)) => response.clone(),
            None => Ok(QueryRows::default()),
        }
    }

    async fn execute(&self, statement: &str, params: &[SqlValue]) -> Result<WriteOutcome, PoolError> {
        self.record(statement, params);
        let matching = self
            .write_failures
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
            .map(|(_, err)| err.clone());
        if let Some(err) = matching {
            return Err(err);
        }
        match self.write_error.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(WriteOutcome::new(1)),
        }
    }

    fn is_active(&self) -> bool {
        true
    }
}
