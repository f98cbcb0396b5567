use crate::error::PoolError;
use async_trait::async_trait;
use serde::Serialize;
use sqlward_core::{Record, Row, SqlValue, WriteOutcome};

/// Result set of a query: column names in order, then the rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryRows {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Index of a column, compared case-insensitively.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// First cell of the first row.
    pub fn scalar(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|row| row.first())
    }

    pub fn into_records(self) -> Vec<Record> {
        sqlward_core::TableData::beautify(&self.columns, self.rows)
    }
}

#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Run a query and return every row. Acquires and releases a connection.
    async fn fetch_all(&self, statement: &str, params: &[SqlValue]) -> Result<QueryRows, PoolError>;

    /// Run a mutation and commit it.
    async fn execute(&self, statement: &str, params: &[SqlValue]) -> Result<WriteOutcome, PoolError>;

    /// Whether the pool still hands out connections.
    fn is_active(&self) -> bool;
}
