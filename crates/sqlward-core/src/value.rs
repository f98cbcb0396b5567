//! Values exchanged with the datastore.
//!
//! Everything that crosses the boundary between callers, the query layer and
//! the cache is expressed with the types in this module: bound parameters and
//! row cells are [`SqlValue`]s, raw result rows are [`Row`]s and
//! "beautified" rows are [`Record`]s keyed by column name.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp layout used for `DATETIME` values and `now` substitution.
pub const DATE_AND_TIME: &str = "%Y-%m-%d %H:%M:%S";

/// Date layout used for `DATE` values and `current_date` substitution.
pub const DATE_ONLY: &str = "%Y-%m-%d";

/// A single scalar that can be bound to a placeholder or read from a cell.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Bool(b) => Some(i64::from(*b)),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Render the value as an inline SQL literal.
    ///
    /// Only meant for logs and debugging output: statements sent to the
    /// datastore always carry values as bound parameters.
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Int(i) => write!(f, "{}", i),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<u32> for SqlValue {
    fn from(value: u32) -> Self {
        SqlValue::Int(i64::from(value))
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Float(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<chrono::NaiveDateTime> for SqlValue {
    fn from(value: chrono::NaiveDateTime) -> Self {
        SqlValue::Text(value.format(DATE_AND_TIME).to_string())
    }
}

impl From<chrono::NaiveDate> for SqlValue {
    fn from(value: chrono::NaiveDate) -> Self {
        SqlValue::Text(value.format(DATE_ONLY).to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// A result row in column order.
pub type Row = Vec<SqlValue>;

/// A result row keyed by column name.
pub type Record = BTreeMap<String, SqlValue>;

/// Rows returned by a select, either raw or beautified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "items", rename_all = "snake_case")]
pub enum TableData {
    Rows(Vec<Row>),
    Records(Vec<Record>),
}

impl TableData {
    pub fn len(&self) -> usize {
        match self {
            TableData::Rows(rows) => rows.len(),
            TableData::Records(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zip column names with each row.
    pub fn beautify(columns: &[String], rows: Vec<Row>) -> Vec<Record> {
        rows.into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

/// Which columns a select or write targets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnSelection {
    /// `*`
    #[default]
    All,
    Names(Vec<String>),
    /// Select-list text such as `COUNT(id)`, rendered as given once it
    /// passes injection checks.
    Expression(String),
}

impl ColumnSelection {
    pub fn is_all(&self) -> bool {
        match self {
            ColumnSelection::All => true,
            ColumnSelection::Names(names) => names.is_empty(),
            ColumnSelection::Expression(expr) => expr.trim().is_empty(),
        }
    }

    pub fn names(&self) -> &[String] {
        match self {
            ColumnSelection::Names(names) => names,
            _ => &[],
        }
    }

    pub fn expression(expr: impl Into<String>) -> Self {
        ColumnSelection::Expression(expr.into())
    }
}

impl From<&str> for ColumnSelection {
    /// `"*"` selects everything. A comma separated list of bare names is
    /// `Names`; any other text is kept whole as an `Expression`.
    fn from(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return ColumnSelection::All;
        }
        if !trimmed.split(',').filter(|c| !c.trim().is_empty()).all(is_bare_name) {
            return ColumnSelection::Expression(trimmed.to_string());
        }
        ColumnSelection::Names(
            trimmed
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }
}

fn is_bare_name(piece: &str) -> bool {
    piece
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.' | '`'))
}

impl From<Vec<String>> for ColumnSelection {
    fn from(value: Vec<String>) -> Self {
        ColumnSelection::Names(value)
    }
}

impl From<Vec<&str>> for ColumnSelection {
    fn from(value: Vec<&str>) -> Self {
        ColumnSelection::Names(value.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for ColumnSelection {
    fn from(value: &[&str]) -> Self {
        ColumnSelection::Names(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Caller supplied `WHERE` material.
///
/// A list of fragments is combined with `AND`; an empty filter means the
/// statement carries no `WHERE` clause at all.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    #[default]
    None,
    Clause(String),
    Fragments(Vec<String>),
}

impl Filter {
    /// Non-blank fragments in caller order.
    pub fn fragments(&self) -> Vec<&str> {
        match self {
            Filter::None => Vec::new(),
            Filter::Clause(clause) => {
                if clause.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![clause.as_str()]
                }
            }
            Filter::Fragments(parts) => parts
                .iter()
                .map(String::as_str)
                .filter(|p| !p.trim().is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fragments().is_empty()
    }
}

impl From<&str> for Filter {
    fn from(value: &str) -> Self {
        Filter::Clause(value.to_string())
    }
}

impl From<String> for Filter {
    fn from(value: String) -> Self {
        Filter::Clause(value)
    }
}

impl From<Vec<String>> for Filter {
    fn from(value: Vec<String>) -> Self {
        Filter::Fragments(value)
    }
}

impl From<Vec<&str>> for Filter {
    fn from(value: Vec<&str>) -> Self {
        Filter::Fragments(value.into_iter().map(str::to_string).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Filter {
    fn from(value: [&str; N]) -> Self {
        Filter::Fragments(value.iter().map(|s| s.to_string()).collect())
    }
}

/// Parsed server version (`SELECT VERSION()`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    /// Full string as reported by the server, e.g. `8.0.36-0ubuntu0.22.04.1`.
    pub raw: String,
}

impl DbVersion {
    /// Parse a version string; suffixes like `-MariaDB` are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('.').map(leading_number);
        let major = parts.next()??;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);
        Some(Self {
            major,
            minor,
            patch,
            raw: raw.trim().to_string(),
        })
    }
}

impl fmt::Display for DbVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn leading_number(part: &str) -> Option<u32> {
    let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// One row of `DESCRIBE <table>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub field: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
    pub key: String,
    pub default: Option<String>,
    pub extra: String,
}

/// Result of a successful mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub rows_affected: u64,
}

impl WriteOutcome {
    pub fn new(rows_affected: u64) -> Self {
        Self { rows_affected }
    }

    /// Combine the outcome of several statements issued for one operation.
    pub fn merge(self, other: WriteOutcome) -> Self {
        Self {
            rows_affected: self.rows_affected + other.rows_affected,
        }
    }
}
