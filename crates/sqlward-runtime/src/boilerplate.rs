//! Statement builders for the schema and row operations.
//!
//! Every identifier goes through the detector and is backtick-quoted before
//! it is interpolated; every value travels as a bound parameter. Nothing
//! rejected here ever reaches the pool.

use crate::error::QueryError;
use crate::pool::{ConnectionPool, QueryRows};
use regex::Regex;
use sqlward_core::{
    ColumnDescription, ColumnSelection, DbVersion, Filter, Row, SqlValue, TableData, WriteOutcome,
};
use sqlward_sanitize::{
    InjectionCategory, InjectionDetector, ParameterizedClause, Parameterizer, PatternFamilies,
    SanitizeError, clean_trigger_creation, quote_column, quote_columns, quote_identifier,
};
use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};
use tokio::sync::RwLock;

static COLUMN_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_(), .]+$").expect("column type pattern is valid")
});

static DEFAULT_CURRENT_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bDEFAULT\s+CURRENT_TIMESTAMP(?:\s*\(\s*\))?")
        .expect("timestamp default pattern is valid")
});

pub struct QueryBoilerplates {
    pool: Arc<dyn ConnectionPool>,
    parameterizer: Parameterizer,
    version: RwLock<Option<DbVersion>>,
}

impl std::fmt::Debug for QueryBoilerplates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBoilerplates")
            .field("pool_active", &self.pool.is_active())
            .field("parameterizer", &self.parameterizer)
            .finish()
    }
}

impl QueryBoilerplates {
    pub fn new(pool: Arc<dyn ConnectionPool>, parameterizer: Parameterizer) -> Self {
        Self {
            pool,
            parameterizer,
            version: RwLock::new(None),
        }
    }

    pub fn pool(&self) -> &Arc<dyn ConnectionPool> {
        &self.pool
    }

    pub fn parameterizer(&self) -> &Parameterizer {
        &self.parameterizer
    }

    pub fn detector(&self) -> &InjectionDetector {
        self.parameterizer.detector()
    }

    /// Last version seen by [`get_database_version`](Self::get_database_version).
    pub async fn database_version(&self) -> Option<DbVersion> {
        self.version.read().await.clone()
    }

    /// Record a version obtained elsewhere, e.g. from the cache.
    pub async fn set_database_version(&self, version: Option<DbVersion>) {
        *self.version.write().await = version;
    }

    // -----------------------------
    // schema reads
    // -----------------------------

    pub async fn get_database_version(&self) -> Result<DbVersion, QueryError> {
        let rows = self.fetch("get_database_version", "SELECT VERSION()", &[]).await?;
        let raw = rows.scalar().and_then(cell_text).unwrap_or_default();
        let version = DbVersion::parse(&raw).ok_or_else(|| {
            QueryError::invalid(format!("unrecognized server version '{}'", raw))
        })?;
        tracing::debug!(version = %version, "database version refreshed");
        self.set_database_version(Some(version.clone())).await;
        Ok(version)
    }

    pub async fn get_table_names(&self) -> Result<Vec<String>, QueryError> {
        let rows = self.fetch("get_table_names", "SHOW TABLES", &[]).await?;
        Ok(first_column(rows))
    }

    pub async fn describe_table(&self, table: &str) -> Result<Vec<ColumnDescription>, QueryError> {
        let quoted = self.quote_table("describe_table", table)?;
        let rows = self
            .fetch("describe_table", &format!("DESCRIBE {}", quoted), &[])
            .await?;

        let index = |name: &str, fallback: usize| rows.column_index(name).unwrap_or(fallback);
        let (field, kind, null, key, default, extra) = (
            index("Field", 0),
            index("Type", 1),
            index("Null", 2),
            index("Key", 3),
            index("Default", 4),
            index("Extra", 5),
        );
        let text = |row: &Row, i: usize| row.get(i).and_then(cell_text).unwrap_or_default();

        Ok(rows
            .rows
            .iter()
            .map(|row| ColumnDescription {
                field: text(row, field),
                column_type: text(row, kind),
                nullable: text(row, null).eq_ignore_ascii_case("YES"),
                key: text(row, key),
                default: row.get(default).and_then(cell_text),
                extra: text(row, extra),
            })
            .collect())
    }

    pub async fn get_table_column_names(&self, table: &str) -> Result<Vec<String>, QueryError> {
        Ok(self
            .describe_table(table)
            .await?
            .into_iter()
            .map(|c| c.field)
            .collect())
    }

    pub async fn get_triggers(&self) -> Result<BTreeMap<String, String>, QueryError> {
        let rows = self
            .fetch(
                "get_triggers",
                "SELECT TRIGGER_NAME, ACTION_STATEMENT FROM information_schema.triggers \
                 WHERE TRIGGER_SCHEMA = DATABASE() ORDER BY TRIGGER_NAME",
                &[],
            )
            .await?;

        let mut triggers = BTreeMap::new();
        for row in &rows.rows {
            let name = row.first().and_then(cell_text);
            let statement = row.get(1).and_then(cell_text);
            if let (Some(name), Some(statement)) = (name, statement) {
                triggers.insert(name, statement);
            }
        }
        Ok(triggers)
    }

    /// `SHOW CREATE TRIGGER` text, `None` when the server returns nothing.
    pub async fn get_trigger(
        &self,
        name: &str,
        database: Option<&str>,
    ) -> Result<Option<String>, QueryError> {
        let quoted = self.quote("get_trigger", name)?;
        let target = match database {
            Some(db) => format!("{}.{}", self.quote("get_trigger", db)?, quoted),
            None => quoted,
        };
        let rows = self
            .fetch("get_trigger", &format!("SHOW CREATE TRIGGER {}", target), &[])
            .await?;

        let statement = rows.column_index("SQL Original Statement").unwrap_or(2);
        Ok(rows
            .rows
            .first()
            .and_then(|row| row.get(statement))
            .and_then(cell_text))
    }

    pub async fn get_trigger_names(&self, database: Option<&str>) -> Result<Vec<String>, QueryError> {
        let (sql, params) = match database {
            Some(db) => {
                self.quote("get_trigger_names", db)?;
                (
                    "SELECT TRIGGER_NAME FROM information_schema.triggers \
                     WHERE TRIGGER_SCHEMA = ? ORDER BY TRIGGER_NAME",
                    vec![SqlValue::from(db)],
                )
            }
            None => (
                "SELECT TRIGGER_NAME FROM information_schema.triggers \
                 WHERE TRIGGER_SCHEMA = DATABASE() ORDER BY TRIGGER_NAME",
                Vec::new(),
            ),
        };
        let rows = self.fetch("get_trigger_names", sql, &params).await?;
        Ok(first_column(rows))
    }

    // -----------------------------
    // schema writes
    // -----------------------------

    /// `CREATE TABLE IF NOT EXISTS` from `(name, type definition)` pairs.
    pub async fn create_table(
        &self,
        table: &str,
        columns: &[(String, String)],
    ) -> Result<WriteOutcome, QueryError> {
        let quoted_table = self.quote_table("create_table", table)?;
        if columns.is_empty() {
            return Err(QueryError::invalid(format!(
                "table '{}' needs at least one column",
                table
            )));
        }

        let legacy_server = self
            .database_version()
            .await
            .is_none_or(|v| v.major <= 5);

        let mut definitions = Vec::with_capacity(columns.len());
        for (name, definition) in columns {
            let column = quote_column(name, self.detector())
                .map_err(|e| reject("create_table", e))?;
            let definition = definition.trim();
            if !COLUMN_TYPE.is_match(definition) {
                return Err(reject(
                    "create_table",
                    SanitizeError::InjectionDetected {
                        input: definition.to_string(),
                        category: InjectionCategory::Symbol,
                    },
                ));
            }

            let definition = if legacy_server && DEFAULT_CURRENT_TIMESTAMP.is_match(definition) {
                tracing::warn!(
                    table = %table,
                    column = %name,
                    "server does not support DEFAULT CURRENT_TIMESTAMP here, using NULL"
                );
                DEFAULT_CURRENT_TIMESTAMP
                    .replace_all(definition, "NULL")
                    .into_owned()
            } else {
                definition.to_string()
            };
            definitions.push(format!("{} {}", column, definition));
        }

        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE=InnoDB",
            quoted_table,
            definitions.join(", ")
        );
        self.run("create_table", &sql, &[]).await
    }

    pub async fn remove_table(&self, table: &str) -> Result<WriteOutcome, QueryError> {
        let quoted = self.quote_table("remove_table", table)?;
        self.run("remove_table", &format!("DROP TABLE IF EXISTS {}", quoted), &[])
            .await
    }

    pub async fn drop_table(&self, table: &str) -> Result<WriteOutcome, QueryError> {
        self.remove_table(table).await
    }

    /// Replace any trigger called `name` with the cleaned definition.
    pub async fn insert_trigger(
        &self,
        name: &str,
        table: &str,
        timing_event: &str,
        body: &str,
    ) -> Result<WriteOutcome, QueryError> {
        let statement = clean_trigger_creation(name, table, timing_event, body, self.detector())
            .map_err(|e| reject("insert_trigger", e))?;

        let dropped = self.remove_trigger(name).await?;
        let created = match self.run("insert_trigger", &statement, &[]).await {
            Ok(created) => created,
            Err(err) => {
                tracing::warn!(
                    trigger = %name,
                    table = %table,
                    error = %err,
                    "previous trigger was dropped and the replacement failed to create"
                );
                return Err(err);
            }
        };
        tracing::info!(trigger = %name, table = %table, "trigger installed");
        Ok(dropped.merge(created))
    }

    pub async fn create_trigger(
        &self,
        name: &str,
        table: &str,
        timing_event: &str,
        body: &str,
    ) -> Result<WriteOutcome, QueryError> {
        self.insert_trigger(name, table, timing_event, body).await
    }

    pub async fn insert_or_update_trigger(
        &self,
        name: &str,
        table: &str,
        timing_event: &str,
        body: &str,
    ) -> Result<WriteOutcome, QueryError> {
        self.insert_trigger(name, table, timing_event, body).await
    }

    pub async fn remove_trigger(&self, name: &str) -> Result<WriteOutcome, QueryError> {
        let quoted = self.quote("remove_trigger", name)?;
        self.run("remove_trigger", &format!("DROP TRIGGER IF EXISTS {}", quoted), &[])
            .await
    }

    pub async fn drop_trigger(&self, name: &str) -> Result<WriteOutcome, QueryError> {
        self.remove_trigger(name).await
    }

    // -----------------------------
    // row reads
    // -----------------------------

    pub async fn get_data_from_table(
        &self,
        table: &str,
        columns: &ColumnSelection,
        filter: &Filter,
        beautify: bool,
    ) -> Result<TableData, QueryError> {
        let quoted_table = self.quote_table("get_data_from_table", table)?;
        let selected = self.select_list("get_data_from_table", columns)?;
        let clause = self.clause("get_data_from_table", filter)?;

        let sql = format!("SELECT {} FROM {}{}", selected, quoted_table, clause.where_sql());
        let rows = self.fetch("get_data_from_table", &sql, &clause.params).await?;

        Ok(if beautify {
            TableData::Records(rows.into_records())
        } else {
            TableData::Rows(rows.rows)
        })
    }

    /// `COUNT(column)` over the filtered rows; `*` counts every row.
    pub async fn get_table_size(
        &self,
        table: &str,
        column: &str,
        filter: &Filter,
    ) -> Result<u64, QueryError> {
        let quoted_table = self.quote_table("get_table_size", table)?;
        let counted = match column.trim() {
            "" | "*" => "*".to_string(),
            name => quote_column(name, self.detector()).map_err(|e| reject("get_table_size", e))?,
        };
        let clause = self.clause("get_table_size", filter)?;

        let sql = format!(
            "SELECT COUNT({}) FROM {}{}",
            counted,
            quoted_table,
            clause.where_sql()
        );
        let rows = self.fetch("get_table_size", &sql, &clause.params).await?;
        Ok(count_of(&rows))
    }

    // -----------------------------
    // row writes
    // -----------------------------

    /// Multi-row `INSERT`. Columns default to the table's own.
    pub async fn insert_data_into_table(
        &self,
        table: &str,
        rows: &[Row],
        columns: Option<&[String]>,
    ) -> Result<WriteOutcome, QueryError> {
        let quoted_table = self.quote_table("insert_data_into_table", table)?;
        let quoted_columns = self
            .target_columns("insert_data_into_table", table, columns)
            .await?;
        if rows.is_empty() {
            tracing::debug!(table = %table, "no rows to insert");
            return Ok(WriteOutcome::default());
        }

        let rows = rows
            .iter()
            .map(|row| self.fit_row(table, row, quoted_columns.len()))
            .collect::<Result<Vec<_>, _>>()?;
        self.insert_rows(&quoted_table, &quoted_columns, rows).await
    }

    /// `UPDATE ... SET` one set of values on every row matching `filter`.
    pub async fn update_data_in_table(
        &self,
        table: &str,
        values: &[SqlValue],
        columns: Option<&[String]>,
        filter: &Filter,
    ) -> Result<WriteOutcome, QueryError> {
        let quoted_table = self.quote_table("update_data_in_table", table)?;
        let quoted_columns = self
            .target_columns("update_data_in_table", table, columns)
            .await?;
        let values = self.fit_row(table, values, quoted_columns.len())?;
        let clause = self.clause("update_data_in_table", filter)?;
        self.update_row(&quoted_table, &quoted_columns, values, clause)
            .await
    }

    /// Per row: update when a row with the same first-column value exists,
    /// insert otherwise.
    pub async fn insert_or_update_data_into_table(
        &self,
        table: &str,
        rows: &[Row],
        columns: Option<&[String]>,
    ) -> Result<WriteOutcome, QueryError> {
        let quoted_table = self.quote_table("insert_or_update_data_into_table", table)?;
        let quoted_columns = self
            .target_columns("insert_or_update_data_into_table", table, columns)
            .await?;
        let key_column = &quoted_columns[0];

        let mut outcome = WriteOutcome::default();
        for row in rows {
            if row.is_empty() {
                tracing::warn!(table = %table, "skipping empty row");
                continue;
            }
            let values = self.fit_row(table, row, quoted_columns.len())?;
            let key = values[0].clone();

            let existing = self
                .fetch(
                    "insert_or_update_data_into_table",
                    &format!("SELECT COUNT(*) FROM {} WHERE {} = ?", quoted_table, key_column),
                    std::slice::from_ref(&key),
                )
                .await?;

            let written = if count_of(&existing) > 0 {
                let clause = ParameterizedClause::equals(key_column, key);
                self.update_row(&quoted_table, &quoted_columns, values, clause)
                    .await?
            } else {
                self.insert_rows(&quoted_table, &quoted_columns, vec![values])
                    .await?
            };
            outcome = outcome.merge(written);
        }
        Ok(outcome)
    }

    pub async fn remove_data_from_table(
        &self,
        table: &str,
        filter: &Filter,
    ) -> Result<WriteOutcome, QueryError> {
        let quoted_table = self.quote_table("remove_data_from_table", table)?;
        let clause = self.clause("remove_data_from_table", filter)?;
        let sql = format!("DELETE FROM {}{}", quoted_table, clause.where_sql());
        self.run("remove_data_from_table", &sql, &clause.params).await
    }

    /// Delete every row of `table`.
    pub async fn drop_data_from_table(&self, table: &str) -> Result<WriteOutcome, QueryError> {
        self.remove_data_from_table(table, &Filter::None).await
    }

    // -----------------------------
    // helpers
    // -----------------------------

    fn quote(&self, operation: &str, name: &str) -> Result<String, QueryError> {
        quote_identifier(name, self.detector()).map_err(|e| reject(operation, e))
    }

    fn quote_table(&self, operation: &str, table: &str) -> Result<String, QueryError> {
        self.quote(operation, table)
    }

    fn select_list(&self, operation: &str, columns: &ColumnSelection) -> Result<String, QueryError> {
        if columns.is_all() {
            return Ok("*".to_string());
        }
        if let ColumnSelection::Expression(expr) = columns {
            let expr = expr.trim();
            self.detector()
                .ensure_safe(expr, PatternFamilies::SYMBOLS | PatternFamilies::KEYWORDS)
                .map_err(|e| reject(operation, e))?;
            return Ok(expr.to_string());
        }
        let quoted = quote_columns(columns.names(), self.detector())
            .map_err(|e| reject(operation, e))?;
        Ok(quoted.join(", "))
    }

    fn clause(&self, operation: &str, filter: &Filter) -> Result<ParameterizedClause, QueryError> {
        self.parameterizer
            .parameterize(filter)
            .map_err(|e| reject(operation, e))
    }

    async fn target_columns(
        &self,
        operation: &str,
        table: &str,
        columns: Option<&[String]>,
    ) -> Result<Vec<String>, QueryError> {
        let names = match columns {
            Some(names) if !names.is_empty() => names.to_vec(),
            _ => {
                tracing::debug!(table = %table, "no columns given, using the table's own");
                self.get_table_column_names(table).await?
            }
        };
        if names.is_empty() {
            return Err(QueryError::invalid(format!("table '{}' has no columns", table)));
        }
        quote_columns(&names, self.detector()).map_err(|e| reject(operation, e))
    }

    /// Truncate long rows, reject short ones, normalize every cell.
    fn fit_row(&self, table: &str, row: &[SqlValue], width: usize) -> Result<Row, QueryError> {
        if row.len() < width {
            return Err(QueryError::invalid(format!(
                "row for '{}' has {} values, expected {}",
                table,
                row.len(),
                width
            )));
        }
        if row.len() > width {
            tracing::warn!(
                table = %table,
                values = row.len(),
                columns = width,
                "row longer than column list, extra values dropped"
            );
        }
        Ok(row[..width]
            .iter()
            .map(|v| self.parameterizer.normalize_value(v))
            .collect())
    }

    async fn insert_rows(
        &self,
        quoted_table: &str,
        quoted_columns: &[String],
        rows: Vec<Row>,
    ) -> Result<WriteOutcome, QueryError> {
        let placeholders = format!("({})", vec!["?"; quoted_columns.len()].join(", "));
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quoted_table,
            quoted_columns.join(", "),
            vec![placeholders.as_str(); rows.len()].join(", ")
        );
        let params: Vec<SqlValue> = rows.into_iter().flatten().collect();
        self.run("insert_data_into_table", &sql, &params).await
    }

    async fn update_row(
        &self,
        quoted_table: &str,
        quoted_columns: &[String],
        values: Row,
        clause: ParameterizedClause,
    ) -> Result<WriteOutcome, QueryError> {
        let assignments = quoted_columns
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {}{}",
            quoted_table,
            assignments,
            clause.where_sql()
        );
        let mut params = values;
        params.extend(clause.params);
        self.run("update_data_in_table", &sql, &params).await
    }

    async fn fetch(
        &self,
        operation: &str,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<QueryRows, QueryError> {
        tracing::debug!(operation, sql = %sql, params = params.len(), "query");
        self.pool.fetch_all(sql, params).await.map_err(|e| {
            tracing::error!(operation, error = %e, "query failed");
            QueryError::Pool(e)
        })
    }

    async fn run(
        &self,
        operation: &str,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<WriteOutcome, QueryError> {
        tracing::debug!(operation, sql = %sql, params = params.len(), "statement");
        self.pool.execute(sql, params).await.map_err(|e| {
            tracing::error!(operation, error = %e, "statement failed");
            QueryError::Pool(e)
        })
    }
}

fn reject(operation: &str, err: SanitizeError) -> QueryError {
    match &err {
        SanitizeError::InjectionDetected { category, .. } => {
            tracing::error!(operation, category = %category, "rejected unsafe input");
        }
        other => tracing::error!(operation, error = %other, "rejected input"),
    }
    QueryError::Injection(err)
}

fn cell_text(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => None,
        other => Some(other.to_string()),
    }
}

fn first_column(rows: QueryRows) -> Vec<String> {
    rows.rows
        .iter()
        .filter_map(|row| row.first().and_then(cell_text))
        .collect()
}

fn count_of(rows: &QueryRows) -> u64 {
    rows.scalar()
        .and_then(SqlValue::as_i64)
        .map(|n| n.max(0) as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_charset() {
        assert!(COLUMN_TYPE.is_match("INT AUTO_INCREMENT PRIMARY KEY"));
        assert!(COLUMN_TYPE.is_match("DECIMAL(10, 2) NOT NULL"));
        assert!(!COLUMN_TYPE.is_match("INT; DROP TABLE users"));
        assert!(!COLUMN_TYPE.is_match("VARCHAR(10) DEFAULT 'x'"));
    }

    #[test]
    fn timestamp_default_rewrite() {
        let rewritten = DEFAULT_CURRENT_TIMESTAMP.replace_all("DATETIME default current_timestamp()", "NULL");
        assert_eq!(rewritten, "DATETIME NULL");
    }

    #[test]
    fn counts_from_scalars() {
        let rows = QueryRows::new(vec!["COUNT(*)".into()], vec![vec![SqlValue::Int(4)]]);
        assert_eq!(count_of(&rows), 4);
        let text = QueryRows::new(vec![], vec![vec![SqlValue::from("7")]]);
        assert_eq!(count_of(&text), 7);
        assert_eq!(count_of(&QueryRows::default()), 0);
    }

    #[test]
    fn null_cells_are_skipped() {
        let rows = QueryRows::new(
            vec!["Tables_in_shop".into()],
            vec![vec!["users".into()], vec![SqlValue::Null]],
        );
        assert_eq!(first_column(rows), vec!["users".to_string()]);
    }
}
