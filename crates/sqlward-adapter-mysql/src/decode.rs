//! Row decoding and error classification.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlward_core::{Row as SqlRow, SqlValue};
use sqlward_runtime::{PoolError, PoolErrorKind};
use sqlx::error::{DatabaseError, ErrorKind};
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};

pub(crate) fn column_names(row: &MySqlRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

pub(crate) fn decode_row(row: &MySqlRow) -> Result<SqlRow, sqlx::Error> {
    (0..row.len()).map(|i| decode_cell(row, i)).collect()
}

fn decode_cell(row: &MySqlRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    let type_name = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }
        raw.type_info().name().to_ascii_uppercase()
    };

    let value = match type_name.as_str() {
        "BOOLEAN" => SqlValue::Bool(row.try_get(index)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            SqlValue::Int(row.try_get(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => {
            let n: u64 = row.try_get(index)?;
            i64::try_from(n)
                .map(SqlValue::Int)
                .unwrap_or_else(|_| SqlValue::Text(n.to_string()))
        }
        "YEAR" => SqlValue::Int(i64::from(row.try_get_unchecked::<u16, _>(index)?)),
        "FLOAT" => SqlValue::Float(f64::from(row.try_get::<f32, _>(index)?)),
        "DOUBLE" => SqlValue::Float(row.try_get(index)?),
        "DATETIME" | "TIMESTAMP" => SqlValue::from(row.try_get::<NaiveDateTime, _>(index)?),
        "DATE" => SqlValue::from(row.try_get::<NaiveDate, _>(index)?),
        "TIME" => SqlValue::Text(
            row.try_get::<NaiveTime, _>(index)?
                .format("%H:%M:%S")
                .to_string(),
        ),
        "JSON" => SqlValue::Text(row.try_get::<serde_json::Value, _>(index)?.to_string()),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => {
            let bytes: Vec<u8> = row.try_get_unchecked(index)?;
            SqlValue::Text(String::from_utf8_lossy(&bytes).into_owned())
        }
        // DECIMAL, character types, ENUM and SET arrive as text.
        _ => SqlValue::Text(row.try_get_unchecked(index)?),
    };
    Ok(value)
}

/// Map a driver error onto the normalized pool error kinds.
pub(crate) fn classify(err: sqlx::Error) -> PoolError {
    let kind = match &err {
        sqlx::Error::PoolTimedOut => PoolErrorKind::Timeout,
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => PoolErrorKind::Connectivity,
        sqlx::Error::Database(db) => database_kind(&**db),
        _ => PoolErrorKind::Programming,
    };
    PoolError::new(kind, err.to_string())
}

fn database_kind(db: &dyn DatabaseError) -> PoolErrorKind {
    match db.kind() {
        ErrorKind::UniqueViolation
        | ErrorKind::ForeignKeyViolation
        | ErrorKind::NotNullViolation
        | ErrorKind::CheckViolation => return PoolErrorKind::Integrity,
        _ => {}
    }

    match db.try_downcast_ref::<MySqlDatabaseError>().map(|e| e.number()) {
        // too many connections, shutdown in progress, aborted/lost connections
        Some(1040 | 1053 | 1077 | 1152 | 1158..=1161 | 2002 | 2003 | 2006 | 2013) => {
            PoolErrorKind::Connectivity
        }
        // lock wait timeout, max_execution_time exceeded
        Some(1205 | 3024) => PoolErrorKind::Timeout,
        Some(1022 | 1048 | 1062 | 1216 | 1217 | 1451 | 1452 | 1557 | 1586 | 3819) => {
            PoolErrorKind::Integrity
        }
        _ => PoolErrorKind::Programming,
    }
}
