//! Clock abstraction and timestamp formatting.
//!
//! Filter and row values equal to `now` / `now()` or `current_date` /
//! `current_date()` are replaced by the clock's current timestamp or date
//! before they are bound.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlward_core::{DATE_AND_TIME, DATE_ONLY, SqlValue};

/// Source of "now" for value normalization.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Format a timestamp. `sql_mode` appends milliseconds.
pub fn datetime_to_string(instant: &NaiveDateTime, date_only: bool, sql_mode: bool) -> String {
    if date_only {
        return instant.format(DATE_ONLY).to_string();
    }
    if sql_mode {
        return instant.format("%Y-%m-%d %H:%M:%S%.3f").to_string();
    }
    instant.format(DATE_AND_TIME).to_string()
}

/// Parse a timestamp written by [`datetime_to_string`] (without milliseconds).
pub fn string_to_datetime(text: &str, date_only: bool) -> Result<NaiveDateTime, chrono::ParseError> {
    if date_only {
        let date = NaiveDate::parse_from_str(text.trim(), DATE_ONLY)?;
        return Ok(date.and_time(NaiveTime::MIN));
    }
    NaiveDateTime::parse_from_str(text.trim(), DATE_AND_TIME)
}

/// Replace the `now` / `current_date` sentinels; anything else is returned
/// unchanged.
pub fn substitute_sentinel(text: &str, clock: &dyn Clock) -> Option<String> {
    let lowered = text.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "now" | "now()" => Some(datetime_to_string(&clock.now(), false, false)),
        "current_date" | "current_date()" => Some(datetime_to_string(&clock.now(), true, false)),
        _ => None,
    }
}

/// Normalize a value that is about to be bound.
pub fn normalize_value(value: &SqlValue, clock: &dyn Clock) -> SqlValue {
    match value {
        SqlValue::Text(text) => match substitute_sentinel(text, clock) {
            Some(replaced) => SqlValue::Text(replaced),
            None => value.clone(),
        },
        other => other.clone(),
    }
}
