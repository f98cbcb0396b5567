//! Trigger DDL cleaning and validation.
//!
//! Callers may hand over either a bare trigger body (`BEGIN ... END`) or a
//! complete `CREATE TRIGGER` statement written for the mysql client, with
//! `DELIMITER` lines and `END$$` terminators. Both are normalized into a
//! single statement the server accepts over one round-trip, then checked so
//! that nothing besides the trigger rides along.

use crate::detector::InjectionDetector;
use crate::error::SanitizeError;
use crate::identifier::quote_identifier;
use crate::keywords::{RISKY_TRIGGER_STATEMENTS, SYSTEM_SCHEMAS};
use regex::Regex;
use std::sync::LazyLock;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in trigger pattern must compile")
}

static TIMING_EVENT: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)^(BEFORE|AFTER)\s+(INSERT|UPDATE|DELETE)$"));
static CREATE_TRIGGER_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)^\s*CREATE\s+TRIGGER\b"));
static IF_NOT_EXISTS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\bCREATE\s+TRIGGER\s+IF\s+NOT\s+EXISTS\b"));
static DELIMITER_LINE: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?im)^\s*DELIMITER\s+\S+\s*$"));
static END_TERMINATOR: LazyLock<Regex> = LazyLock::new(|| compile(r"(?is)\s*\bEND\s*[$;/]+\s*$"));
static TRAILING_SEMICOLONS: LazyLock<Regex> = LazyLock::new(|| compile(r"[;\s]+$"));
static HORIZONTAL_SPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"[ \t]+"));
static CREATE_TRIGGER: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)\bcreate\s+trigger\b"));
static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r"(?i)^CREATE\s+TRIGGER\s+`?(?P<name>[A-Za-z0-9_$]+)`?\s+(?:BEFORE|AFTER)\s+(?:INSERT|UPDATE|DELETE)\s+ON\s+`?(?P<table>[A-Za-z0-9_$]+)`?\s+FOR\s+EACH\s+ROW\s+\S",
    )
});
static RISKY_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    let words: Vec<String> = RISKY_TRIGGER_STATEMENTS
        .iter()
        .map(|w| w.replace(' ', r"\s+"))
        .collect();
    compile(&format!(r"(?i)\b(?:{})\b", words.join("|")))
});
static SYSTEM_SCHEMA_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    compile(&format!(
        r"(?i)`?\b(?:{})\b`?\s*\.",
        SYSTEM_SCHEMAS.join("|")
    ))
});
static BEGIN_WORD: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)\bBEGIN\b"));
static END_WORD: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)\bEND\b"));
static END_OF_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)\bEND\s+(?:IF|WHILE|LOOP|REPEAT|CASE)\b"));
static END_CASE: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)\bEND\s+CASE\b"));
static CASE_WORD: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)\bCASE\b"));

/// Validate and normalize `BEFORE INSERT`-style timing/event text.
pub fn normalize_timing_event(timing_event: &str) -> Result<String, SanitizeError> {
    let collapsed = timing_event.split_whitespace().collect::<Vec<_>>().join(" ");
    if !TIMING_EVENT.is_match(&collapsed) {
        return Err(SanitizeError::trigger(format!(
            "timing/event must be BEFORE|AFTER INSERT|UPDATE|DELETE, got '{}'",
            timing_event
        )));
    }
    Ok(collapsed.to_ascii_uppercase())
}

/// Build the single `CREATE TRIGGER` statement for `body`.
pub fn clean_trigger_creation(
    trigger_name: &str,
    table_name: &str,
    timing_event: &str,
    body: &str,
    detector: &InjectionDetector,
) -> Result<String, SanitizeError> {
    let quoted_name = quote_identifier(trigger_name, detector)?;
    let quoted_table = quote_identifier(table_name, detector)?;
    let timing_event = normalize_timing_event(timing_event)?;

    let body = body.trim();
    if body.is_empty() {
        return Err(SanitizeError::trigger("trigger body must not be empty"));
    }

    let mut sql = DELIMITER_LINE.replace_all(body, "").trim().to_string();
    if !CREATE_TRIGGER_PREFIX.is_match(&sql) {
        sql = format!(
            "CREATE TRIGGER {} {} ON {} FOR EACH ROW {}",
            quoted_name, timing_event, quoted_table, sql
        );
    }

    sql = IF_NOT_EXISTS.replace_all(&sql, "CREATE TRIGGER").into_owned();
    sql = END_TERMINATOR.replace(&sql, " END").into_owned();
    sql = TRAILING_SEMICOLONS.replace(&sql, "").into_owned();
    sql = HORIZONTAL_SPACE.replace_all(&sql, " ").trim().to_string();

    check_single_trigger(&sql, trigger_name, table_name)?;
    tracing::debug!(trigger = %trigger_name, table = %table_name, "normalized trigger statement");
    Ok(sql)
}

/// Reject anything that could run alongside the trigger definition.
fn check_single_trigger(sql: &str, trigger_name: &str, table_name: &str) -> Result<(), SanitizeError> {
    if CREATE_TRIGGER.find_iter(sql).count() != 1 {
        return Err(SanitizeError::trigger(
            "exactly one CREATE TRIGGER statement is allowed",
        ));
    }

    if let Some(m) = RISKY_STATEMENT.find(sql) {
        return Err(SanitizeError::trigger(format!(
            "unsafe statement '{}' in trigger",
            m.as_str()
        )));
    }

    if SYSTEM_SCHEMA_REFERENCE.is_match(sql) {
        return Err(SanitizeError::trigger(
            "trigger cannot reference a system schema",
        ));
    }

    let Some(header) = HEADER.captures(sql) else {
        return Err(SanitizeError::trigger("malformed CREATE TRIGGER statement"));
    };
    let expected_name = trigger_name.trim().trim_matches('`');
    let expected_table = table_name.trim().trim_matches('`');
    if !header["name"].eq_ignore_ascii_case(expected_name)
        || !header["table"].eq_ignore_ascii_case(expected_table)
    {
        return Err(SanitizeError::trigger(format!(
            "statement defines `{}` on `{}`, expected `{}` on `{}`",
            &header["name"], &header["table"], expected_name, expected_table
        )));
    }

    let begins = BEGIN_WORD.find_iter(sql).count();
    let block_ends = END_OF_BLOCK.find_iter(sql).count();
    let end_cases = END_CASE.find_iter(sql).count();
    let ends = END_WORD.find_iter(sql).count() - block_ends;
    let case_expressions = CASE_WORD.find_iter(sql).count().saturating_sub(2 * end_cases);
    if begins + case_expressions != ends {
        return Err(SanitizeError::trigger(format!(
            "unbalanced BEGIN/END block ({} BEGIN vs {} END)",
            begins,
            ends.saturating_sub(case_expressions)
        )));
    }

    if begins == 0 && sql.matches(';').count() > 1 {
        tracing::warn!(
            trigger = %trigger_name,
            "multiple statements outside BEGIN/END; MySQL only runs the first"
        );
    }

    Ok(())
}
