//! Identifier validation and quoting.
//!
//! Table, trigger, database and column names are interpolated into statement
//! text, so they are held to a strict character set and scanned before they
//! are wrapped in backticks.

use crate::detector::{InjectionDetector, PatternFamilies};
use crate::error::{InjectionCategory, SanitizeError};
use crate::keywords::{INJECTION_COMMANDS, is_risky_keyword};
use regex::Regex;
use std::sync::LazyLock;

static IDENTIFIER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_$]+$").expect("built-in identifier pattern must compile")
});

/// Canonical spelling of a name: surrounding whitespace and one pair of
/// backticks removed. Quoting and cache keys both start from this form.
pub fn normalize_identifier(name: &str) -> &str {
    let trimmed = name.trim();
    trimmed
        .strip_prefix('`')
        .and_then(|s| s.strip_suffix('`'))
        .unwrap_or(trimmed)
}

fn ensure_charset(name: &str) -> Result<(), SanitizeError> {
    if name.is_empty() {
        return Err(SanitizeError::malformed("identifier must not be empty"));
    }
    if !IDENTIFIER_PATTERN.is_match(name) {
        return Err(SanitizeError::injection(name, InjectionCategory::Symbol));
    }
    Ok(())
}

/// Validate a table, trigger or database name and quote it.
pub fn quote_identifier(name: &str, detector: &InjectionDetector) -> Result<String, SanitizeError> {
    let name = normalize_identifier(name);
    ensure_charset(name)?;
    detector.ensure_safe(name, PatternFamilies::SYMBOLS | PatternFamilies::KEYWORDS)?;
    Ok(format!("`{}`", name))
}

/// Validate a column name and quote it.
///
/// Unlike other identifiers, a column may be named after a reserved word
/// (`key`, `desc`, `order`), except for statement commands.
pub fn quote_column(name: &str, detector: &InjectionDetector) -> Result<String, SanitizeError> {
    let name = normalize_identifier(name);
    ensure_charset(name)?;
    let is_command = INJECTION_COMMANDS
        .iter()
        .any(|c| c.eq_ignore_ascii_case(name));
    if !is_command && is_risky_keyword(name) {
        return Ok(format!("`{}`", name));
    }
    detector.ensure_safe(name, PatternFamilies::SYMBOLS | PatternFamilies::KEYWORDS)?;
    Ok(format!("`{}`", name))
}

/// Quote every column of a list.
pub fn quote_columns(names: &[String], detector: &InjectionDetector) -> Result<Vec<String>, SanitizeError> {
    names.iter().map(|n| quote_column(n, detector)).collect()
}
