//! Integration tests for detection and parameterization working together.
//!
//! Run with: cargo test --package sqlward-sanitize --test sanitize_tests

use pretty_assertions::assert_eq;
use sqlward_core::{Filter, SqlValue};
use sqlward_sanitize::{
    InjectionCategory, InjectionDetector, Parameterizer, SanitizeError, quote_column,
};

/// Classic stacked query is flagged by every entry point.
#[test]
fn test_stacked_query_is_rejected_everywhere() {
    let detector = InjectionDetector::new();
    assert!(detector.scan("1; DROP TABLE users"));

    let err = Parameterizer::default()
        .parameterize_clause("id = 1; DROP TABLE users")
        .unwrap_err();
    assert!(matches!(
        err,
        SanitizeError::InjectionDetected {
            category: InjectionCategory::Symbol,
            ..
        }
    ));
}

/// Tautology payloads inside a quoted literal are bound, not executed.
#[test]
fn test_quoted_payload_becomes_a_parameter() {
    let clause = Parameterizer::default()
        .parameterize_clause("name = 'x'' OR ''1''=''1'")
        .unwrap();
    assert_eq!(clause.text, "name=?");
    assert_eq!(clause.params, vec![SqlValue::from("x' OR '1'='1")]);
}

/// Placeholders always match the parameter count.
#[test]
fn test_placeholder_count_matches_params() {
    let parameterizer = Parameterizer::default();
    let filters = [
        Filter::from(vec!["age > 18", "status = 'active'"]),
        Filter::from("a IN (1, 2, 3) AND b LIKE 'x%'"),
        Filter::from("deleted_at IS NULL"),
        Filter::from(vec!["u.id = 7", "score <= 9.75 OR score >= -1"]),
    ];
    for filter in filters {
        let clause = parameterizer.parameterize(&filter).unwrap();
        assert_eq!(clause.placeholder_count(), clause.params.len(), "{:?}", filter);
    }
}

/// Rendering params back in and reparsing yields the same clause.
#[test]
fn test_round_trip_is_stable() {
    let parameterizer = Parameterizer::default();
    let clause = parameterizer
        .parameterize(&Filter::from(vec!["age > 18", "status = 'active'"]))
        .unwrap();
    assert_eq!(clause.render_inline(), "age>18 AND status='active'");

    let reparsed = parameterizer
        .parameterize_clause(&clause.render_inline())
        .unwrap();
    assert_eq!(reparsed, clause);
}

/// Column helpers and the parameterizer agree on reserved words.
#[test]
fn test_reserved_column_names() {
    let detector = InjectionDetector::new();
    assert_eq!(quote_column("order", &detector).unwrap(), "`order`");

    let clause = Parameterizer::default()
        .parameterize_clause("order = 3")
        .unwrap();
    assert_eq!(clause.text, "`order`=?");
}
