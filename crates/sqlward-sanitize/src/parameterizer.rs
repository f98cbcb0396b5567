//! Rewrites loose `WHERE` text into placeholder form.
//!
//! ```text
//! ["age > 18", "status = 'active'"]  ->  "age>? AND status=?"  [18, "active"]
//! ```
//!
//! Literals never survive into the statement text: quoted strings and
//! numbers are replaced by `?` and returned as bound parameters, in order.
//! Column tokens that collide with reserved words are backtick-escaped and
//! every other identifier is scanned by the injection detector.

use crate::detector::{InjectionDetector, PatternFamilies};
use crate::error::SanitizeError;
use crate::keywords::{INJECTION_COMMANDS, needs_escaping};
use crate::time::{Clock, SystemClock, normalize_value, substitute_sentinel};
use crate::tokenizer::{ClauseToken, TokenKind, tokenize};
use regex::Regex;
use serde::Serialize;
use sqlward_core::{Filter, SqlValue};
use std::sync::{Arc, LazyLock};

static PLACEHOLDER_BEFORE_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\?\s+`[^`]+`").expect("built-in sanity pattern must compile")
});

/// Statement fragment with its bound parameters.
///
/// The number of `?` placeholders in `text` always equals `params.len()`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ParameterizedClause {
    pub text: String,
    pub params: Vec<SqlValue>,
}

impl ParameterizedClause {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `` `column` = ? `` for a column that is already quoted.
    pub fn equals(quoted_column: &str, value: SqlValue) -> Self {
        Self {
            text: format!("{} = ?", quoted_column),
            params: vec![value],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn placeholder_count(&self) -> usize {
        self.text.matches('?').count()
    }

    /// ` WHERE <text>`, or nothing for an empty clause.
    pub fn where_sql(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.text)
        }
    }

    /// Substitute the parameters back as literals. For logs and tests only.
    pub fn render_inline(&self) -> String {
        let mut rendered = String::with_capacity(self.text.len());
        let mut params = self.params.iter().peekable();
        for ch in self.text.chars() {
            match (ch, params.next_if(|_| ch == '?')) {
                (_, Some(value)) => rendered.push_str(&value.to_sql_literal()),
                (c, None) => rendered.push(c),
            }
        }
        rendered
    }
}

/// Turns caller filters into [`ParameterizedClause`]s.
#[derive(Clone)]
pub struct Parameterizer {
    detector: InjectionDetector,
    clock: Arc<dyn Clock>,
}

impl Default for Parameterizer {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for Parameterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameterizer").finish_non_exhaustive()
    }
}

impl Parameterizer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            detector: InjectionDetector::new(),
            clock,
        }
    }

    pub fn detector(&self) -> &InjectionDetector {
        &self.detector
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Normalize a row value before binding it.
    pub fn normalize_value(&self, value: &SqlValue) -> SqlValue {
        normalize_value(value, self.clock.as_ref())
    }

    /// Parameterize a filter. Fragments are combined with `AND`; an empty
    /// filter yields an empty clause.
    pub fn parameterize(&self, filter: &Filter) -> Result<ParameterizedClause, SanitizeError> {
        let fragments = filter.fragments();
        if fragments.is_empty() {
            return Ok(ParameterizedClause::empty());
        }

        let several = fragments.len() > 1;
        let mut texts = Vec::with_capacity(fragments.len());
        let mut params = Vec::new();

        for fragment in fragments {
            let (clause, has_top_level_or) = self.parameterize_fragment(fragment)?;
            if clause.is_empty() {
                continue;
            }
            if several && has_top_level_or {
                texts.push(format!("({})", clause.text));
            } else {
                texts.push(clause.text);
            }
            params.extend(clause.params);
        }

        let clause = ParameterizedClause {
            text: texts.join(" AND "),
            params,
        };
        sanity_check(&clause)?;
        tracing::debug!(clause = %clause.text, params = clause.params.len(), "parameterized filter");
        Ok(clause)
    }

    /// Parameterize a single clause string.
    pub fn parameterize_clause(&self, clause: &str) -> Result<ParameterizedClause, SanitizeError> {
        self.parameterize(&Filter::from(clause))
    }

    fn parameterize_fragment(
        &self,
        fragment: &str,
    ) -> Result<(ParameterizedClause, bool), SanitizeError> {
        let tokens = tokenize(fragment)?;

        let mut pieces: Vec<(String, TokenKind)> = Vec::with_capacity(tokens.len());
        let mut params = Vec::new();
        let mut depth = 0_i32;
        let mut has_top_level_or = false;

        for token in &tokens {
            match token.kind {
                TokenKind::Literal => {
                    params.push(self.literal_value(token));
                    pieces.push(("?".to_string(), TokenKind::Literal));
                }
                TokenKind::Identifier => {
                    pieces.push((self.identifier_text(token)?, TokenKind::Identifier));
                }
                TokenKind::Keyword => {
                    if depth == 0 && token.text == "OR" {
                        has_top_level_or = true;
                    }
                    pieces.push((token.text.clone(), TokenKind::Keyword));
                }
                TokenKind::Punctuation => {
                    match token.text.as_str() {
                        "(" => depth += 1,
                        ")" => depth -= 1,
                        _ => {}
                    }
                    if depth < 0 {
                        return Err(SanitizeError::malformed(format!(
                            "unbalanced parentheses in '{}'",
                            fragment
                        )));
                    }
                    pieces.push((token.text.clone(), TokenKind::Punctuation));
                }
                TokenKind::Operator => {
                    pieces.push((token.text.clone(), TokenKind::Operator));
                }
            }
        }

        Ok((
            ParameterizedClause {
                text: join_pieces(&pieces),
                params,
            },
            has_top_level_or,
        ))
    }

    /// Check each dotted segment on its own, so `t.order` escapes like
    /// `order` does.
    fn identifier_text(&self, token: &ClauseToken) -> Result<String, SanitizeError> {
        let segments = token
            .text
            .split('.')
            .map(|segment| self.identifier_segment(segment))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(segments.join("."))
    }

    fn identifier_segment(&self, segment: &str) -> Result<String, SanitizeError> {
        let is_command = INJECTION_COMMANDS
            .iter()
            .any(|c| c.eq_ignore_ascii_case(segment));
        if !is_command && needs_escaping(segment) {
            return Ok(format!("`{}`", segment));
        }
        self.detector
            .ensure_safe(segment, PatternFamilies::SYMBOLS | PatternFamilies::KEYWORDS)?;
        Ok(segment.to_string())
    }

    fn literal_value(&self, token: &ClauseToken) -> SqlValue {
        if token.is_quoted() {
            let content = token.unquoted();
            return match substitute_sentinel(&content, self.clock.as_ref()) {
                Some(replaced) => SqlValue::Text(replaced),
                None => SqlValue::Text(content),
            };
        }
        if token.text.contains('.') {
            return token
                .text
                .parse::<f64>()
                .map(SqlValue::Float)
                .unwrap_or_else(|_| SqlValue::Text(token.text.clone()));
        }
        token
            .text
            .parse::<i64>()
            .map(SqlValue::Int)
            .unwrap_or_else(|_| SqlValue::Text(token.text.clone()))
    }
}

/// Join pieces with cosmetic spacing: nothing after `(`, nothing before `)`
/// or `,`, nothing around comparison operators.
fn join_pieces(pieces: &[(String, TokenKind)]) -> String {
    let mut out = String::new();
    let mut glue_next = false;

    for (text, kind) in pieces {
        let is_open = text == "(";
        let is_closing = text == ")" || text == ",";
        let is_comparison = *kind == TokenKind::Operator;

        if !(glue_next || out.is_empty() || is_closing || is_comparison) {
            out.push(' ');
        }
        out.push_str(text);
        glue_next = is_open || is_comparison;
    }
    out
}

fn sanity_check(clause: &ParameterizedClause) -> Result<(), SanitizeError> {
    let opening = clause.text.matches('(').count();
    let closing = clause.text.matches(')').count();
    if opening != closing {
        return Err(SanitizeError::malformed(format!(
            "{} opening vs {} closing parentheses",
            opening, closing
        )));
    }
    if PLACEHOLDER_BEFORE_IDENTIFIER.is_match(&clause.text) {
        return Err(SanitizeError::malformed(
            "placeholder directly followed by an escaped identifier",
        ));
    }
    if clause.placeholder_count() != clause.params.len() {
        return Err(SanitizeError::malformed(format!(
            "{} placeholders for {} parameters",
            clause.placeholder_count(),
            clause.params.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FixedClock;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn parameterizer() -> Parameterizer {
        let instant = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        Parameterizer::new(Arc::new(FixedClock(instant)))
    }

    #[test]
    fn fragments_are_joined_with_and() {
        let clause = parameterizer()
            .parameterize(&Filter::from(vec!["age > 18", "status = 'active'"]))
            .unwrap();
        assert_eq!(clause.text, "age>? AND status=?");
        assert_eq!(clause.params, vec![SqlValue::Int(18), SqlValue::from("active")]);
        assert_eq!(clause.placeholder_count(), 2);
    }

    #[test]
    fn empty_filters_produce_no_where() {
        let p = parameterizer();
        for filter in [Filter::None, Filter::from(""), Filter::from(Vec::<String>::new())] {
            let clause = p.parameterize(&filter).unwrap();
            assert!(clause.is_empty());
            assert!(clause.params.is_empty());
            assert_eq!(clause.where_sql(), "");
        }
    }

    #[test]
    fn spacing_around_parentheses_and_commas() {
        let clause = parameterizer()
            .parameterize_clause("status IN ('a', 'b') AND (age >= 21 OR vip = TRUE)")
            .unwrap();
        assert_eq!(clause.text, "status IN (?, ?) AND (age>=? OR vip=TRUE)");
        assert_eq!(clause.params.len(), 3);
    }

    #[test]
    fn top_level_or_is_wrapped_when_combined() {
        let clause = parameterizer()
            .parameterize(&Filter::from(vec!["a = 1 OR b = 2", "c = 3"]))
            .unwrap();
        assert_eq!(clause.text, "(a=? OR b=?) AND c=?");

        let single = parameterizer().parameterize_clause("a = 1 OR b = 2").unwrap();
        assert_eq!(single.text, "a=? OR b=?");
    }

    #[test]
    fn reserved_columns_are_escaped() {
        let clause = parameterizer().parameterize_clause("key = 'x' AND desc LIKE 'y%'").unwrap();
        assert_eq!(clause.text, "`key`=? AND `desc` LIKE ?");
    }

    #[test]
    fn dotted_columns_escape_per_segment() {
        let clause = parameterizer()
            .parameterize_clause("t.order = 1 AND u.id > 2")
            .unwrap();
        assert_eq!(clause.text, "t.`order`=? AND u.id>?");
        assert!(parameterizer().parameterize_clause("t.select = 1").is_err());
        assert!(parameterizer().parameterize_clause("users.union = 1").is_err());
    }

    #[test]
    fn between_binds_both_bounds() {
        let clause = parameterizer()
            .parameterize_clause("price between 10 and 20.5")
            .unwrap();
        assert_eq!(clause.text, "price BETWEEN ? AND ?");
        assert_eq!(clause.params, vec![SqlValue::Int(10), SqlValue::Float(20.5)]);

        // EXISTS needs a subquery, which never passes
        assert!(
            parameterizer()
                .parameterize_clause("EXISTS (SELECT 1 FROM users)")
                .is_err()
        );
    }

    #[test]
    fn injections_abort() {
        let p = parameterizer();
        assert!(p.parameterize_clause("id = 1; DROP TABLE users").is_err());
        assert!(p.parameterize_clause("id = 1 UNION SELECT password").is_err());
        assert!(p.parameterize_clause("id = 1 /* x */").is_err());
        assert!(matches!(
            p.parameterize_clause("id = (1"),
            Err(SanitizeError::MalformedClause { .. })
        ));
        assert!(matches!(
            p.parameterize_clause("id = 1)"),
            Err(SanitizeError::MalformedClause { .. })
        ));
    }

    #[test]
    fn sentinels_bind_clock_values() {
        let clause = parameterizer()
            .parameterize_clause("created_at < 'now()' AND day = 'current_date'")
            .unwrap();
        assert_eq!(
            clause.params,
            vec![
                SqlValue::from("2024-01-02 03:04:05"),
                SqlValue::from("2024-01-02")
            ]
        );
    }

    #[test]
    fn render_inline_round_trips() {
        let p = parameterizer();
        let clause = p
            .parameterize_clause("name = 'O''Brien' AND score >= -2.5")
            .unwrap();
        let rendered = clause.render_inline();
        assert_eq!(rendered, "name='O''Brien' AND score>=-2.5");

        let again = p.parameterize_clause(&rendered).unwrap();
        assert_eq!(again, clause);
    }
}
