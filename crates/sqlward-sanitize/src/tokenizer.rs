//! Lexer for `WHERE` fragments.
//!
//! The lexer is a single regex pass where the leftmost alternative wins:
//! quoted literals first, then operators, punctuation, connective keywords,
//! identifiers and finally numbers. Any non-whitespace text left between two
//! tokens is rejected rather than dropped.

use crate::error::{InjectionCategory, SanitizeError};
use crate::keywords::is_safe_clause_token;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static LEXER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?P<squote>'(?:[^']|'')*')|(?P<dquote>"(?:[^"]|"")*")|(?P<op><=|>=|!=|<>|=|<|>)|(?P<paren>[()])|(?P<comma>,)|(?P<kw>\b(?:AND|OR|IN|LIKE|IS|NOT|BETWEEN)\b)|(?P<ident>[A-Za-z_][A-Za-z0-9_$]*(?:\.[A-Za-z_][A-Za-z0-9_$]*)*)|(?P<num>-?\d+(?:\.\d+)?)"#,
    )
    .expect("built-in lexer pattern must compile")
});

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Identifier,
    Operator,
    Literal,
    Keyword,
    Punctuation,
}

/// One lexed token. Keywords are stored uppercase, everything else verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClauseToken {
    pub text: String,
    pub kind: TokenKind,
}

impl ClauseToken {
    fn new(text: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn is_quoted(&self) -> bool {
        self.kind == TokenKind::Literal && (self.text.starts_with('\'') || self.text.starts_with('"'))
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == TokenKind::Literal && !self.is_quoted()
    }

    pub fn is_comparison(&self) -> bool {
        self.kind == TokenKind::Operator
    }

    /// Literal content with quotes removed and doubled quotes collapsed.
    pub fn unquoted(&self) -> String {
        if !self.is_quoted() || self.text.len() < 2 {
            return self.text.clone();
        }
        let quote = &self.text[..1];
        let inner = &self.text[1..self.text.len() - 1];
        inner.replace(&format!("{quote}{quote}"), quote)
    }
}

/// Split a fragment into tokens.
pub fn tokenize(fragment: &str) -> Result<Vec<ClauseToken>, SanitizeError> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in LEXER.captures_iter(fragment) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        ensure_gap_is_blank(&fragment[cursor..whole.start()])?;
        cursor = whole.end();

        let text = whole.as_str();
        let token = if caps.name("squote").is_some() || caps.name("dquote").is_some() {
            ClauseToken::new(text, TokenKind::Literal)
        } else if caps.name("op").is_some() {
            ClauseToken::new(text, TokenKind::Operator)
        } else if caps.name("paren").is_some() || caps.name("comma").is_some() {
            ClauseToken::new(text, TokenKind::Punctuation)
        } else if caps.name("kw").is_some() {
            ClauseToken::new(text.to_ascii_uppercase(), TokenKind::Keyword)
        } else if caps.name("num").is_some() {
            ClauseToken::new(text, TokenKind::Literal)
        } else if is_safe_clause_token(text) {
            // NULL, TRUE, FALSE
            ClauseToken::new(text.to_ascii_uppercase(), TokenKind::Keyword)
        } else {
            ClauseToken::new(text, TokenKind::Identifier)
        };
        tokens.push(token);
    }
    ensure_gap_is_blank(&fragment[cursor..])?;

    Ok(tokens)
}

fn ensure_gap_is_blank(gap: &str) -> Result<(), SanitizeError> {
    match gap.trim() {
        "" => Ok(()),
        residue => {
            tracing::debug!(residue = %residue, "unlexable text in clause");
            Err(SanitizeError::injection(residue, InjectionCategory::Symbol))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(fragment: &str) -> Vec<(String, TokenKind)> {
        tokenize(fragment)
            .unwrap()
            .into_iter()
            .map(|t| (t.text, t.kind))
            .collect()
    }

    #[test]
    fn lexes_a_comparison() {
        assert_eq!(
            kinds("age >= 18"),
            vec![
                ("age".to_string(), TokenKind::Identifier),
                (">=".to_string(), TokenKind::Operator),
                ("18".to_string(), TokenKind::Literal),
            ]
        );
    }

    #[test]
    fn keywords_are_uppercased_and_identifiers_kept() {
        assert_eq!(
            kinds("status is not null or order_id in (1, -2.5)"),
            vec![
                ("status".to_string(), TokenKind::Identifier),
                ("IS".to_string(), TokenKind::Keyword),
                ("NOT".to_string(), TokenKind::Keyword),
                ("NULL".to_string(), TokenKind::Keyword),
                ("OR".to_string(), TokenKind::Keyword),
                ("order_id".to_string(), TokenKind::Identifier),
                ("IN".to_string(), TokenKind::Keyword),
                ("(".to_string(), TokenKind::Punctuation),
                ("1".to_string(), TokenKind::Literal),
                (",".to_string(), TokenKind::Punctuation),
                ("-2.5".to_string(), TokenKind::Literal),
                (")".to_string(), TokenKind::Punctuation),
            ]
        );
    }

    #[test]
    fn quoted_literals_keep_escaped_quotes() {
        let tokens = tokenize("name = 'O''Brien'").unwrap();
        assert_eq!(tokens[2].text, "'O''Brien'");
        assert!(tokens[2].is_quoted());
        assert_eq!(tokens[2].unquoted(), "O'Brien");
    }

    #[test]
    fn between_is_a_keyword() {
        assert_eq!(
            kinds("qty Between 1 and 5")[1],
            ("BETWEEN".to_string(), TokenKind::Keyword)
        );
    }

    #[test]
    fn dotted_identifiers_are_one_token() {
        assert_eq!(
            kinds("u.id = 3")[0],
            ("u.id".to_string(), TokenKind::Identifier)
        );
    }

    #[test]
    fn residue_is_rejected() {
        assert!(tokenize("id = 1; DROP TABLE users").is_err());
        assert!(tokenize("name = 'unterminated").is_err());
        assert!(tokenize("a = 1 -- comment").is_err());
        assert!(tokenize("* = 1").is_err());
    }
}
