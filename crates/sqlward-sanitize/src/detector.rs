//! Pattern based injection detection.
//!
//! The detector answers one question: does a caller supplied string look like
//! it is trying to smuggle SQL? Three pattern families are checked:
//!
//! | Family | Examples |
//! |--------|----------|
//! | symbols | `;` `--` `/*` `'` `@@` |
//! | keywords | `SELECT` `DROP` `UNION` plus every MySQL reserved word |
//! | logic gates | `OR` `AND` `BETWEEN` `LIKE` `NULL` |
//!
//! Word tokens only match on word boundaries, so `order_id` never trips `or`
//! or `order`. Before any family runs, e-mail addresses, plain numbers and
//! well-formed base64 data URIs are let through.

use crate::error::{InjectionCategory, SanitizeError};
use crate::keywords::{
    INJECTION_COMMANDS, INJECTION_SYMBOLS, LOGIC_GATES, RISKY_KEYWORDS, SAFE_PHRASES,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use regex::Regex;
use serde::Serialize;
use sqlward_core::SqlValue;
use std::borrow::Cow;
use std::ops::{BitOr, Range};
use std::sync::LazyLock;

static SYMBOL_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(&alternation(INJECTION_SYMBOLS)));

static KEYWORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let mut words: Vec<&str> = INJECTION_COMMANDS.to_vec();
    words.extend(RISKY_KEYWORDS.iter().filter(|k| !INJECTION_COMMANDS.contains(k)));
    compile(&alternation(&words))
});

static LOGIC_GATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(&alternation(LOGIC_GATES)));

static SAFE_PHRASE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| compile(&format!("(?i)(?:{})", SAFE_PHRASES.join("|"))));

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    compile(
        r#"^\s*(?:[^\s=]+\s*=\s*)?['"]?(?P<local>"(?:\\.|[^\\"])+"|[\w!#$%&'*+/=?^`{|}~-]+(?:\.[\w!#$%&'*+/=?^`{|}~-]+)*)@(?P<domain>(?:[\w-]+\.)+[\w-]{2,})['"]?\s*$"#,
    )
});

static NUMERIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| compile(r"^-?\d+(?:\.\d+)?$"));

static DATA_URI_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    compile(r"^(?i:data):[\w.+-]+/[\w.+-]+;(?i:base64),(?P<payload>[A-Za-z0-9+/=\s]+)$")
});

const BASE64_MARKER: &str = ";base64";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in detector pattern must compile")
}

/// Build a case-insensitive alternation. Word tokens get `\b` anchors,
/// everything else is matched literally.
fn alternation(tokens: &[&str]) -> String {
    let parts: Vec<String> = tokens
        .iter()
        .map(|token| {
            if token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                format!(r"\b{}\b", token)
            } else {
                regex::escape(token)
            }
        })
        .collect();
    format!("(?i)(?:{})", parts.join("|"))
}

/// Set of pattern families to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatternFamilies {
    symbols: bool,
    keywords: bool,
    logic_gates: bool,
}

impl PatternFamilies {
    pub const NONE: Self = Self {
        symbols: false,
        keywords: false,
        logic_gates: false,
    };
    pub const SYMBOLS: Self = Self {
        symbols: true,
        ..Self::NONE
    };
    pub const KEYWORDS: Self = Self {
        keywords: true,
        ..Self::NONE
    };
    pub const LOGIC_GATES: Self = Self {
        logic_gates: true,
        ..Self::NONE
    };
    pub const ALL: Self = Self {
        symbols: true,
        keywords: true,
        logic_gates: true,
    };

    pub fn contains(self, other: PatternFamilies) -> bool {
        (!other.symbols || self.symbols)
            && (!other.keywords || self.keywords)
            && (!other.logic_gates || self.logic_gates)
    }
}

impl BitOr for PatternFamilies {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            symbols: self.symbols || rhs.symbols,
            keywords: self.keywords || rhs.keywords,
            logic_gates: self.logic_gates || rhs.logic_gates,
        }
    }
}

/// Outcome of scanning a single value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct InjectionVerdict {
    pub flagged: bool,
    pub category: Option<InjectionCategory>,
    /// Text that matched, as found in the input.
    pub matched_pattern: Option<String>,
}

impl InjectionVerdict {
    fn clean() -> Self {
        Self::default()
    }

    fn flagged(category: InjectionCategory, matched: impl Into<String>) -> Self {
        Self {
            flagged: true,
            category: Some(category),
            matched_pattern: Some(matched.into()),
        }
    }

    /// Turn a flagged verdict into an error about `input`.
    pub fn into_result(self, input: &str) -> Result<(), SanitizeError> {
        match (self.flagged, self.category) {
            (true, Some(category)) => Err(SanitizeError::injection(input, category)),
            (true, None) => Err(SanitizeError::injection(input, InjectionCategory::Symbol)),
            _ => Ok(()),
        }
    }
}

/// Values the detector can walk. Sequences are scanned element by element.
pub trait Scannable {
    /// Push the text form of every scalar inside `self`.
    fn collect_text<'a>(&'a self, out: &mut Vec<Cow<'a, str>>);
}

impl Scannable for str {
    fn collect_text<'a>(&'a self, out: &mut Vec<Cow<'a, str>>) {
        out.push(Cow::Borrowed(self));
    }
}

impl Scannable for String {
    fn collect_text<'a>(&'a self, out: &mut Vec<Cow<'a, str>>) {
        out.push(Cow::Borrowed(self.as_str()));
    }
}

impl Scannable for SqlValue {
    fn collect_text<'a>(&'a self, out: &mut Vec<Cow<'a, str>>) {
        match self {
            SqlValue::Text(s) => out.push(Cow::Borrowed(s.as_str())),
            SqlValue::Int(i) => out.push(Cow::Owned(i.to_string())),
            SqlValue::Float(f) => out.push(Cow::Owned(f.to_string())),
            SqlValue::Null | SqlValue::Bool(_) => {}
        }
    }
}

macro_rules! scannable_number {
    ($($t:ty),*) => {
        $(
            impl Scannable for $t {
                fn collect_text<'a>(&'a self, out: &mut Vec<Cow<'a, str>>) {
                    out.push(Cow::Owned(self.to_string()));
                }
            }
        )*
    };
}

scannable_number!(i32, i64, u32, u64, f64);

impl<T: Scannable> Scannable for Option<T> {
    fn collect_text<'a>(&'a self, out: &mut Vec<Cow<'a, str>>) {
        if let Some(inner) = self {
            inner.collect_text(out);
        }
    }
}

impl<T: Scannable> Scannable for [T] {
    fn collect_text<'a>(&'a self, out: &mut Vec<Cow<'a, str>>) {
        for item in self {
            item.collect_text(out);
        }
    }
}

impl<T: Scannable> Scannable for Vec<T> {
    fn collect_text<'a>(&'a self, out: &mut Vec<Cow<'a, str>>) {
        self.as_slice().collect_text(out);
    }
}

impl<T: Scannable + ?Sized> Scannable for &T {
    fn collect_text<'a>(&'a self, out: &mut Vec<Cow<'a, str>>) {
        (**self).collect_text(out);
    }
}

/// Stateless injection detector. Patterns are compiled once per process.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectionDetector;

impl InjectionDetector {
    pub fn new() -> Self {
        Self
    }

    /// Scan one string against the requested families.
    pub fn inspect(&self, text: &str, families: PatternFamilies) -> InjectionVerdict {
        let trimmed = text.trim();
        if trimmed.is_empty() || self.is_email(trimmed) || self.is_numeric(trimmed) {
            return InjectionVerdict::clean();
        }

        if trimmed.to_ascii_lowercase().contains(BASE64_MARKER) {
            return if self.is_base64_data_uri(trimmed) {
                InjectionVerdict::clean()
            } else {
                InjectionVerdict::flagged(InjectionCategory::Base64, BASE64_MARKER)
            };
        }

        let safe_spans: Vec<Range<usize>> = SAFE_PHRASE_PATTERN
            .find_iter(trimmed)
            .map(|m| m.range())
            .collect();

        let checks: [(bool, &Regex, InjectionCategory); 3] = [
            (families.symbols, &*SYMBOL_PATTERN, InjectionCategory::Symbol),
            (families.keywords, &*KEYWORD_PATTERN, InjectionCategory::Keyword),
            (families.logic_gates, &*LOGIC_GATE_PATTERN, InjectionCategory::LogicGate),
        ];

        for (enabled, pattern, category) in checks {
            if !enabled {
                continue;
            }
            let hit = pattern.find_iter(trimmed).find(|m| {
                !safe_spans
                    .iter()
                    .any(|span| span.start <= m.start() && m.end() <= span.end)
            });
            if let Some(m) = hit {
                tracing::debug!(
                    category = %category,
                    pattern = %m.as_str(),
                    "value flagged by injection detector"
                );
                return InjectionVerdict::flagged(category, m.as_str());
            }
        }

        InjectionVerdict::clean()
    }

    /// True when any scalar in `value` matches one of `families`.
    pub fn check<T: Scannable + ?Sized>(&self, value: &T, families: PatternFamilies) -> bool {
        let mut texts = Vec::new();
        value.collect_text(&mut texts);
        texts
            .iter()
            .any(|text| self.inspect(text, families).flagged)
    }

    /// Combined symbol, keyword and logic gate scan.
    pub fn scan<T: Scannable + ?Sized>(&self, value: &T) -> bool {
        self.check(value, PatternFamilies::ALL)
    }

    pub fn check_symbols<T: Scannable + ?Sized>(&self, value: &T) -> bool {
        self.check(value, PatternFamilies::SYMBOLS)
    }

    pub fn check_keywords<T: Scannable + ?Sized>(&self, value: &T) -> bool {
        self.check(value, PatternFamilies::KEYWORDS)
    }

    pub fn check_logic_gates<T: Scannable + ?Sized>(&self, value: &T) -> bool {
        self.check(value, PatternFamilies::LOGIC_GATES)
    }

    pub fn check_symbols_and_keywords<T: Scannable + ?Sized>(&self, value: &T) -> bool {
        self.check(value, PatternFamilies::SYMBOLS | PatternFamilies::KEYWORDS)
    }

    pub fn check_symbols_and_logic_gates<T: Scannable + ?Sized>(&self, value: &T) -> bool {
        self.check(value, PatternFamilies::SYMBOLS | PatternFamilies::LOGIC_GATES)
    }

    pub fn check_keywords_and_logic_gates<T: Scannable + ?Sized>(&self, value: &T) -> bool {
        self.check(value, PatternFamilies::KEYWORDS | PatternFamilies::LOGIC_GATES)
    }

    pub fn check_all<T: Scannable + ?Sized>(&self, value: &T) -> bool {
        self.scan(value)
    }

    /// Error out when `text` matches one of `families`.
    pub fn ensure_safe(&self, text: &str, families: PatternFamilies) -> Result<(), SanitizeError> {
        self.inspect(text, families).into_result(text)
    }

    /// Bare or `key=value` wrapped e-mail address, optionally quoted.
    pub fn is_email(&self, text: &str) -> bool {
        if !text.contains('@') {
            return false;
        }
        let Some(caps) = EMAIL_PATTERN.captures(text.trim()) else {
            return false;
        };
        let local = caps.name("local").map(|m| m.as_str()).unwrap_or_default();
        let domain = caps.name("domain").map(|m| m.as_str()).unwrap_or_default();
        !local.contains(char::is_whitespace) && !domain.contains(char::is_whitespace)
    }

    pub fn is_numeric(&self, text: &str) -> bool {
        NUMERIC_PATTERN.is_match(text.trim())
    }

    /// `data:<type>/<subtype>;base64,<payload>` with a decodable payload.
    pub fn is_base64_data_uri(&self, text: &str) -> bool {
        let Some(caps) = DATA_URI_PATTERN.captures(text.trim()) else {
            return false;
        };
        let payload: String = caps["payload"]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        !payload.is_empty() && STANDARD.decode(payload.as_bytes()).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> InjectionDetector {
        InjectionDetector::new()
    }

    #[test]
    fn stacked_statement_is_flagged() {
        let verdict = detector().inspect("1; DROP TABLE users", PatternFamilies::ALL);
        assert!(verdict.flagged);
        assert_eq!(verdict.category, Some(InjectionCategory::Symbol));
        assert_eq!(verdict.matched_pattern.as_deref(), Some(";"));

        assert!(detector().check_keywords("1 DROP TABLE users"));
    }

    #[test]
    fn emails_are_not_flagged() {
        let d = detector();
        assert!(!d.scan("john.doe+test@example.co.uk"));
        assert!(!d.scan("email='jane@example.org'"));
        assert!(d.is_email("\"quoted\"@example.com"));
        assert!(!d.is_email("john doe@example.com"));
    }

    #[test]
    fn numbers_are_not_flagged() {
        let d = detector();
        assert!(!d.scan("12345"));
        assert!(!d.scan("-3.14"));
        assert!(!d.scan(&42_i64));
    }

    #[test]
    fn word_boundaries_protect_identifiers() {
        let d = detector();
        assert!(!d.check_symbols_and_keywords("order_id"));
        assert!(!d.check_logic_gates("android"));
        assert!(d.check_logic_gates("a OR b"));
    }

    #[test]
    fn safe_phrases_only_cover_their_own_span() {
        let d = detector();
        assert!(!d.check_keywords("order by desc"));
        assert!(!d.check_keywords("selective"));
        assert!(d.check_keywords("order by name union select"));
    }

    #[test]
    fn base64_data_uri_is_validated() {
        let d = detector();
        assert!(!d.scan("data:image/png;base64,iVBORw0KGgo="));
        let verdict = d.inspect("data:image/png;base64,@@@", PatternFamilies::ALL);
        assert_eq!(verdict.category, Some(InjectionCategory::Base64));
        assert!(d.scan("x;base64 DROP"));
    }

    #[test]
    fn nested_sequences_are_scanned_recursively() {
        let d = detector();
        let clean = vec![vec!["alice", "bob"], vec!["carol"]];
        assert!(!d.scan(&clean));

        let dirty = vec![vec!["alice"], vec!["bob", "x' OR '1'='1"]];
        assert!(d.scan(&dirty));

        let mixed = vec![SqlValue::Int(3), SqlValue::from("ok"), SqlValue::Null];
        assert!(!d.scan(&mixed));
    }

    #[test]
    fn empty_input_is_never_flagged() {
        let d = detector();
        assert!(!d.scan(""));
        assert!(!d.scan(&Option::<String>::None));
        assert!(!d.scan(&Vec::<String>::new()));
    }

    #[test]
    fn narrow_predicates_respect_their_families() {
        let d = detector();
        assert!(d.check_symbols("a -- comment"));
        assert!(!d.check_keywords("a -- comment"));
        assert!(d.check_symbols_and_logic_gates("x AND y"));
        assert!(d.check_symbols_and_keywords("x AND y"));
        assert!(d.check_keywords_and_logic_gates("UNION"));
        assert!(d.check_all("@@version"));
    }

    #[test]
    fn verdict_converts_to_error() {
        let err = detector()
            .ensure_safe("users; --", PatternFamilies::SYMBOLS)
            .unwrap_err();
        assert!(matches!(
            err,
            SanitizeError::InjectionDetected {
                category: InjectionCategory::Symbol,
                ..
            }
        ));
    }
}
