//! # sqlward-sanitize
//!
//! Input hardening for sqlward. Everything a caller hands over as text goes
//! through this crate before it can reach a statement:
//!
//! - [`InjectionDetector`] flags values containing SQL symbols, reserved
//!   words or boolean connectives
//! - [`Parameterizer`] rewrites loose `WHERE` fragments into placeholder form
//!   with bound parameters
//! - [`identifier`] validates and quotes table, trigger and column names
//! - [`trigger`] normalizes trigger DDL and rejects piggybacked statements
//!
//! ## Example
//!
//! ```rust
//! use sqlward_core::{Filter, SqlValue};
//! use sqlward_sanitize::Parameterizer;
//!
//! let clause = Parameterizer::default()
//!     .parameterize(&Filter::from(vec!["age > 18", "status = 'active'"]))
//!     .unwrap();
//! assert_eq!(clause.text, "age>? AND status=?");
//! assert_eq!(clause.params, vec![SqlValue::Int(18), SqlValue::from("active")]);
//! ```

pub mod detector;
pub mod error;
pub mod identifier;
pub mod keywords;
pub mod parameterizer;
pub mod time;
pub mod tokenizer;
pub mod trigger;

pub use detector::{InjectionDetector, InjectionVerdict, PatternFamilies, Scannable};
pub use error::{InjectionCategory, SanitizeError};
pub use identifier::{normalize_identifier, quote_column, quote_columns, quote_identifier};
pub use parameterizer::{ParameterizedClause, Parameterizer};
pub use time::{Clock, FixedClock, SystemClock, datetime_to_string, string_to_datetime};
pub use tokenizer::{ClauseToken, TokenKind, tokenize};
pub use trigger::{clean_trigger_creation, normalize_timing_event};
