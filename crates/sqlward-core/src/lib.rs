//! # sqlward-core
//!
//! Shared types for the sqlward crates: the values exchanged with the
//! datastore ([`SqlValue`], [`Row`], [`Record`], [`TableData`]), the
//! selectors callers hand to the query layer ([`ColumnSelection`],
//! [`Filter`]) and the configuration model ([`SqlwardConfig`]).

// Configuration types shared across all sqlward crates
pub mod config;
pub mod value;

pub use config::{
    CacheBackend, CacheCategory, CacheConfig, ConfigError, DatabaseConfig, LoggingConfig,
    SqlwardConfig, TtlPolicy,
};
pub use value::{
    ColumnDescription, ColumnSelection, DATE_AND_TIME, DATE_ONLY, DbVersion, Filter, Record, Row,
    SqlValue, TableData, WriteOutcome,
};
