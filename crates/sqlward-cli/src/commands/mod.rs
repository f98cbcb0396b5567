//! Subcommand implementations for the `sqlward` binary.

pub mod cache_key;
pub mod check;
pub mod parameterize;
pub mod probe;
pub mod scan;
