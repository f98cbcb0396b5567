//! Query execution for sqlward.
//!
//! [`QueryBoilerplates`] builds parameterized statements for every schema and
//! row operation and runs them on a [`ConnectionPool`].
//! [`CacheOrchestrator`] puts the cache binding in front of them.

pub mod boilerplate;
pub mod error;
pub mod orchestrator;
pub mod pool;

pub use boilerplate::QueryBoilerplates;
pub use error::{PoolError, PoolErrorKind, QueryError};
pub use orchestrator::CacheOrchestrator;
pub use pool::{ConnectionPool, QueryRows};
