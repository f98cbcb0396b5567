//! Cache binding for sqlward.
//!
//! Provides:
//! - `KeyValueStore` with Redis and in-memory backends
//! - Deterministic key derivation (`CacheKey`, `KeyParams`)
//! - `CacheBinding`, the read-through / write-invalidate protocol used by
//!   the query layer

pub mod binding;
pub mod error;
pub mod key;
pub mod redis_store;
pub mod store;

pub use binding::CacheBinding;
pub use error::{CacheError, StoreError};
pub use key::{CacheKey, KeyParams, escape_glob, short_hash, stable_dump};
pub use redis_store::RedisStore;
pub use store::{KeyValueStore, MemoryStore, glob_match};

use sqlward_core::{CacheBackend, SqlwardConfig};
use std::sync::Arc;

/// Build the store selected by `config.cache.backend`.
pub fn store_from_config(config: &SqlwardConfig) -> Arc<dyn KeyValueStore> {
    match config.cache.backend {
        CacheBackend::Redis => Arc::new(RedisStore::from_config(&config.cache)),
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
    }
}
