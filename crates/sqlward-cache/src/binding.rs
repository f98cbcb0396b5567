//! Read-through / write-invalidate protocol.
//!
//! Reads derive a key, return the cached payload on a hit and otherwise call
//! the supplied fetcher, caching its `Ok` result under the category TTL.
//! Errors from the fetcher are returned untouched and never cached.
//!
//! Writes call the supplied writer and, only when it returns `Ok`, delete
//! every key that could hold data derived from the touched resource.
//! Invalidation is best-effort: failures are logged, the write result
//! stands. An unreachable store never fails a read either; the fetcher is
//! called directly.
//!
//! Table and trigger names are normalized (`` `users` `` and `users` are the
//! same table) before they become part of a key or an invalidation pattern.
//!
//! Every typed read takes an optional TTL in seconds that beats the category
//! policy for that one entry.

use crate::error::CacheError;
use crate::key::{CacheKey, KeyParams, escape_glob};
use crate::store::KeyValueStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlward_core::{
    CacheCategory, ColumnDescription, ColumnSelection, DbVersion, Filter, SqlwardConfig,
    TableData, TtlPolicy, WriteOutcome,
};
use sqlward_sanitize::normalize_identifier;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

/// Cache front for the query layer.
pub struct CacheBinding {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    store_label: String,
    ttl: TtlPolicy,
    strict_decode: bool,
}

impl std::fmt::Debug for CacheBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBinding")
            .field("namespace", &self.namespace)
            .field("store_label", &self.store_label)
            .field("ttl", &self.ttl)
            .field("strict_decode", &self.strict_decode)
            .finish()
    }
}

impl CacheBinding {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        namespace: impl Into<String>,
        store_label: impl Into<String>,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            store_label: store_label.into(),
            ttl: TtlPolicy::default(),
            strict_decode: false,
        }
    }

    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &SqlwardConfig) -> Self {
        Self::new(store, config.cache.namespace.clone(), config.store_label())
            .with_ttl(config.cache.ttl)
            .with_strict_decode(config.cache.strict_decode)
    }

    pub fn with_ttl(mut self, ttl: TtlPolicy) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_strict_decode(mut self, strict: bool) -> Self {
        self.strict_decode = strict;
        self
    }

    pub fn ttl_policy(&self) -> &TtlPolicy {
        &self.ttl
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    // -----------------------------
    // keys
    // -----------------------------

    pub fn key(&self, category: CacheCategory, name: impl Into<String>) -> CacheKey {
        CacheKey {
            namespace: self.namespace.clone(),
            store_label: self.store_label.clone(),
            category,
            name: name.into(),
            param_hash: None,
        }
    }

    pub fn key_with_params(
        &self,
        category: CacheCategory,
        name: impl Into<String>,
        params: &KeyParams,
    ) -> CacheKey {
        CacheKey {
            param_hash: params.digest(),
            ..self.key(category, name)
        }
    }

    fn prefix(&self) -> String {
        format!(
            "{}:{}:",
            escape_glob(&self.namespace),
            escape_glob(&self.store_label)
        )
    }

    /// Patterns covering everything derived from `table`.
    pub fn table_patterns(&self, table: &str) -> Vec<String> {
        let prefix = self.prefix();
        let table = escape_glob(normalize_identifier(table));
        let mut patterns = Vec::new();
        for base in [
            format!("data:{}", table),
            format!("count:{}", table),
            format!("schema:columns:{}", table),
            format!("schema:describe:{}", table),
        ] {
            patterns.push(format!("{}{}", prefix, base));
            patterns.push(format!("{}{}:*", prefix, base));
        }
        patterns
    }

    fn table_list_patterns(&self) -> Vec<String> {
        let prefix = self.prefix();
        vec![
            format!("{}schema:table_names", prefix),
            format!("{}schema:table_names:*", prefix),
        ]
    }

    /// Patterns covering one trigger, or every trigger when `name` is `None`.
    pub fn trigger_patterns(&self, name: Option<&str>) -> Vec<String> {
        let prefix = self.prefix();
        let mut patterns = match name {
            Some(name) => {
                let name = escape_glob(normalize_identifier(name));
                vec![
                    format!("{}schema:trigger:{}", prefix, name),
                    format!("{}schema:trigger:{}:*", prefix, name),
                ]
            }
            None => vec![format!("{}schema:trigger:*", prefix)],
        };
        patterns.extend([
            format!("{}schema:triggers", prefix),
            format!("{}schema:triggers:*", prefix),
            format!("{}schema:trigger_names", prefix),
            format!("{}schema:trigger_names:*", prefix),
        ]);
        patterns
    }

    // -----------------------------
    // protocol
    // -----------------------------

    /// Return the cached value for `key` or fetch and cache it.
    pub async fn read_through<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl_override: Option<i64>,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let rendered = key.render();

        let cached = match self.store.get(&rendered).await {
            Ok(cached) => cached,
            Err(err) => {
                tracing::warn!(key = %rendered, error = %err, "cache store unavailable, reading from the database");
                return fetch().await;
            }
        };

        match cached {
            Some(payload) => match serde_json::from_str::<T>(&payload) {
                Ok(value) => {
                    tracing::debug!(key = %rendered, "cache hit");
                    return Ok(value);
                }
                Err(err) if self.strict_decode => {
                    tracing::error!(key = %rendered, error = %err, "undecodable cache entry");
                    return Err(CacheError::from(err).into());
                }
                Err(err) => {
                    tracing::warn!(key = %rendered, error = %err, "discarding undecodable cache entry");
                    if let Err(err) = self.store.delete(&rendered).await {
                        tracing::warn!(key = %rendered, error = %err, "failed to drop undecodable entry");
                    }
                }
            },
            None => tracing::debug!(key = %rendered, "cache miss"),
        }

        let value = fetch().await?;

        let ttl = self.ttl.effective(key.category, ttl_override);
        match serde_json::to_string(&value) {
            Ok(payload) => {
                if let Err(err) = self.store.set(&rendered, &payload, ttl).await {
                    tracing::warn!(key = %rendered, error = %err, "failed to populate cache");
                }
            }
            Err(err) => {
                tracing::warn!(key = %rendered, error = %err, "result not serializable, skipping cache");
            }
        }

        Ok(value)
    }

    /// Run `write` and, if it succeeds, invalidate `patterns`.
    pub async fn write_through<T, E, F, Fut>(&self, patterns: Vec<String>, write: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let outcome = write().await?;
        match self.delete_patterns(&patterns).await {
            Ok(removed) => tracing::debug!(removed, "invalidated cache entries after write"),
            Err(err) => tracing::warn!(error = %err, "cache invalidation failed after write"),
        }
        Ok(outcome)
    }

    async fn delete_patterns(&self, patterns: &[String]) -> Result<usize, CacheError> {
        let mut removed = 0;
        for pattern in patterns {
            removed += self.store.delete_matching(pattern).await?;
        }
        Ok(removed)
    }

    // -----------------------------
    // explicit invalidation
    // -----------------------------

    pub async fn invalidate_table(&self, table: &str) -> Result<usize, CacheError> {
        self.delete_patterns(&self.table_patterns(table)).await
    }

    pub async fn invalidate_trigger(&self, name: Option<&str>) -> Result<usize, CacheError> {
        self.delete_patterns(&self.trigger_patterns(name)).await
    }

    pub async fn invalidate_schema(&self) -> Result<usize, CacheError> {
        self.delete_patterns(&[format!("{}schema:*", self.prefix())])
            .await
    }

    pub async fn invalidate_all(&self) -> Result<usize, CacheError> {
        self.delete_patterns(&[format!("{}*", self.prefix())]).await
    }

    // -----------------------------
    // reads
    // -----------------------------

    pub async fn get_database_version<E, F, Fut>(
        &self,
        ttl: Option<i64>,
        fetch: F,
    ) -> Result<DbVersion, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DbVersion, E>>,
    {
        let key = self.key(CacheCategory::Version, "db_version");
        self.read_through(&key, ttl, fetch).await
    }

    pub async fn get_table_names<E, F, Fut>(
        &self,
        ttl: Option<i64>,
        fetch: F,
    ) -> Result<Vec<String>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, E>>,
    {
        let key = self.key(CacheCategory::Schema, "table_names");
        self.read_through(&key, ttl, fetch).await
    }

    pub async fn get_table_column_names<E, F, Fut>(
        &self,
        table: &str,
        ttl: Option<i64>,
        fetch: F,
    ) -> Result<Vec<String>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, E>>,
    {
        let table = normalize_identifier(table);
        let key = self.key(CacheCategory::Schema, format!("columns:{}", table));
        self.read_through(&key, ttl, fetch).await
    }

    pub async fn describe_table<E, F, Fut>(
        &self,
        table: &str,
        ttl: Option<i64>,
        fetch: F,
    ) -> Result<Vec<ColumnDescription>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<ColumnDescription>, E>>,
    {
        let table = normalize_identifier(table);
        let key = self.key(CacheCategory::Schema, format!("describe:{}", table));
        self.read_through(&key, ttl, fetch).await
    }

    pub async fn get_triggers<E, F, Fut>(
        &self,
        ttl: Option<i64>,
        fetch: F,
    ) -> Result<BTreeMap<String, String>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BTreeMap<String, String>, E>>,
    {
        let key = self.key(CacheCategory::Schema, "triggers");
        self.read_through(&key, ttl, fetch).await
    }

    pub async fn get_trigger<E, F, Fut>(
        &self,
        name: &str,
        database: Option<&str>,
        ttl: Option<i64>,
        fetch: F,
    ) -> Result<Option<String>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<String>, E>>,
    {
        let key = self.key_with_params(
            CacheCategory::Schema,
            format!("trigger:{}", normalize_identifier(name)),
            &database_params(database)?,
        );
        self.read_through(&key, ttl, fetch).await
    }

    pub async fn get_trigger_names<E, F, Fut>(
        &self,
        database: Option<&str>,
        ttl: Option<i64>,
        fetch: F,
    ) -> Result<Vec<String>, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, E>>,
    {
        let key = self.key_with_params(
            CacheCategory::Schema,
            "trigger_names",
            &database_params(database)?,
        );
        self.read_through(&key, ttl, fetch).await
    }

    pub async fn get_table_size<E, F, Fut>(
        &self,
        table: &str,
        column: &str,
        filter: &Filter,
        ttl: Option<i64>,
        fetch: F,
    ) -> Result<u64, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<u64, E>>,
    {
        let table = normalize_identifier(table);
        let params = KeyParams::new()
            .field("table", table)?
            .field("column", normalize_identifier(column))?
            .field("where", filter)?;
        let key = self.key_with_params(CacheCategory::Count, table, &params);
        self.read_through(&key, ttl, fetch).await
    }

    pub async fn get_data_from_table<E, F, Fut>(
        &self,
        table: &str,
        columns: &ColumnSelection,
        filter: &Filter,
        beautify: bool,
        ttl: Option<i64>,
        fetch: F,
    ) -> Result<TableData, E>
    where
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TableData, E>>,
    {
        let table = normalize_identifier(table);
        let params = KeyParams::new()
            .field("table", table)?
            .field("column", columns)?
            .field("where", filter)?
            .field("beautify", &beautify)?;
        let key = self.key_with_params(CacheCategory::Data, table, &params);
        self.read_through(&key, ttl, fetch).await
    }

    // -----------------------------
    // writes
    // -----------------------------

    pub async fn create_table<E, F, Fut>(&self, table: &str, write: F) -> Result<WriteOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WriteOutcome, E>>,
    {
        let mut patterns = self.table_list_patterns();
        patterns.extend(self.table_patterns(table));
        self.write_through(patterns, write).await
    }

    pub async fn remove_table<E, F, Fut>(&self, table: &str, write: F) -> Result<WriteOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WriteOutcome, E>>,
    {
        let mut patterns = self.table_list_patterns();
        patterns.extend(self.table_patterns(table));
        self.write_through(patterns, write).await
    }

    pub async fn insert_data_into_table<E, F, Fut>(
        &self,
        table: &str,
        write: F,
    ) -> Result<WriteOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WriteOutcome, E>>,
    {
        self.write_through(self.table_patterns(table), write).await
    }

    pub async fn update_data_in_table<E, F, Fut>(
        &self,
        table: &str,
        write: F,
    ) -> Result<WriteOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WriteOutcome, E>>,
    {
        self.write_through(self.table_patterns(table), write).await
    }

    pub async fn insert_or_update_data_into_table<E, F, Fut>(
        &self,
        table: &str,
        write: F,
    ) -> Result<WriteOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WriteOutcome, E>>,
    {
        self.write_through(self.table_patterns(table), write).await
    }

    pub async fn remove_data_from_table<E, F, Fut>(
        &self,
        table: &str,
        write: F,
    ) -> Result<WriteOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WriteOutcome, E>>,
    {
        self.write_through(self.table_patterns(table), write).await
    }

    pub async fn insert_trigger<E, F, Fut>(&self, name: &str, write: F) -> Result<WriteOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WriteOutcome, E>>,
    {
        self.write_through(self.trigger_patterns(Some(name)), write)
            .await
    }

    pub async fn insert_or_update_trigger<E, F, Fut>(
        &self,
        name: &str,
        write: F,
    ) -> Result<WriteOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WriteOutcome, E>>,
    {
        self.write_through(self.trigger_patterns(Some(name)), write)
            .await
    }

    pub async fn remove_trigger<E, F, Fut>(&self, name: &str, write: F) -> Result<WriteOutcome, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<WriteOutcome, E>>,
    {
        self.write_through(self.trigger_patterns(Some(name)), write)
            .await
    }
}

fn database_params(database: Option<&str>) -> Result<KeyParams, CacheError> {
    match database {
        Some(db) => KeyParams::new().field("database", normalize_identifier(db)),
        None => Ok(KeyParams::new()),
    }
}
