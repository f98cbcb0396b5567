//! Entry point for callers: routes each operation through the cache binding
//! when one is configured, straight to the boilerplates otherwise.

use crate::boilerplate::QueryBoilerplates;
use crate::error::QueryError;
use crate::pool::ConnectionPool;
use sqlward_cache::{CacheBinding, KeyValueStore};
use sqlward_core::{
    ColumnDescription, ColumnSelection, DbVersion, Filter, Row, SqlValue, SqlwardConfig, TableData,
    WriteOutcome,
};
use sqlward_sanitize::{Clock, Parameterizer};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

pub struct CacheOrchestrator {
    boilerplates: Arc<QueryBoilerplates>,
    binding: RwLock<Option<Arc<CacheBinding>>>,
}

impl std::fmt::Debug for CacheOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheOrchestrator")
            .field("boilerplates", &self.boilerplates)
            .field("binding", &self.cache_binding())
            .finish()
    }
}

impl CacheOrchestrator {
    pub fn new(boilerplates: Arc<QueryBoilerplates>, binding: Option<Arc<CacheBinding>>) -> Self {
        Self {
            boilerplates,
            binding: RwLock::new(binding),
        }
    }

    /// Wire the whole stack from configuration.
    ///
    /// The binding is only installed when `cache.enabled` is set and a store
    /// is supplied.
    pub fn from_parts(
        pool: Arc<dyn ConnectionPool>,
        store: Option<Arc<dyn KeyValueStore>>,
        config: &SqlwardConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let boilerplates = Arc::new(QueryBoilerplates::new(pool, Parameterizer::new(clock)));
        let binding = match store {
            Some(store) if config.cache.enabled => {
                let binding = CacheBinding::from_config(store, config);
                tracing::info!(
                    namespace = %config.cache.namespace,
                    store_label = %config.store_label(),
                    "cache binding enabled"
                );
                Some(Arc::new(binding))
            }
            _ => {
                tracing::info!("cache binding disabled, queries go straight to the database");
                None
            }
        };
        Self::new(boilerplates, binding)
    }

    pub fn boilerplates(&self) -> &Arc<QueryBoilerplates> {
        &self.boilerplates
    }

    pub fn cache_binding(&self) -> Option<Arc<CacheBinding>> {
        self.binding
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swap the binding. `None` disables caching for subsequent calls.
    pub fn set_cache_binding(&self, binding: Option<Arc<CacheBinding>>) {
        *self
            .binding
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = binding;
    }

    // -----------------------------
    // schema reads
    // -----------------------------

    /// Every read takes an optional TTL in seconds. `Some` replaces the
    /// category policy for the entry it stores, `Some(0)` stores it without
    /// expiry.
    pub async fn get_database_version(&self, ttl: Option<i64>) -> Result<DbVersion, QueryError> {
        let qb = &self.boilerplates;
        let version = match self.cache_binding() {
            Some(cache) => cache.get_database_version(ttl, || qb.get_database_version()).await?,
            None => qb.get_database_version().await?,
        };
        // A cache hit never reaches the boilerplates, so keep their copy current.
        qb.set_database_version(Some(version.clone())).await;
        Ok(version)
    }

    pub async fn get_table_names(&self, ttl: Option<i64>) -> Result<Vec<String>, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => cache.get_table_names(ttl, || qb.get_table_names()).await,
            None => qb.get_table_names().await,
        }
    }

    pub async fn get_table_column_names(
        &self,
        table: &str,
        ttl: Option<i64>,
    ) -> Result<Vec<String>, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .get_table_column_names(table, ttl, || qb.get_table_column_names(table))
                    .await
            }
            None => qb.get_table_column_names(table).await,
        }
    }

    pub async fn describe_table(
        &self,
        table: &str,
        ttl: Option<i64>,
    ) -> Result<Vec<ColumnDescription>, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => cache.describe_table(table, ttl, || qb.describe_table(table)).await,
            None => qb.describe_table(table).await,
        }
    }

    pub async fn get_triggers(&self, ttl: Option<i64>) -> Result<BTreeMap<String, String>, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => cache.get_triggers(ttl, || qb.get_triggers()).await,
            None => qb.get_triggers().await,
        }
    }

    pub async fn get_trigger(
        &self,
        name: &str,
        database: Option<&str>,
        ttl: Option<i64>,
    ) -> Result<Option<String>, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .get_trigger(name, database, ttl, || qb.get_trigger(name, database))
                    .await
            }
            None => qb.get_trigger(name, database).await,
        }
    }

    pub async fn get_trigger_names(
        &self,
        database: Option<&str>,
        ttl: Option<i64>,
    ) -> Result<Vec<String>, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .get_trigger_names(database, ttl, || qb.get_trigger_names(database))
                    .await
            }
            None => qb.get_trigger_names(database).await,
        }
    }

    // -----------------------------
    // schema writes
    // -----------------------------

    pub async fn create_table(
        &self,
        table: &str,
        columns: &[(String, String)],
    ) -> Result<WriteOutcome, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .create_table(table, || qb.create_table(table, columns))
                    .await
            }
            None => qb.create_table(table, columns).await,
        }
    }

    pub async fn remove_table(&self, table: &str) -> Result<WriteOutcome, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => cache.remove_table(table, || qb.remove_table(table)).await,
            None => qb.remove_table(table).await,
        }
    }

    pub async fn drop_table(&self, table: &str) -> Result<WriteOutcome, QueryError> {
        self.remove_table(table).await
    }

    pub async fn insert_trigger(
        &self,
        name: &str,
        table: &str,
        timing_event: &str,
        body: &str,
    ) -> Result<WriteOutcome, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .insert_trigger(name, || qb.insert_trigger(name, table, timing_event, body))
                    .await
            }
            None => qb.insert_trigger(name, table, timing_event, body).await,
        }
    }

    pub async fn create_trigger(
        &self,
        name: &str,
        table: &str,
        timing_event: &str,
        body: &str,
    ) -> Result<WriteOutcome, QueryError> {
        self.insert_trigger(name, table, timing_event, body).await
    }

    pub async fn insert_or_update_trigger(
        &self,
        name: &str,
        table: &str,
        timing_event: &str,
        body: &str,
    ) -> Result<WriteOutcome, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .insert_or_update_trigger(name, || {
                        qb.insert_or_update_trigger(name, table, timing_event, body)
                    })
                    .await
            }
            None => {
                qb.insert_or_update_trigger(name, table, timing_event, body)
                    .await
            }
        }
    }

    pub async fn remove_trigger(&self, name: &str) -> Result<WriteOutcome, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => cache.remove_trigger(name, || qb.remove_trigger(name)).await,
            None => qb.remove_trigger(name).await,
        }
    }

    pub async fn drop_trigger(&self, name: &str) -> Result<WriteOutcome, QueryError> {
        self.remove_trigger(name).await
    }

    // -----------------------------
    // rows
    // -----------------------------

    pub async fn get_data_from_table(
        &self,
        table: &str,
        columns: &ColumnSelection,
        filter: &Filter,
        beautify: bool,
        ttl: Option<i64>,
    ) -> Result<TableData, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .get_data_from_table(table, columns, filter, beautify, ttl, || {
                        qb.get_data_from_table(table, columns, filter, beautify)
                    })
                    .await
            }
            None => {
                qb.get_data_from_table(table, columns, filter, beautify)
                    .await
            }
        }
    }

    pub async fn get_table_size(
        &self,
        table: &str,
        column: &str,
        filter: &Filter,
        ttl: Option<i64>,
    ) -> Result<u64, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .get_table_size(table, column, filter, ttl, || {
                        qb.get_table_size(table, column, filter)
                    })
                    .await
            }
            None => qb.get_table_size(table, column, filter).await,
        }
    }

    pub async fn insert_data_into_table(
        &self,
        table: &str,
        rows: &[Row],
        columns: Option<&[String]>,
    ) -> Result<WriteOutcome, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .insert_data_into_table(table, || {
                        qb.insert_data_into_table(table, rows, columns)
                    })
                    .await
            }
            None => qb.insert_data_into_table(table, rows, columns).await,
        }
    }

    pub async fn update_data_in_table(
        &self,
        table: &str,
        values: &[SqlValue],
        columns: Option<&[String]>,
        filter: &Filter,
    ) -> Result<WriteOutcome, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .update_data_in_table(table, || {
                        qb.update_data_in_table(table, values, columns, filter)
                    })
                    .await
            }
            None => {
                qb.update_data_in_table(table, values, columns, filter)
                    .await
            }
        }
    }

    pub async fn insert_or_update_data_into_table(
        &self,
        table: &str,
        rows: &[Row],
        columns: Option<&[String]>,
    ) -> Result<WriteOutcome, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .insert_or_update_data_into_table(table, || {
                        qb.insert_or_update_data_into_table(table, rows, columns)
                    })
                    .await
            }
            None => {
                qb.insert_or_update_data_into_table(table, rows, columns)
                    .await
            }
        }
    }

    pub async fn remove_data_from_table(
        &self,
        table: &str,
        filter: &Filter,
    ) -> Result<WriteOutcome, QueryError> {
        let qb = &self.boilerplates;
        match self.cache_binding() {
            Some(cache) => {
                cache
                    .remove_data_from_table(table, || qb.remove_data_from_table(table, filter))
                    .await
            }
            None => qb.remove_data_from_table(table, filter).await,
        }
    }

    pub async fn drop_data_from_table(&self, table: &str) -> Result<WriteOutcome, QueryError> {
        self.remove_data_from_table(table, &Filter::None).await
    }
}
