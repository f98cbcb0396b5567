//! Redis backed store.
//!
//! The connection manager is created on first use and shared afterwards;
//! concurrent first calls race on a `OnceCell`, so exactly one client is
//! built.

use crate::error::StoreError;
use crate::store::KeyValueStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use sqlward_core::CacheConfig;
use tokio::sync::OnceCell;

const SCAN_BATCH: usize = 500;

pub struct RedisStore {
    url: String,
    manager: OnceCell<ConnectionManager>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.manager.initialized())
            .finish()
    }
}

impl RedisStore {
    /// Store for a `redis://` or `redis+unix://` URL. Nothing is dialed yet.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            manager: OnceCell::new(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.redis_url())
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                let client = redis::Client::open(self.url.as_str())?;
                let manager = ConnectionManager::new(client).await?;
                tracing::info!("Connected to Redis cache store");
                Ok::<_, redis::RedisError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd(if ttl_secs.is_some() { "SETEX" } else { "SET" });
        cmd.arg(key);
        if let Some(secs) = ttl_secs {
            cmd.arg(secs);
        }
        cmd.arg(value);
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }
}
