//! Cache configuration types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which key-value store backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Redis (TCP or unix socket).
    #[default]
    Redis,
    /// Process-local store, useful for tests and single-instance tools.
    Memory,
}

/// Family of cached data. Each family has its own expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheCategory {
    Version,
    Schema,
    Data,
    Count,
}

impl CacheCategory {
    /// Key segment for this family.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Version => "version",
            CacheCategory::Schema => "schema",
            CacheCategory::Data => "data",
            CacheCategory::Count => "count",
        }
    }
}

impl fmt::Display for CacheCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expiry in seconds per category. Zero or negative means no expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlPolicy {
    #[serde(default = "default_version_ttl")]
    pub version: i64,

    #[serde(default = "default_schema_ttl")]
    pub schema: i64,

    #[serde(default = "default_data_ttl")]
    pub data: i64,

    #[serde(default = "default_count_ttl")]
    pub count: i64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            version: default_version_ttl(),
            schema: default_schema_ttl(),
            data: default_data_ttl(),
            count: default_count_ttl(),
        }
    }
}

impl TtlPolicy {
    pub fn seconds_for(&self, category: CacheCategory) -> i64 {
        match category {
            CacheCategory::Version => self.version,
            CacheCategory::Schema => self.schema,
            CacheCategory::Data => self.data,
            CacheCategory::Count => self.count,
        }
    }

    /// Expiry to hand to the store: `None` stores the entry without expiry.
    ///
    /// A per-call override takes precedence over the category default.
    pub fn effective(&self, category: CacheCategory, override_secs: Option<i64>) -> Option<u64> {
        let secs = override_secs.unwrap_or_else(|| self.seconds_for(category));
        if secs > 0 { Some(secs as u64) } else { None }
    }
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether reads go through the cache at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub backend: CacheBackend,

    /// Full Redis URL (`redis://…` or `redis+unix://…`). Overrides host/port/socket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Unix socket path. Preferred over host/port when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable containing the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Logical Redis database index.
    #[serde(default)]
    pub db: i64,

    /// First segment of every key.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Second segment of every key. Falls back to the database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_label: Option<String>,

    /// Surface undecodable entries as errors instead of refetching.
    #[serde(default)]
    pub strict_decode: bool,

    #[serde(default)]
    pub ttl: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::default(),
            url: None,
            host: default_host(),
            port: default_port(),
            socket_path: None,
            password: None,
            password_env: None,
            db: 0,
            namespace: default_namespace(),
            store_label: None,
            strict_decode: false,
            ttl: TtlPolicy::default(),
        }
    }
}

impl CacheConfig {
    pub fn resolved_password(&self) -> Option<String> {
        if let Some(env_var) = &self.password_env {
            if let Ok(value) = std::env::var(env_var) {
                return Some(value);
            }
        }
        self.password.clone()
    }

    /// Label for the second key segment.
    pub fn resolved_store_label(&self, database_name: &str) -> String {
        match &self.store_label {
            Some(label) if !label.trim().is_empty() => label.trim().to_string(),
            _ if !database_name.trim().is_empty() => database_name.trim().to_string(),
            _ => "default".to_string(),
        }
    }

    /// Connection URL understood by the `redis` crate.
    pub fn redis_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }

        let password = self.resolved_password();
        match &self.socket_path {
            Some(path) => {
                let mut url = format!("redis+unix://{}?db={}", path, self.db);
                if let Some(password) = password {
                    url.push_str("&pass=");
                    url.push_str(&urlencoding::encode(&password));
                }
                url
            }
            None => match password {
                Some(password) => format!(
                    "redis://:{}@{}:{}/{}",
                    urlencoding::encode(&password),
                    self.host,
                    self.port,
                    self.db
                ),
                None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
            },
        }
    }

    /// Store location with the password masked, for logs.
    pub fn redis_url_redacted(&self) -> String {
        if self.url.is_some() {
            return "redis://<from url>".to_string();
        }
        match &self.socket_path {
            Some(path) => format!("redis+unix://{}?db={}", path, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_namespace() -> String {
    "sql".to_string()
}

fn default_version_ttl() -> i64 {
    86400
}

fn default_schema_ttl() -> i64 {
    3600
}

fn default_data_ttl() -> i64 {
    120
}

fn default_count_ttl() -> i64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_defaults() {
        let ttl = TtlPolicy::default();
        assert_eq!(ttl.effective(CacheCategory::Version, None), Some(86400));
        assert_eq!(ttl.effective(CacheCategory::Schema, None), Some(3600));
        assert_eq!(ttl.effective(CacheCategory::Data, None), Some(120));
        assert_eq!(ttl.effective(CacheCategory::Count, None), Some(60));
    }

    #[test]
    fn non_positive_ttl_means_no_expiry() {
        let ttl = TtlPolicy {
            data: 0,
            ..Default::default()
        };
        assert_eq!(ttl.effective(CacheCategory::Data, None), None);
        assert_eq!(ttl.effective(CacheCategory::Count, Some(-1)), None);
        assert_eq!(ttl.effective(CacheCategory::Data, Some(5)), Some(5));
    }

    #[test]
    fn store_label_falls_back_to_database_then_default() {
        let mut config = CacheConfig::default();
        assert_eq!(config.resolved_store_label("shop"), "shop");
        assert_eq!(config.resolved_store_label(""), "default");
        config.store_label = Some("primary".to_string());
        assert_eq!(config.resolved_store_label("shop"), "primary");
    }

    #[test]
    fn redis_password_is_percent_encoded() {
        let config = CacheConfig {
            password: Some("p@ss:w/rd".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.redis_url(),
            "redis://:p%40ss%3Aw%2Frd@127.0.0.1:6379/0"
        );

        let socket = CacheConfig {
            socket_path: Some("/run/redis.sock".to_string()),
            password: Some("a&b=c".to_string()),
            ..Default::default()
        };
        assert_eq!(
            socket.redis_url(),
            "redis+unix:///run/redis.sock?db=0&pass=a%26b%3Dc"
        );
    }

    #[test]
    fn redis_url_prefers_socket() {
        let config = CacheConfig {
            socket_path: Some("/run/redis/redis.sock".to_string()),
            password: Some("pw".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.redis_url(),
            "redis+unix:///run/redis/redis.sock?db=0&pass=pw"
        );
        assert_eq!(
            CacheConfig::default().redis_url(),
            "redis://127.0.0.1:6379/0"
        );
        assert_eq!(
            config.redis_url_redacted(),
            "redis+unix:///run/redis/redis.sock?db=0"
        );
    }
}
