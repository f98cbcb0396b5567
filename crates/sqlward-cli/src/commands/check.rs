//! `sqlward check-config`: validate a configuration file and summarize it.

use anyhow::Result;
use sqlward_core::{CacheBackend, CacheCategory, SqlwardConfig};
use std::path::Path;

pub fn summary(config: &SqlwardConfig) -> Vec<String> {
    let mut lines = vec![format!(
        "database: {}",
        config.database.redacted_connection_string()
    )];

    if config.cache.enabled {
        let backend = match config.cache.backend {
            CacheBackend::Redis => config.cache.redis_url_redacted(),
            CacheBackend::Memory => "memory".to_string(),
        };
        lines.push(format!("cache: {}", backend));
        lines.push(format!(
            "keys: {}:{}:<category>:<name>",
            config.cache.namespace,
            config.store_label()
        ));
        for category in [
            CacheCategory::Version,
            CacheCategory::Schema,
            CacheCategory::Data,
            CacheCategory::Count,
        ] {
            let ttl = match config.cache.ttl.effective(category, None) {
                Some(secs) => format!("{}s", secs),
                None => "no expiry".to_string(),
            };
            lines.push(format!("  ttl {}: {}", category, ttl));
        }
    } else {
        lines.push("cache: disabled".to_string());
    }

    lines.push(format!("log level: {}", config.logging.level));
    lines
}

/// The configuration has already been loaded and validated by the caller.
pub fn run(path: &Path, config: &SqlwardConfig) -> Result<()> {
    println!("Checking {}", path.display());
    for line in summary(config) {
        println!("  {}", line);
    }
    println!("✔ Configuration valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_memory_backend() {
        let config = SqlwardConfig::from_yaml(
            "database:\n  name: shop\ncache:\n  backend: memory\n  ttl:\n    data: 0\n",
        )
        .unwrap();
        let lines = summary(&config);
        assert!(lines.contains(&"cache: memory".to_string()));
        assert!(lines.contains(&"keys: sql:shop:<category>:<name>".to_string()));
        assert!(lines.contains(&"  ttl data: no expiry".to_string()));
    }

    #[test]
    fn test_summary_hides_redis_password() {
        let config = SqlwardConfig::from_yaml("cache:\n  password: hunter2\n").unwrap();
        let joined = summary(&config).join("\n");
        assert!(!joined.contains("hunter2"));
    }

    #[test]
    fn test_summary_disabled_cache() {
        let config = SqlwardConfig::from_yaml("cache:\n  enabled: false\n").unwrap();
        assert!(summary(&config).contains(&"cache: disabled".to_string()));
    }
}
