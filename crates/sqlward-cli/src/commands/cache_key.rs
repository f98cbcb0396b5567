//! `sqlward cache-key`: derive the key a cached call would use.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde_json::Value;
use sqlward_cache::{CacheKey, KeyParams};
use sqlward_core::{CacheCategory, SqlwardConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CategoryArg {
    Version,
    Schema,
    Data,
    Count,
}

impl From<CategoryArg> for CacheCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Version => CacheCategory::Version,
            CategoryArg::Schema => CacheCategory::Schema,
            CategoryArg::Data => CacheCategory::Data,
            CategoryArg::Count => CacheCategory::Count,
        }
    }
}

/// Split `name=json`. A value that is not valid JSON is taken as a string.
pub fn parse_param(raw: &str) -> Result<(String, Value)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("parameter '{}' must look like name=value", raw);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("parameter '{}' has an empty name", raw);
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

pub fn derive(
    config: &SqlwardConfig,
    category: CategoryArg,
    name: &str,
    params: &[String],
    set_params: &[String],
) -> Result<CacheKey> {
    let mut key_params = KeyParams::new();
    for raw in params {
        let (field, value) = parse_param(raw)?;
        key_params = key_params.field(&field, &value)?;
    }
    for raw in set_params {
        let (field, value) = parse_param(raw)?;
        let Value::Array(members) = value else {
            bail!("set parameter '{}' must be a JSON array", field);
        };
        key_params = key_params
            .set_field(&field, members)
            .with_context(|| format!("cannot hash set parameter '{}'", field))?;
    }

    Ok(CacheKey {
        namespace: config.cache.namespace.clone(),
        store_label: config.store_label(),
        category: category.into(),
        name: name.to_string(),
        param_hash: key_params.digest(),
    })
}
