//! Cache key derivation.
//!
//! Keys look like `namespace:store_label:category:name[:param_hash]`. The
//! hash is the first 20 hex characters of the SHA-256 of a canonical JSON
//! rendering of the call parameters: object keys sorted, sequences kept in
//! order, sets sorted by their members' canonical form.

use crate::error::CacheError;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use sqlward_core::CacheCategory;
use std::fmt;

const HASH_LEN: usize = 20;

/// Fully qualified cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: String,
    pub store_label: String,
    pub category: CacheCategory,
    pub name: String,
    pub param_hash: Option<String>,
}

impl CacheKey {
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.namespace, self.store_label, self.category, self.name
        )?;
        if let Some(hash) = &self.param_hash {
            write!(f, ":{}", hash)?;
        }
        Ok(())
    }
}

/// Named call parameters feeding the key hash.
#[derive(Debug, Clone, Default)]
pub struct KeyParams {
    fields: Map<String, Value>,
}

impl KeyParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an order-significant parameter.
    pub fn field<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Result<Self, CacheError> {
        self.fields.insert(name.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    /// Add a parameter whose members have no meaningful order.
    pub fn set_field<T, I>(mut self, name: &str, members: I) -> Result<Self, CacheError>
    where
        T: Serialize,
        I: IntoIterator<Item = T>,
    {
        let mut values = members
            .into_iter()
            .map(|m| serde_json::to_value(&m))
            .collect::<Result<Vec<_>, _>>()?;
        values.sort_by_cached_key(stable_dump);
        self.fields.insert(name.to_string(), Value::Array(values));
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Digest of the parameters, `None` when there are none.
    pub fn digest(&self) -> Option<String> {
        if self.fields.is_empty() {
            return None;
        }
        Some(short_hash(&Value::Object(self.fields.clone())))
    }
}

/// Canonical compact JSON: object keys sorted at every depth.
pub fn stable_dump(value: &Value) -> String {
    let mut out = String::new();
    write_stable(value, &mut out);
    out
}

fn write_stable(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_stable(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_stable(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// First 20 hex characters of the SHA-256 of the canonical form.
pub fn short_hash(value: &Value) -> String {
    let digest = Sha256::digest(stable_dump(value).as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_LEN);
    hex
}

/// Escape glob metacharacters so a resource name matches only itself.
pub fn escape_glob(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_with_and_without_hash() {
        let mut key = CacheKey {
            namespace: "sql".into(),
            store_label: "shop".into(),
            category: CacheCategory::Schema,
            name: "table_names".into(),
            param_hash: None,
        };
        assert_eq!(key.render(), "sql:shop:schema:table_names");
        key.param_hash = Some("abc".into());
        assert_eq!(key.render(), "sql:shop:schema:table_names:abc");
    }

    #[test]
    fn stable_dump_sorts_nested_keys() {
        let a = json!({"b": 1, "a": {"d": [3, 1], "c": null}});
        assert_eq!(stable_dump(&a), r#"{"a":{"c":null,"d":[3,1]},"b":1}"#);
    }

    #[test]
    fn digest_is_independent_of_insertion_order() {
        let first = KeyParams::new()
            .field("table", "users").unwrap()
            .field("where", &vec!["age > 18"]).unwrap();
        let second = KeyParams::new()
            .field("where", &vec!["age > 18"]).unwrap()
            .field("table", "users").unwrap();
        assert_eq!(first.digest(), second.digest());
        assert_eq!(first.digest().unwrap().len(), 20);

        let reordered = KeyParams::new()
            .field("where", &vec!["x", "y"]).unwrap();
        let swapped = KeyParams::new()
            .field("where", &vec!["y", "x"]).unwrap();
        assert_ne!(reordered.digest(), swapped.digest());
    }

    #[test]
    fn set_fields_ignore_member_order() {
        let a = KeyParams::new().set_field("cols", ["b", "a"]).unwrap();
        let b = KeyParams::new().set_field("cols", ["a", "b"]).unwrap();
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn empty_params_have_no_digest() {
        assert_eq!(KeyParams::new().digest(), None);
    }

    #[test]
    fn glob_escaping() {
        assert_eq!(escape_glob("users"), "users");
        assert_eq!(escape_glob("we*ird[1]"), r"we\*ird\[1\]");
    }
}
