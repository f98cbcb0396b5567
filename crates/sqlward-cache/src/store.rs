//! Key-value store backends.

use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Minimal key-value surface the cache binding relies on.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a value, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store a value. `None` stores it without expiry.
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError>;

    /// Keys matching a Redis-style glob pattern.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Remove a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove every key matching `pattern`. Returns how many were removed.
    async fn delete_matching(&self, pattern: &str) -> Result<usize, StoreError> {
        let mut removed = 0;
        for key in self.scan(pattern).await? {
            if self.delete(&key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local store with expiry, used by tests and single-instance tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MemoryEntry>>, StoreError> {
        self.entries
            .lock()
            .map_err(|e| StoreError::Command(format!("Failed to acquire store lock: {}", e)))
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = match self.lock() {
            Ok(entries) => entries
                .iter()
                .filter(|(_, e)| e.is_live(now))
                .map(|(k, _)| k.clone())
                .collect(),
            Err(_) => Vec::new(),
        };
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining lifetime of a key: `None` if absent, `Some(None)` if it
    /// never expires.
    pub fn time_to_live(&self, key: &str) -> Option<Option<Duration>> {
        let now = Instant::now();
        let entries = self.lock().ok()?;
        let entry = entries.get(key).filter(|e| e.is_live(now))?;
        Some(entry.expires_at.map(|at| at.saturating_duration_since(now)))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let expires_at = ttl_secs.map(|secs| Instant::now() + Duration::from_secs(secs));
        self.lock()?.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let now = Instant::now();
        let entries = self.lock()?;
        Ok(entries
            .iter()
            .filter(|(k, e)| e.is_live(now) && glob_match(pattern, k))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(key).is_some())
    }
}

/// Redis `MATCH` semantics: `*`, `?`, `[abc]`, `[^a-z]` and `\` escapes.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_match_from(&pattern, &text)
}

fn glob_match_from(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Position to resume from after the most recent `*`.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    backtrack = Some((p, t));
                    p += 1;
                    continue;
                }
                '?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next;
                            t += 1;
                            continue;
                        }
                    }
                }
                '\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c => {
                    if c == text[t] {
                        p += 1;
                        t += 1;
                        continue;
                    }
                }
            }
        }

        match backtrack {
            Some((star_p, star_t)) => {
                backtrack = Some((star_p, star_t + 1));
                p = star_p + 1;
                t = star_t + 1;
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Match `c` against the class starting at `pattern[start] == '['`.
/// Returns whether it matched and the index just past the closing `]`.
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != ']' {
        let mut low = pattern[i];
        if low == '\\' && i + 1 < pattern.len() {
            i += 1;
            low = pattern[i];
        }
        if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let high = pattern[i + 2];
            if (low <= c && c <= high) || (high <= c && c <= low) {
                matched = true;
            }
            i += 3;
        } else {
            if low == c {
                matched = true;
            }
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_semantics() {
        assert!(glob_match("sql:app:data:users:*", "sql:app:data:users:abc"));
        assert!(!glob_match("sql:app:data:users:*", "sql:app:data:users_archive:abc"));
        assert!(glob_match("a?c", "abc"));
        assert!(!glob_match("a?c", "ac"));
        assert!(glob_match("h[ae]llo", "hallo"));
        assert!(!glob_match("h[^e]llo", "hello"));
        assert!(glob_match("h[a-c]llo", "hbllo"));
        assert!(glob_match(r"lit\*", "lit*"));
        assert!(!glob_match(r"lit\*", "lit-x"));
        assert!(glob_match("*", ""));
        assert!(glob_match("*:tail", "x:y:tail"));
    }

    #[tokio::test]
    async fn memory_store_round_trip_and_ttl() {
        let store = MemoryStore::new();
        store.set("k1", "v1", Some(60)).await.unwrap();
        store.set("k2", "v2", None).await.unwrap();

        assert_eq!(store.get("k1").await.unwrap().as_deref(), Some("v1"));
        assert!(store.time_to_live("k1").unwrap().unwrap() <= Duration::from_secs(60));
        assert_eq!(store.time_to_live("k2"), Some(None));
        assert_eq!(store.time_to_live("missing"), None);

        assert!(store.delete("k1").await.unwrap());
        assert!(!store.delete("k1").await.unwrap());
        assert_eq!(store.keys(), vec!["k2".to_string()]);
    }

    #[tokio::test]
    async fn delete_matching_uses_scan() {
        let store = MemoryStore::new();
        for key in ["p:data:users:1", "p:data:users:2", "p:data:orders:1"] {
            store.set(key, "x", None).await.unwrap();
        }
        assert_eq!(store.delete_matching("p:data:users:*").await.unwrap(), 2);
        assert_eq!(store.keys(), vec!["p:data:orders:1".to_string()]);
    }
}
