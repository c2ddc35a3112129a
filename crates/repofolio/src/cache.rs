//! Process-lifetime response cache with optional TTL.
//!
//! Entries expire lazily: an entry older than the TTL is dropped the next
//! time it is looked up. A TTL of zero keeps entries until [`InMemoryCache::clear`].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Serialize, Serializer};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    stored_at: Instant,
}

/// Per-entry view returned by [`InMemoryCache::stats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryStats {
    pub key: String,
    pub age_seconds: f64,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    /// Zero means entries never expire.
    pub ttl_seconds: u64,
    pub entries: Vec<CacheEntryStats>,
}

/// Key/value cache shared by every request of a [`crate::Pipeline`].
#[derive(Debug, Default)]
pub struct InMemoryCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    /// Create a cache; a zero `ttl` disables expiry.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        !self.ttl.is_zero() && now.duration_since(entry.stored_at) > self.ttl
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.lock();
        let now = Instant::now();
        let entry = entries.get(key)?;

        if self.is_expired(entry, now) {
            tracing::debug!(key, "Cache expired");
            entries.remove(key);
            return None;
        }

        tracing::debug!(key, "Cache hit");
        Some(entry.value.clone())
    }

    /// Deserialize a cached value into `T`; undecodable entries are misses.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        let key = key.into();
        tracing::debug!(key = %key, "Cache store");
        self.lock().insert(
            key,
            CacheEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Remove every entry, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let count = entries.len();
        entries.clear();
        tracing::info!(count, "Cache cleared");
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        let now = Instant::now();
        let mut list: Vec<CacheEntryStats> = entries
            .iter()
            .map(|(key, entry)| CacheEntryStats {
                key: key.clone(),
                age_seconds: now.duration_since(entry.stored_at).as_secs_f64(),
                expired: self.is_expired(entry, now),
            })
            .collect();
        list.sort_by(|a, b| a.key.cmp(&b.key));

        CacheStats {
            size: entries.len(),
            ttl_seconds: self.ttl.as_secs(),
            entries: list,
        }
    }
}

/// Build a cache key from an operation name and its parameters.
///
/// Object keys are sorted recursively before serialization, so two
/// parameter sets that differ only in field order share a key.
pub fn cache_key<P: Serialize + ?Sized>(operation: &str, params: &P) -> String {
    let value = serde_json::to_value(params).unwrap_or(serde_json::Value::Null);
    format!("{}:{}", operation, SortedJson(&value))
}

/// Serializes objects with keys in sorted order regardless of how the
/// underlying map iterates.
struct SortedJson<'a>(&'a serde_json::Value);

impl Serialize for SortedJson<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};
        match self.0 {
            serde_json::Value::Object(map) => {
                let mut pairs: Vec<(&String, &serde_json::Value)> = map.iter().collect();
                pairs.sort_by(|a, b| a.0.cmp(b.0));
                let mut out = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    out.serialize_entry(key, &SortedJson(value))?;
                }
                out.end()
            }
            serde_json::Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    out.serialize_element(&SortedJson(item))?;
                }
                out.end()
            }
            other => other.serialize(serializer),
        }
    }
}

impl std::fmt::Display for SortedJson<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = serde_json::to_string(self).map_err(|_| std::fmt::Error)?;
        f.write_str(&text)
    }
}
