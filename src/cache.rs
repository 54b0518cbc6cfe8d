//! TTL cache of source results keyed by `(query, source)`.
//!
//! This is an optimization cache, not a single-flight lock: two concurrent
//! misses for the same key both fetch, and the later `put` wins. Entries
//! expire purely by age, checked on every read.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::models::RawResult;

struct CacheEntry {
    results: Vec<RawResult>,
    inserted_at: Instant,
}

pub struct ResultCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

/// SHA-256 hex digest of `query` and `source`.
pub fn cache_key(query: &str, source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    hasher.update([0x1f]);
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, query: &str, source: &str) -> Option<Vec<RawResult>> {
        self.get_at(query, source, Instant::now())
    }

    pub fn put(&self, query: &str, source: &str, results: Vec<RawResult>) {
        self.put_at(query, source, results, Instant::now())
    }

    /// Lookup as of `now`. A hit requires `now - inserted_at < ttl`.
    pub fn get_at(&self, query: &str, source: &str, now: Instant) -> Option<Vec<RawResult>> {
        let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
        let entry = entries.get(&cache_key(query, source))?;
        if now.saturating_duration_since(entry.inserted_at) < self.ttl {
            Some(entry.results.clone())
        } else {
            None
        }
    }

    pub fn put_at(&self, query: &str, source: &str, results: Vec<RawResult>, now: Instant) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.insert(
            cache_key(query, source),
            CacheEntry {
                results,
                inserted_at: now,
            },
        );
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    fn hit(url: &str) -> RawResult {
        RawResult::new("t", url, "s", "Google", SourceKind::GenericSearch, 1)
    }

    #[test]
    fn hit_just_before_ttl_and_miss_just_after() {
        let cache = ResultCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        let eps = Duration::from_millis(1);
        cache.put_at("\"a@b.com\"", "Google", vec![hit("https://x.com")], t0);

        let before = cache.get_at("\"a@b.com\"", "Google", t0 + Duration::from_secs(60) - eps);
        assert_eq!(before.map(|r| r.len()), Some(1));
        assert!(cache
            .get_at("\"a@b.com\"", "Google", t0 + Duration::from_secs(60) + eps)
            .is_none());
    }

    #[test]
    fn key_separates_query_and_source() {
        assert_ne!(cache_key("ab", "c"), cache_key("a", "bc"));
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.put("q", "Google", vec![hit("https://x.com")]);
        assert!(cache.get("q", "Bing").is_none());
        assert!(cache.get("q", "Google").is_some());
        assert_eq!(cache.len(), 1);
    }
}
