//! Response caching for rendered API results.
//!
//! Keys are built by [`cache_key`] from the template name and the rendered
//! parameters, so two requests only share an entry when they would send the
//! same query.

use crate::registry::QueryParams;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub trait ResponseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn insert(&self, key: String, value: serde_json::Value);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, max_entries: 1_000, ttl_secs: 300 }
    }
}

/// Bounded in-memory cache with time-to-live eviction.
pub struct MokaResponseCache {
    inner: Cache<String, serde_json::Value>,
}

impl MokaResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();
        Self { inner }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl ResponseCache for MokaResponseCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let hit = self.inner.get(key);
        tracing::trace!(key, hit = hit.is_some(), "response cache lookup");
        hit
    }

    fn insert(&self, key: String, value: serde_json::Value) {
        self.inner.insert(key, value);
    }
}

/// Cache that never stores anything.
pub struct NoCache;

impl ResponseCache for NoCache {
    fn get(&self, _key: &str) -> Option<serde_json::Value> {
        None
    }

    fn insert(&self, _key: String, _value: serde_json::Value) {}
}

/// Pick the cache implementation for `config`.
pub fn from_config(config: &CacheConfig) -> Box<dyn ResponseCache> {
    if config.enabled && config.max_entries > 0 {
        Box::new(MokaResponseCache::new(config))
    } else {
        Box::new(NoCache)
    }
}

pub fn cache_key(kind: &str, template: &str, params: &QueryParams) -> String {
    let mut key = format!("{}:{}", kind, template);
    for (name, value) in params.iter() {
        key.push('|');
        key.push_str(name);
        key.push('=');
        key.push_str(value);
    }
    key
}
