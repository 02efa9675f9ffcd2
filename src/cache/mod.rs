//! Response caching for GET endpoints.
//!
//! # Responsibilities
//! - Store normalized responses keyed by a request fingerprint
//! - Serve non-expired entries without re-invoking the handler
//!
//! # Design Decisions
//! - Keys combine identity-or-client, path, query string, and validated
//!   data, so two users never share an entry
//! - Expiry is checked on read; expired entries are removed lazily plus an
//!   explicit purge for housekeeping
//! - In-process only; multi-process deployments delegate to an external
//!   store with native expiry

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::http::RequestContext;

/// Captured parts of a cacheable response.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

struct Entry {
    expires: Instant,
    value: CachedResponse,
}

/// Shared response cache.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, Entry>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a non-expired entry; expired entries are dropped on the way.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let hit = {
            let entry = self.entries.get(key)?;
            if entry.expires <= Instant::now() {
                None
            } else {
                Some(entry.value.clone())
            }
        };
        if hit.is_none() {
            self.entries.remove(key);
        }
        hit
    }

    pub fn insert(&self, key: String, value: CachedResponse, ttl: Duration) {
        self.entries.insert(
            key,
            Entry {
                expires: Instant::now() + ttl,
                value,
            },
        );
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fingerprint for cache lookup and population.
pub fn response_cache_key(ctx: &RequestContext) -> String {
    let mut hasher = DefaultHasher::new();
    ctx.query().hash(&mut hasher);
    if let Some(validated) = ctx.validated() {
        validated.to_string().hash(&mut hasher);
    }
    format!(
        "{}-{}-{:x}",
        ctx.fingerprint_identity(),
        ctx.path(),
        hasher.finish()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::{HeaderMap, Method};

    fn cached(body: &[u8]) -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: BTreeMap::new(),
            body: body.to_vec(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip() {
        let cache = ResponseCache::new();
        cache.insert("k".into(), cached(b"payload"), Duration::from_secs(10));
        assert_eq!(cache.get("k").unwrap().body, b"payload");
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry() {
        let cache = ResponseCache::new();
        cache.insert("k".into(), cached(b"payload"), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.get("k").is_none());
        assert!(cache.is_empty(), "expired entry is dropped on read");
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = ResponseCache::new();
        cache.insert("old".into(), cached(b"a"), Duration::from_secs(5));
        cache.insert("new".into(), cached(b"b"), Duration::from_secs(50));

        tokio::time::advance(Duration::from_secs(10)).await;
        cache.purge_expired();
        assert_eq!(cache.len(), 1);
        assert!(cache.get("new").is_some());
    }

    #[test]
    fn test_fingerprint_varies_by_identity_path_and_query() {
        let base = RequestContext::new(
            Method::GET,
            "user/",
            HeaderMap::new(),
            "page=1",
            Bytes::new(),
            Some("10.0.0.1:80".parse().unwrap()),
        );
        let other_query = RequestContext::new(
            Method::GET,
            "user/",
            HeaderMap::new(),
            "page=2",
            Bytes::new(),
            Some("10.0.0.1:80".parse().unwrap()),
        );
        let other_client = RequestContext::new(
            Method::GET,
            "user/",
            HeaderMap::new(),
            "page=1",
            Bytes::new(),
            Some("10.0.0.2:80".parse().unwrap()),
        );
        let key = response_cache_key(&base);
        assert_ne!(key, response_cache_key(&other_query));
        assert_ne!(key, response_cache_key(&other_client));
        assert_eq!(key, response_cache_key(&base));
    }
}
