//! TTL cache in front of a secret backend.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use guardette_telemetry::record_secret_fetch;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::{SecretStore, SecretsResolver};
use crate::error::GatewayResult;
use crate::BoxFuture;

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that went to the backend.
    pub misses: u64,
    /// Successful backend fetches.
    pub fetches: u64,
    /// Entries currently held (expired ones included until next access).
    pub size: usize,
}

/// Serves secrets from memory until their TTL elapses.
///
/// Expired entries are evicted on the next lookup of the same key. The lock
/// is released before the backend is awaited, so concurrent lookups of an
/// expired key may each fetch; the last write wins.
#[derive(Debug)]
pub struct CachingSecretsResolver<S> {
    store: S,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
}

impl<S: SecretStore> CachingSecretsResolver<S> {
    /// Create a cache over `store` applying `ttl` to every entry.
    pub fn new(store: S, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            fetches: AtomicU64::new(0),
        }
    }

    /// The wrapped backend.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Drops the cached value for `key`.
    pub fn invalidate(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    /// Drops every cached value.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            size: self.entries.lock().len(),
        }
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }
}

impl<S: SecretStore> SecretsResolver for CachingSecretsResolver<S> {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, GatewayResult<String>> {
        Box::pin(async move {
            if let Some(value) = self.lookup(key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key, "secret cache hit");
                return Ok(value);
            }

            self.misses.fetch_add(1, Ordering::Relaxed);
            tracing::info!(key, "fetching secret from backend");

            let result = self.store.fetch(key).await;
            record_secret_fetch(result.is_ok());
            let value = result?;

            self.fetches.fetch_add(1, Ordering::Relaxed);
            self.entries.lock().insert(
                key.to_string(),
                CacheEntry {
                    value: value.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
            Ok(value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    impl SecretStore for CountingStore {
        fn fetch<'a>(&'a self, key: &'a str) -> BoxFuture<'a, GatewayResult<String>> {
            Box::pin(async move {
                let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
                if key == "BROKEN" {
                    return Err(GatewayError::secrets_retrieval(
                        "Error fetching secret from AWS for BROKEN",
                        "AccessDenied",
                    ));
                }
                Ok(format!("{key}-v{n}"))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let cache = CachingSecretsResolver::new(CountingStore::default(), Duration::from_secs(60));

        let first = cache.get("CLIENT_SECRET").await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        let second = cache.get("CLIENT_SECRET").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.store().calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                fetches: 1,
                size: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_after_expiry() {
        let cache = CachingSecretsResolver::new(CountingStore::default(), Duration::from_secs(60));

        assert_eq!(cache.get("K").await.unwrap(), "K-v1");
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("K").await.unwrap(), "K-v2");
        assert_eq!(cache.get("K").await.unwrap(), "K-v2");

        assert_eq!(cache.store().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = CachingSecretsResolver::new(CountingStore::default(), Duration::from_secs(60));

        cache.get("K").await.unwrap();
        cache.invalidate("K");
        assert_eq!(cache.get("K").await.unwrap(), "K-v2");

        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test]
    async fn test_backend_failure_not_cached() {
        let cache = CachingSecretsResolver::new(CountingStore::default(), Duration::from_secs(60));

        let err = cache.get("BROKEN").await.unwrap_err();
        assert_eq!(err.category(), "secrets_retrieval");
        assert!(cache.get("BROKEN").await.is_err());

        assert_eq!(cache.store().calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().fetches, 0);
    }
}
