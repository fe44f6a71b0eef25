// Query cache (in-memory, TTL-based) with per-handle spacing and a global call budget

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a stored result is served without calling the backend
    pub ttl: Duration,
    /// Minimum gap between two backend calls from the same handle
    pub min_interval: Duration,
    /// Backend calls allowed per `window` across the whole process
    pub max_calls_per_window: usize,
    pub window: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            min_interval: Duration::from_secs(1),
            max_calls_per_window: 60,
            window: Duration::from_secs(60),
        }
    }
}

/// Cached response with the instant it was stored
#[derive(Debug, Clone)]
struct CachedResponse {
    data: Vec<u8>,
    cached_at: Instant,
}

/// Process-wide store of query results plus the global rate window
///
/// Construct once and share by `Arc`; hand out [`QueryHandle`]s per caller.
pub struct QueryCache {
    store: RwLock<HashMap<String, CachedResponse>>,
    calls: Mutex<VecDeque<Instant>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
}

impl QueryCache {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            calls: Mutex::new(VecDeque::new()),
            config,
            clock,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default(), Arc::new(SystemClock))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Handle for one caller issuing one query shape
    pub fn handle(self: &Arc<Self>, operation: &str, deps: &impl Serialize) -> Result<QueryHandle> {
        Ok(QueryHandle {
            cache: Arc::clone(self),
            key: QueryKey::new(operation, deps)?,
            last_call: Mutex::new(None),
            bypass_throttle: false,
            skip_cache: false,
        })
    }

    /// Get cached bytes (if not expired)
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = self.clock.instant();
        let store = self.store.read().ok()?;
        let cached = store.get(key)?;

        if self.is_expired(cached, now) {
            drop(store);
            self.invalidate(key);
            return None;
        }

        Some(cached.data.clone())
    }

    pub fn set(&self, key: String, data: Vec<u8>) {
        let cached_at = self.clock.instant();
        if let Ok(mut store) = self.store.write() {
            store.insert(key, CachedResponse { data, cached_at });
        }
    }

    /// Remove specific entry
    pub fn invalidate(&self, key: &str) {
        if let Ok(mut store) = self.store.write() {
            store.remove(key);
        }
    }

    /// Remove every entry produced by one operation
    pub fn invalidate_operation(&self, operation: &str) {
        let prefix = format!("{}:", operation);
        if let Ok(mut store) = self.store.write() {
            store.retain(|key, _| !key.starts_with(&prefix));
        }
    }

    /// Clear all entries
    pub fn clear(&self) {
        if let Ok(mut store) = self.store.write() {
            store.clear();
        }
    }

    /// Remove expired entries (periodic cleanup)
    pub fn cleanup_expired(&self) {
        let now = self.clock.instant();
        if let Ok(mut store) = self.store.write() {
            store.retain(|_, v| !self.is_expired(v, now));
        }
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.instant();
        let calls_in_window = self.calls_in_window(now);

        if let Ok(store) = self.store.read() {
            let total = store.len();
            let expired = store.values().filter(|v| self.is_expired(v, now)).count();

            CacheStats {
                total_entries: total,
                expired_entries: expired,
                active_entries: total - expired,
                calls_in_window,
            }
        } else {
            CacheStats::default()
        }
    }

    fn is_expired(&self, cached: &CachedResponse, now: Instant) -> bool {
        now.saturating_duration_since(cached.cached_at) >= self.config.ttl
    }

    fn prune(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = calls.front() {
            if now.saturating_duration_since(*oldest) >= self.config.window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    fn calls_in_window(&self, now: Instant) -> usize {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut calls, now);
        calls.len()
    }

    /// Take one slot from the global budget, if any is left
    fn try_acquire(&self, now: Instant) -> bool {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut calls, now);
        if calls.len() >= self.config.max_calls_per_window {
            return false;
        }
        calls.push_back(now);
        true
    }

    /// Count a call that skipped the budget check
    fn record_call(&self, now: Instant) {
        let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
        self.prune(&mut calls, now);
        calls.push_back(now);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
    pub calls_in_window: usize,
}

/// Operation name plus a hash of the operation and its dependencies
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    operation: String,
    key: String,
}

impl QueryKey {
    pub fn new(operation: &str, deps: &impl Serialize) -> Result<Self> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let deps = serde_json::to_vec(deps)?;
        let mut hasher = DefaultHasher::new();
        operation.hash(&mut hasher);
        deps.hash(&mut hasher);

        Ok(Self {
            operation: operation.to_string(),
            key: format!("{}:{:x}", operation, hasher.finish()),
        })
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

/// What a [`QueryHandle::fetch`] produced
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    /// Backend was called
    Fetched(T),
    /// Served from the cache without a backend call
    Cached(T),
    /// Refused by the spacing or global limit; nothing was called
    Throttled,
}

impl<T> FetchOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Fetched(v) | Self::Cached(v) => Some(v),
            Self::Throttled => None,
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled)
    }
}

/// One caller's view of a cached query
pub struct QueryHandle {
    cache: Arc<QueryCache>,
    key: QueryKey,
    last_call: Mutex<Option<Instant>>,
    bypass_throttle: bool,
    skip_cache: bool,
}

impl QueryHandle {
    /// Never refuse a call for spacing or budget reasons
    pub fn bypass_throttle(mut self) -> Self {
        self.bypass_throttle = true;
        self
    }

    /// Always go to the backend (results are still stored)
    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Raw cached bytes for this key, if fresh
    pub fn cached_bytes(&self) -> Option<Vec<u8>> {
        self.cache.get(self.key.as_str())
    }

    /// Serve from cache when fresh, otherwise call `f` subject to the limits
    pub async fn fetch<T, F, Fut>(&self, f: F) -> Result<FetchOutcome<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.skip_cache {
            if let Some(value) = self.cached_value::<T>() {
                tracing::debug!(key = self.key.as_str(), "query cache hit");
                return Ok(FetchOutcome::Cached(value));
            }
        }

        let now = self.cache.clock.instant();
        if self.bypass_throttle {
            self.cache.record_call(now);
        } else {
            if let Some(last) = self.last_call() {
                if now.saturating_duration_since(last) < self.cache.config.min_interval {
                    tracing::debug!(key = self.key.as_str(), "query throttled by handle spacing");
                    return Ok(FetchOutcome::Throttled);
                }
            }
            if !self.cache.try_acquire(now) {
                tracing::warn!(
                    key = self.key.as_str(),
                    limit = self.cache.config.max_calls_per_window,
                    "global query budget exhausted"
                );
                return Ok(FetchOutcome::Throttled);
            }
        }
        self.set_last_call(now);

        let value = f().await?;
        self.store(&value)?;
        Ok(FetchOutcome::Fetched(value))
    }

    /// Cache when fresh, otherwise call `f` ignoring the limits
    pub async fn load<T, F, Fut>(&self, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.cached_value::<T>() {
            return Ok(value);
        }
        self.refetch(f).await
    }

    /// Call the backend now, bypassing cache and limits, and store the result
    pub async fn refetch<T, F, Fut>(&self, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let now = self.cache.clock.instant();
        self.cache.record_call(now);
        self.set_last_call(now);

        let value = f().await?;
        self.store(&value)?;
        Ok(value)
    }

    fn cached_value<T: DeserializeOwned>(&self) -> Option<T> {
        let bytes = self.cache.get(self.key.as_str())?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = self.key.as_str(), error = %e, "dropping undecodable cache entry");
                self.cache.invalidate(self.key.as_str());
                None
            }
        }
    }

    fn store<T: Serialize>(&self, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.cache.set(self.key.as_str().to_string(), bytes);
        Ok(())
    }

    fn last_call(&self) -> Option<Instant> {
        *self.last_call.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_last_call(&self, at: Instant) {
        *self.last_call.lock().unwrap_or_else(|e| e.into_inner()) = Some(at);
    }
}

#[derive(Debug, Default, Clone)]
struct MutationState {
    is_loading: bool,
    last_error: Option<String>,
}

/// Uncached write wrapper that remembers loading and error state
pub struct Mutation {
    cache: Arc<QueryCache>,
    invalidates: Vec<String>,
    state: Mutex<MutationState>,
}

impl Mutation {
    pub fn new(cache: Arc<QueryCache>) -> Self {
        Self {
            cache,
            invalidates: Vec::new(),
            state: Mutex::new(MutationState::default()),
        }
    }

    /// Drop cached results of `operation` after every successful run
    pub fn invalidates(mut self, operation: impl Into<String>) -> Self {
        self.invalidates.push(operation.into());
        self
    }

    pub async fn run<T, Fut>(&self, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        self.set_state(true, None);

        let result = fut.await;
        match &result {
            Ok(_) => {
                for operation in &self.invalidates {
                    self.cache.invalidate_operation(operation);
                }
                self.set_state(false, None);
            }
            Err(e) => self.set_state(false, Some(e.to_string())),
        }
        result
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().map(|s| s.is_loading).unwrap_or(false)
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.last_error.clone())
    }

    fn set_state(&self, is_loading: bool, last_error: Option<String>) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.is_loading = is_loading;
        state.last_error = last_error;
    }
}
