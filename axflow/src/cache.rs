//! Short-lived memoization of element resolution.
//!
//! Two independent caches keyed by [`Locator::cache_key`](crate::Locator::cache_key):
//! resolved nodes (short TTL) and the child-index path that last led to a
//! match (longer TTL, always re-validated by the searcher before use).

use crate::element::UIElement;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// A map with per-entry expiry behind one lock.
#[derive(Debug)]
pub struct TtlCache<V: Clone> {
    ttl: Duration,
    entries: Mutex<HashMap<u64, (V, Instant)>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<u64, (V, Instant)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: u64) -> Option<V> {
        self.get_at(key, Instant::now())
    }

    /// Lookup as of `now`; an expired entry is evicted and reported as a miss.
    pub fn get_at(&self, key: u64, now: Instant) -> Option<V> {
        let mut entries = self.entries();
        let (value, stored) = entries.get(&key)?.clone();
        if now.saturating_duration_since(stored) < self.ttl {
            Some(value)
        } else {
            entries.remove(&key);
            None
        }
    }

    pub fn put(&self, key: u64, value: V) {
        self.put_at(key, value, Instant::now());
    }

    pub fn put_at(&self, key: u64, value: V, now: Instant) {
        self.entries().insert(key, (value, now));
    }

    pub fn remove(&self, key: u64) {
        self.entries().remove(&key);
    }

    pub fn invalidate_all(&self) {
        self.entries().clear();
    }

    pub fn evict_expired(&self) -> usize {
        self.evict_expired_at(Instant::now())
    }

    /// Sweep entries expired as of `now`; returns how many were dropped.
    pub fn evict_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, (_, stored)| now.saturating_duration_since(*stored) < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Index path from a search root to a node.
pub type PathHint = Vec<usize>;

/// The node cache and the path-hint cache, owned by whoever composes the system.
#[derive(Debug)]
pub struct ResolutionCache {
    pub nodes: TtlCache<UIElement>,
    pub path_hints: TtlCache<PathHint>,
}

impl ResolutionCache {
    pub fn new(node_ttl: Duration, path_hint_ttl: Duration) -> Self {
        Self {
            nodes: TtlCache::new(node_ttl),
            path_hints: TtlCache::new(path_hint_ttl),
        }
    }

    pub fn invalidate_all(&self) {
        self.nodes.invalidate_all();
        self.path_hints.invalidate_all();
        debug!("resolution caches cleared");
    }

    pub fn evict_expired(&self) -> usize {
        self.nodes.evict_expired() + self.path_hints.evict_expired()
    }
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(10))
    }
}
