//! TTL caching for chain facts.
//!
//! A small bounded key→value cache with per-entry expiry. Expired entries
//! are evicted lazily on read; inserting at capacity evicts the oldest
//! entry by insertion order. Instances are constructed once at process
//! start and passed by dependency injection into the quote engine and the
//! smart account resolver.

use crate::{
    constants::{ACCOUNT_FACTS_TTL, ALLOWANCE_TTL, DEFAULT_CACHE_CAPACITY, TOKEN_FACTS_TTL},
    types::{SmartAccountFact, TokenFacts},
};
use alloy::primitives::{Address, U256};
use std::{
    collections::{HashMap, VecDeque},
    hash::Hash,
    sync::Mutex,
    time::Duration,
};
use tokio::time::Instant;
use tracing::trace;

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

struct Inner<K, V> {
    map: HashMap<K, Entry<V>>,
    // Insertion order, for oldest-first eviction. May contain keys that
    // were since removed; they are skipped during eviction.
    order: VecDeque<K>,
}

/// A bounded TTL cache.
///
/// Synchronized with a plain mutex: every operation is a short map access,
/// and nothing is awaited while the lock is held.
pub struct TtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    ttl: Duration,
    capacity: usize,
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries, each valid for
    /// `ttl` after insertion.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            inner: Mutex::new(Inner { map: HashMap::new(), order: VecDeque::new() }),
            ttl,
            capacity,
        }
    }

    /// Returns the cached value for `key`, or `None` if absent or expired.
    /// An expired entry is removed on this read.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        match inner.map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => {}
            None => return None,
        }
        inner.map.remove(key);
        None
    }

    /// Inserts `value` under `key`, evicting the oldest entry first when at
    /// capacity.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        if inner.map.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        } else if inner.map.len() >= self.capacity {
            while let Some(oldest) = inner.order.pop_front() {
                if inner.map.remove(&oldest).is_some() {
                    trace!("cache at capacity, evicted oldest entry");
                    break;
                }
            }
        }
        let expires_at = Instant::now() + self.ttl;
        inner.map.insert(key.clone(), Entry { value, expires_at });
        inner.order.push_back(key);
    }

    /// Drops all entries.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.map.clear();
        inner.order.clear();
    }

    /// Number of live-or-expired entries currently held.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").map.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Key for token fact entries.
pub type TokenKey = (u64, Address);

/// Key for smart account entries: `(rpc_url, factory, owner)`.
pub type AccountKey = (String, Address, Address);

/// Key for allowance probes: `(token, owner, spender)`.
pub type AllowanceKey = (Address, Address, Address);

/// The caches shared across the quote engine and resolvers.
///
/// Constructed once at process start; explicitly injected rather than held
/// in module-level globals so tests can swap them out.
#[derive(Debug)]
pub struct RelayCaches {
    /// Token decimals and USD price, 24h TTL.
    pub token_facts: TtlCache<TokenKey, TokenFacts>,
    /// Smart account address and deployment state, seconds-scale TTL.
    pub accounts: TtlCache<AccountKey, SmartAccountFact>,
    /// ERC-20 allowance probes, seconds-scale TTL.
    pub allowances: TtlCache<AllowanceKey, U256>,
}

impl RelayCaches {
    /// Creates the cache set with default TTLs and capacities.
    pub fn new() -> Self {
        Self {
            token_facts: TtlCache::new(TOKEN_FACTS_TTL, DEFAULT_CACHE_CAPACITY),
            accounts: TtlCache::new(ACCOUNT_FACTS_TTL, DEFAULT_CACHE_CAPACITY),
            allowances: TtlCache::new(ALLOWANCE_TTL, DEFAULT_CACHE_CAPACITY),
        }
    }
}

impl Default for RelayCaches {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache: TtlCache<&str, u64> = TtlCache::new(Duration::from_millis(100), 8);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(cache.get(&"a"), None);
        // The expired entry was evicted by the read.
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_evicts_oldest() {
        let cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_secs(60), 2);
        cache.insert(1, 10);
        cache.insert(2, 20);
        cache.insert(3, 30);

        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.get(&2), Some(20));
        assert_eq!(cache.get(&3), Some(30));
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_refreshes_expiry_and_order() {
        let cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_millis(100), 2);
        cache.insert(1, 10);
        tokio::time::advance(Duration::from_millis(60)).await;
        cache.insert(1, 11);
        tokio::time::advance(Duration::from_millis(60)).await;
        // 120ms since first insert, 60ms since refresh.
        assert_eq!(cache.get(&1), Some(11));

        // After the refresh, key 1 is the newest entry, so inserting two
        // more evicts key 2 first.
        cache.insert(2, 20);
        cache.insert(3, 30);
        assert_eq!(cache.get(&2), Some(20));
        assert_eq!(cache.get(&3), Some(30));
        assert_eq!(cache.get(&1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_empties_the_cache() {
        let cache: TtlCache<u32, u32> = TtlCache::new(Duration::from_secs(60), 4);
        cache.insert(1, 10);
        cache.insert(2, 20);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&1), None);
    }
}
