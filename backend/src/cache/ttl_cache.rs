use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::models::CacheEntry;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Expiring key/value store shared by every read endpoint.
///
/// Stale entries are never evicted eagerly; `get` simply masks them until the
/// key is overwritten or the cache is cleared. All access goes through one
/// mutex, so a reader never observes a half-written entry. Two concurrent
/// misses on the same key both compute and the last `set` wins.
pub struct TtlCache<V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    // A panic while holding the lock cannot leave the map half-updated,
    // every mutation is a single HashMap call.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        self.lock()
            .get(key)
            .filter(|entry| entry.is_fresh(now, self.ttl))
            .map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry::new(value, self.clock.now());
        self.lock().insert(key.into(), entry);
    }

    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.offset.lock().unwrap() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn cache_with_clock() -> (TtlCache<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::with_clock(Duration::from_secs(60), clock.clone());
        (cache, clock)
    }

    #[test]
    fn returns_value_within_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.set("stats", "v1".to_string());
        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("stats").as_deref(), Some("v1"));
    }

    #[test]
    fn expired_entry_behaves_like_a_miss() {
        let (cache, clock) = cache_with_clock();
        cache.set("stats", "v1".to_string());
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get("stats"), None);
        // masked, not evicted
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_overwrites_and_resets_stored_at() {
        let (cache, clock) = cache_with_clock();
        cache.set("k", "old".to_string());
        clock.advance(Duration::from_secs(50));
        cache.set("k", "new".to_string());
        clock.advance(Duration::from_secs(50));
        assert_eq!(cache.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn clear_drops_every_entry() {
        let (cache, _clock) = cache_with_clock();
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.clear();
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn invalidate_only_touches_one_key() {
        let (cache, _clock) = cache_with_clock();
        cache.set("logs_100", "x".to_string());
        cache.set("logs_10", "y".to_string());
        cache.invalidate("logs_100");
        assert_eq!(cache.get("logs_100"), None);
        assert_eq!(cache.get("logs_10").as_deref(), Some("y"));
    }

    #[test]
    fn concurrent_writers_leave_a_consistent_map() {
        let cache = Arc::new(TtlCache::<usize>::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        cache.set(format!("key_{}", i % 10), worker * 1000 + i);
                        let _ = cache.get(&format!("key_{}", (i + 1) % 10));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 10);
        for i in 0..10 {
            let value = cache.get(&format!("key_{}", i)).unwrap();
            assert_eq!(value % 1000 % 10, i);
        }
    }
}
