use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;

use crate::fingerprint::Fingerprint;

/// Default number of cached responses when no capacity is configured.
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Bounded, recency-ordered store of synthesized audio keyed by request
/// fingerprint.
///
/// A `get` that hits marks the entry as most recently used; a `put` on a full
/// cache evicts the least recently used entry first. Entries never expire by
/// time. The cache is not internally synchronized; callers serialize access
/// (the server wraps it in a mutex).
pub struct ResponseCache {
    entries: LruCache<Fingerprint, Bytes>,
}

impl ResponseCache {
    /// Create a cache holding at most `capacity` entries. A zero capacity is
    /// clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn get(&mut self, key: &Fingerprint) -> Option<Bytes> {
        self.entries.get(key).cloned()
    }

    pub fn put(&mut self, key: Fingerprint, payload: Bytes) {
        self.entries.put(key, payload);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: usize) -> Fingerprint {
        Fingerprint::compute("model", &n.to_string())
    }

    fn payload(n: usize) -> Bytes {
        Bytes::from(format!("audio-{n}"))
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let mut cache = ResponseCache::new(3);
        for n in 0..10 {
            cache.put(key(n), payload(n));
            assert!(cache.len() <= 3);
        }
    }

    #[test]
    fn test_oldest_entry_is_evicted_first() {
        let mut cache = ResponseCache::new(3);
        for n in 0..4 {
            cache.put(key(n), payload(n));
        }
        assert!(cache.get(&key(0)).is_none());
        assert!(cache.get(&key(1)).is_some());
        assert!(cache.get(&key(3)).is_some());
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = ResponseCache::new(2);
        cache.put(key(0), payload(0));
        cache.put(key(1), payload(1));
        // Reading key 0 makes key 1 the eviction candidate.
        assert!(cache.get(&key(0)).is_some());
        cache.put(key(2), payload(2));
        assert!(cache.get(&key(0)).is_some());
        assert!(cache.get(&key(1)).is_none());
    }

    #[test]
    fn test_put_overwrites_existing_entry() {
        let mut cache = ResponseCache::new(2);
        cache.put(key(0), payload(0));
        cache.put(key(0), Bytes::from_static(b"rewritten"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key(0)).unwrap(), Bytes::from_static(b"rewritten"));
    }

    #[test]
    fn test_capacity_one() {
        let mut cache = ResponseCache::new(1);
        cache.put(key(0), payload(0));
        cache.put(key(1), payload(1));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key(0)).is_none());
        assert!(cache.get(&key(1)).is_some());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = ResponseCache::new(0);
        assert_eq!(cache.capacity(), 1);
    }
}
