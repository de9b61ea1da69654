// SPDX-License-Identifier: LGPL-3.0-only
//! In-memory storage for rendered codes.

use crate::code::key::LoadKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Keyed store for rendered codes.
///
/// Implementations are shared between loaders and written from render
/// workers, so they must be safe to use from any thread.
pub trait CodeCache<T>: Send + Sync {
    /// Get a cached image.
    fn get(&self, key: &LoadKey) -> Option<T>;

    /// Store an image.
    fn put(&self, key: LoadKey, image: T);

    /// Check if an image is cached.
    fn contains(&self, key: &LoadKey) -> bool {
        self.get(key).is_some()
    }
}

/// Unbounded in-memory cache.
///
/// Keys are content digests, so entries never go stale and nothing is
/// evicted. Create one per session and hand clones of the [Arc] to every
/// loader that should share it.
pub struct HashMapCache<T> {
    cache: Mutex<HashMap<LoadKey, T>>,
}

impl<T> HashMapCache<T> {
    /// Create a new, empty cache.
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Create a new cache already wrapped for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Get cache size (number of cached images).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clear the cache.
    pub fn clear(&self) {
        self.lock().clear();
    }

    // Entries are written whole, so a panic elsewhere cannot leave the map torn.
    fn lock(&self) -> MutexGuard<'_, HashMap<LoadKey, T>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone + Send> CodeCache<T> for HashMapCache<T> {
    fn get(&self, key: &LoadKey) -> Option<T> {
        self.lock().get(key).cloned()
    }

    fn put(&self, key: LoadKey, image: T) {
        self.lock().insert(key, image);
    }

    fn contains(&self, key: &LoadKey) -> bool {
        self.lock().contains_key(key)
    }
}

impl<T> Default for HashMapCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::key::key_for;
    use std::thread;

    #[test]
    fn put_then_get() {
        let cache = HashMapCache::new();
        let key = key_for("foo");

        assert!(!cache.contains(&key));
        assert_eq!(cache.get(&key), None::<u32>);

        cache.put(key.clone(), 7);
        assert!(cache.contains(&key));
        assert_eq!(cache.get(&key), Some(7));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn shared_across_threads() {
        let cache: Arc<HashMapCache<usize>> = HashMapCache::shared();

        let workers: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                thread::spawn(move || cache.put(key_for(&i.to_string()), i))
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(cache.len(), 8);
        assert_eq!(cache.get(&key_for("5")), Some(5));
    }
}
