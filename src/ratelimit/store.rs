//! Per-key state storage.
//!
//! Each limiter keeps its per-key records in a [`KeyStore`]. The closure passed
//! to [`KeyStore::with_entry`] runs while the key is exclusively held, so the
//! whole read-modify-write of an admission check is atomic for that key.

use std::num::NonZeroUsize;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;

pub(crate) enum KeyStore<S> {
    /// Sharded map that grows with the key space.
    Unbounded(DashMap<String, S>),
    /// Capacity-bounded map; the least recently used key is dropped on overflow.
    Bounded(Mutex<LruCache<String, S>>),
}

impl<S> KeyStore<S> {
    pub(crate) fn new(max_keys: Option<NonZeroUsize>) -> Self {
        match max_keys {
            Some(capacity) => KeyStore::Bounded(Mutex::new(LruCache::new(capacity))),
            None => KeyStore::Unbounded(DashMap::new()),
        }
    }

    /// Run `f` against the record for `key`, creating it with `init` first if
    /// the key is not tracked yet.
    pub(crate) fn with_entry<R>(
        &self,
        key: &str,
        init: impl FnOnce() -> S,
        f: impl FnOnce(&mut S) -> R,
    ) -> R {
        match self {
            KeyStore::Unbounded(map) => {
                if let Some(mut state) = map.get_mut(key) {
                    return f(state.value_mut());
                }

                // Another caller may have inserted between the lookup and here;
                // the entry guard settles it.
                match map.entry(key.to_owned()) {
                    Entry::Occupied(mut occupied) => f(occupied.get_mut()),
                    Entry::Vacant(vacant) => {
                        let mut state = vacant.insert(init());
                        f(state.value_mut())
                    }
                }
            }
            KeyStore::Bounded(cache) => {
                let mut cache = cache.lock();
                if let Some(state) = cache.get_mut(key) {
                    return f(state);
                }
                f(cache.get_or_insert_mut(key.to_owned(), init))
            }
        }
    }

    /// Inspect the record for `key` without creating it or touching recency.
    pub(crate) fn peek<R>(&self, key: &str, f: impl FnOnce(&S) -> R) -> Option<R> {
        match self {
            KeyStore::Unbounded(map) => map.get(key).map(|state| f(state.value())),
            KeyStore::Bounded(cache) => cache.lock().peek(key).map(f),
        }
    }

    /// Number of keys currently tracked.
    pub(crate) fn len(&self) -> usize {
        match self {
            KeyStore::Unbounded(map) => map.len(),
            KeyStore::Bounded(cache) => cache.lock().len(),
        }
    }
}
