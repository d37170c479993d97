//! 2Q LRU Pool
//!
//! Bounded map with the two-queue replacement policy: new keys enter a small
//! `recent` queue; a key touched again while in `recent` (or shortly after
//! being evicted from it, tracked by the `ghost` key queue) is promoted into
//! the `frequent` queue. Scans of one-off keys therefore cannot flush the
//! frequently used working set.
//!
//! The pool synchronizes itself; callers never add locking.

use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

/// Share of the capacity reserved for keys seen once
const RECENT_RATIO: f64 = 0.25;
/// Size of the ghost queue relative to the capacity
const GHOST_RATIO: f64 = 0.50;

struct Queues<K: Hash + Eq, V> {
    recent: LruCache<K, V>,
    frequent: LruCache<K, V>,
    ghost: LruCache<K, ()>,
}

/// Thread-safe 2Q cache
pub struct TwoQueueCache<K: Hash + Eq, V> {
    size: usize,
    recent_size: usize,
    queues: Mutex<Queues<K, V>>,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn ratio_of(size: NonZeroUsize, ratio: f64) -> usize {
    (size.get() as f64 * ratio) as usize
}

impl<K: Hash + Eq + Clone, V: Clone> TwoQueueCache<K, V> {
    pub fn new(size: NonZeroUsize) -> Self {
        let ghost_size = NonZeroUsize::new(ratio_of(size, GHOST_RATIO)).unwrap_or(NonZeroUsize::MIN);
        Self {
            size: size.get(),
            recent_size: ratio_of(size, RECENT_RATIO),
            queues: Mutex::new(Queues {
                recent: LruCache::new(size),
                frequent: LruCache::new(size),
                ghost: LruCache::new(ghost_size),
            }),
        }
    }

    /// Look up a key, promoting it to the frequent queue
    pub fn get(&self, key: &K) -> Option<V> {
        let mut q = self.queues.lock();
        if let Some(value) = q.frequent.get(key) {
            return Some(value.clone());
        }
        let value = q.recent.pop(key)?;
        q.frequent.put(key.clone(), value.clone());
        Some(value)
    }

    /// Look up a key without touching recency
    pub fn peek(&self, key: &K) -> Option<V> {
        let q = self.queues.lock();
        q.frequent.peek(key).or_else(|| q.recent.peek(key)).cloned()
    }

    /// Insert or replace a value
    pub fn add(&self, key: K, value: V) {
        let mut q = self.queues.lock();

        if q.frequent.contains(&key) {
            q.frequent.put(key, value);
            return;
        }
        if q.recent.pop(&key).is_some() {
            q.frequent.put(key, value);
            return;
        }
        if q.ghost.contains(&key) {
            self.ensure_space(&mut q, true);
            q.ghost.pop(&key);
            q.frequent.put(key, value);
            return;
        }

        self.ensure_space(&mut q, false);
        q.recent.put(key, value);
    }

    fn ensure_space(&self, q: &mut Queues<K, V>, ghost_hit: bool) {
        let recent_len = q.recent.len();
        if recent_len + q.frequent.len() < self.size {
            return;
        }

        if recent_len > 0
            && (recent_len > self.recent_size || (recent_len == self.recent_size && !ghost_hit))
        {
            if let Some((key, _)) = q.recent.pop_lru() {
                q.ghost.put(key, ());
            }
            return;
        }

        q.frequent.pop_lru();
    }

    /// Remove a key from every queue
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut q = self.queues.lock();
        q.ghost.pop(key);
        let frequent = q.frequent.pop(key);
        let recent = q.recent.pop(key);
        frequent.or(recent)
    }

    /// Keys currently resident, frequent queue first, oldest first
    pub fn keys(&self) -> Vec<K> {
        let q = self.queues.lock();
        let mut keys: Vec<K> = Vec::with_capacity(q.frequent.len() + q.recent.len());
        keys.extend(q.frequent.iter().rev().map(|(k, _)| k.clone()));
        keys.extend(q.recent.iter().rev().map(|(k, _)| k.clone()));
        keys
    }

    pub fn len(&self) -> usize {
        let q = self.queues.lock();
        q.frequent.len() + q.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop everything, including ghost keys
    pub fn purge(&self) {
        let mut q = self.queues.lock();
        q.recent.clear();
        q.frequent.clear();
        q.ghost.clear();
    }
}
