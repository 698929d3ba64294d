//! Size-bounded key cache with single-flight creation and FIFO eviction.
//!
//! The map and the creation-order queue live under one lock; the factory
//! (SM4 generation + SM2 wrap) runs inside the write critical section so a
//! missing key is materialized exactly once no matter how many threads race
//! for it, and every racer observes the same `KeyInfo`.
//!
//! Eviction is elected through a non-blocking flag: the thread that wins
//! the flag drains from the queue head down to
//! `⌊capacity · (1 − buffer_ratio)⌋`; losers skip and retry on their next
//! insert. Size may briefly overshoot capacity, which is what the buffer
//! is for.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use securelog_core::{SecureLogError, SecureLogResult};

use crate::SM4_KEY_LEN;

/// An SM4 key together with its SM2-wrapped form. The pair is produced in
/// one step and never mutated, so concurrent readers always see matching
/// halves.
#[derive(Debug, Clone)]
pub struct KeyInfo {
    pub sm4_key: [u8; SM4_KEY_LEN],
    pub sm2_wrapped_key: Vec<u8>,
    pub created_at_ms: i64,
}

struct CacheInner {
    map: HashMap<String, Arc<KeyInfo>>,
    queue: VecDeque<String>,
}

pub struct KeyCache {
    name: &'static str,
    inner: RwLock<CacheInner>,
    capacity: AtomicUsize,
    buffer_ratio: f64,
    evicting: AtomicBool,
    created: AtomicU64,
}

impl KeyCache {
    pub fn new(name: &'static str, capacity: usize, buffer_ratio: f64) -> Self {
        Self {
            name,
            inner: RwLock::new(CacheInner { map: HashMap::new(), queue: VecDeque::new() }),
            capacity: AtomicUsize::new(capacity.max(1)),
            buffer_ratio: buffer_ratio.clamp(0.0, 1.0),
            evicting: AtomicBool::new(false),
            created: AtomicU64::new(0),
        }
    }

    /// Fetch the `KeyInfo` for `cache_key`, running `factory` at most once
    /// per missing key. A factory error is propagated and nothing is
    /// inserted.
    pub fn get_or_create<F>(&self, cache_key: &str, factory: F) -> SecureLogResult<Arc<KeyInfo>>
    where
        F: FnOnce() -> SecureLogResult<KeyInfo>,
    {
        if let Some(existing) = self.inner.read().map.get(cache_key) {
            return Ok(existing.clone());
        }

        let info = {
            let mut inner = self.inner.write();
            if let Some(existing) = inner.map.get(cache_key) {
                return Ok(existing.clone());
            }
            let info = Arc::new(factory()?);
            inner.map.insert(cache_key.to_string(), info.clone());
            inner.queue.push_back(cache_key.to_string());
            info
        };
        self.created.fetch_add(1, Ordering::Relaxed);

        if self.len() >= self.capacity() {
            self.evict_oldest();
        }
        Ok(info)
    }

    /// Drain from the queue head to the buffered target size. Only one
    /// thread evicts at a time; everyone else skips.
    fn evict_oldest(&self) {
        if self
            .evicting
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }
        let target = self.target_size();
        let mut evicted = 0usize;
        {
            let mut inner = self.inner.write();
            while inner.map.len() > target {
                match inner.queue.pop_front() {
                    // the queue may name entries already gone; removal tolerates that
                    Some(oldest) => {
                        if inner.map.remove(&oldest).is_some() {
                            evicted += 1;
                        }
                    }
                    None => break,
                }
            }
        }
        self.evicting.store(false, Ordering::Release);
        if evicted > 0 {
            debug!(cache = self.name, evicted, target, "Evicted oldest keys");
        }
    }

    fn target_size(&self) -> usize {
        (self.capacity() as f64 * (1.0 - self.buffer_ratio)).floor() as usize
    }

    /// Drain to the buffered target and drop queue entries whose map entry
    /// is already gone.
    pub fn clear_to_target(&self) {
        let target = self.target_size();
        let mut inner = self.inner.write();
        while inner.map.len() > target {
            match inner.queue.pop_front() {
                Some(oldest) => {
                    inner.map.remove(&oldest);
                }
                None => break,
            }
        }
        let map_keys: std::collections::HashSet<String> = inner.map.keys().cloned().collect();
        inner.queue.retain(|k| map_keys.contains(k));
    }

    pub fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Administrative resize. Sizes ≤ 0 are rejected.
    pub fn set_capacity(&self, capacity: usize) -> SecureLogResult<()> {
        if capacity == 0 {
            return Err(SecureLogError::Invariant(format!(
                "{} cache capacity must be positive",
                self.name
            )));
        }
        self.capacity.store(capacity, Ordering::Relaxed);
        Ok(())
    }

    /// Number of `KeyInfo` values ever created (factory successes).
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }
}
