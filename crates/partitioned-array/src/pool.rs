//! Bounded pool for recycling partition buffers.
//!
//! Creating arrays is the hottest path of the engine: every algorithm
//! produces brand new partitions. Instead of allocating a fresh `Vec` for
//! each of them, partitions hand their buffer back when they terminate
//! and new partitions pick one up from here.
//!
//! ## Design
//!
//! - **Tiered sizing**: buffers are kept per element type and power of two
//!   capacity tier, so a request is served by any buffer of its tier.
//! - **Bounded**: a tier holds at most `max_buffers_per_tier` buffers and
//!   the pool as a whole at most `max_pooled_bytes`. Anything beyond is
//!   dropped.
//! - **Short lock**: the mutex guards the free lists only. Buffers are
//!   moved out before they are used, so their contents are never touched
//!   under the lock.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::config::BufferPoolConfig;

/// Smallest capacity tier, in elements.
const MIN_TIER: usize = 64;

/// Capacity a buffer of `len` elements is allocated with.
pub fn optimal_capacity(len: usize) -> usize {
    len.max(MIN_TIER).next_power_of_two()
}

/// Tier a buffer with the given capacity is stored under.
fn tier_of_capacity(capacity: usize) -> usize {
    if capacity.is_power_of_two() {
        capacity
    } else {
        capacity.next_power_of_two() / 2
    }
}

/// Statistics for buffer pool usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Requests served from the pool.
    pub hits: u64,
    /// Requests that required a new allocation.
    pub misses: u64,
    /// Buffers returned and kept.
    pub recycled: u64,
    /// Buffers returned but dropped because a limit was reached.
    pub discarded: u64,
    /// Bytes currently held by idle buffers.
    pub pooled_bytes: u64,
}

impl PoolStats {
    /// Fraction of requests served without allocating.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type TierKey = (TypeId, usize);

struct FreeLists {
    tiers: HashMap<TierKey, Vec<Box<dyn Any + Send>>>,
    pooled_bytes: usize,
}

struct PoolInner {
    config: BufferPoolConfig,
    free: Mutex<FreeLists>,
    hits: AtomicU64,
    misses: AtomicU64,
    recycled: AtomicU64,
    discarded: AtomicU64,
}

/// Shared handle to a bounded buffer pool.
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

impl BufferPool {
    /// Create a new pool with the given limits.
    pub fn new(config: BufferPoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                free: Mutex::new(FreeLists {
                    tiers: HashMap::new(),
                    pooled_bytes: 0,
                }),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                recycled: AtomicU64::new(0),
                discarded: AtomicU64::new(0),
            }),
        }
    }

    /// Get an empty buffer able to hold at least `len` elements.
    pub fn acquire<T: Send + 'static>(&self, len: usize) -> Vec<T> {
        let tier = optimal_capacity(len);

        if self.inner.config.enabled {
            let reused = {
                let mut free = self.lock();
                let buffer = free
                    .tiers
                    .get_mut(&(TypeId::of::<T>(), tier))
                    .and_then(|list| list.pop());
                if buffer.is_some() {
                    free.pooled_bytes = free
                        .pooled_bytes
                        .saturating_sub(tier * std::mem::size_of::<T>());
                }
                buffer
            };

            if let Some(buffer) = reused.and_then(|b| b.downcast::<Vec<T>>().ok()) {
                self.inner.hits.fetch_add(1, Ordering::Relaxed);
                let mut buffer = *buffer;
                buffer.clear();
                return buffer;
            }
        }

        self.inner.misses.fetch_add(1, Ordering::Relaxed);
        Vec::with_capacity(tier)
    }

    /// Get a buffer of `len` copies of `value`.
    pub fn acquire_filled<T: Copy + Send + 'static>(&self, len: usize, value: T) -> Vec<T> {
        let mut buffer = self.acquire(len);
        buffer.resize(len, value);
        buffer
    }

    /// Get a buffer holding a copy of `values`.
    pub fn acquire_copy<T: Copy + Send + 'static>(&self, values: &[T]) -> Vec<T> {
        let mut buffer = self.acquire(values.len());
        buffer.extend_from_slice(values);
        buffer
    }

    /// Hand a buffer back for reuse.
    pub fn release<T: Send + 'static>(&self, buffer: Vec<T>) {
        let element_size = std::mem::size_of::<T>();
        if !self.inner.config.enabled || buffer.capacity() < MIN_TIER || element_size == 0 {
            self.inner.discarded.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let tier = tier_of_capacity(buffer.capacity());
        let bytes = tier * element_size;

        let kept = {
            let mut guard = self.lock();
            let free = &mut *guard;
            let over_budget =
                free.pooled_bytes + bytes > self.inner.config.max_pooled_bytes();
            let list = free.tiers.entry((TypeId::of::<T>(), tier)).or_default();

            if over_budget || list.len() >= self.inner.config.max_buffers_per_tier {
                false
            } else {
                list.push(Box::new(buffer));
                free.pooled_bytes += bytes;
                true
            }
        };

        if kept {
            self.inner.recycled.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.discarded.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drop all idle buffers.
    pub fn clear(&self) {
        let mut free = self.lock();
        free.tiers.clear();
        free.pooled_bytes = 0;
    }

    /// Get pool statistics.
    pub fn stats(&self) -> PoolStats {
        let pooled_bytes = self.lock().pooled_bytes as u64;
        PoolStats {
            hits: self.inner.hits.load(Ordering::Relaxed),
            misses: self.inner.misses.load(Ordering::Relaxed),
            recycled: self.inner.recycled.load(Ordering::Relaxed),
            discarded: self.inner.discarded.load(Ordering::Relaxed),
            pooled_bytes,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FreeLists> {
        // Buffers are never handled under the lock, so a poisoned lock
        // still holds consistent free lists.
        self.inner
            .free
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(BufferPoolConfig::default())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimal_capacity() {
        assert_eq!(optimal_capacity(0), 64);
        assert_eq!(optimal_capacity(64), 64);
        assert_eq!(optimal_capacity(65), 128);
        assert_eq!(optimal_capacity(1000), 1024);
    }

    #[test]
    fn test_tier_of_capacity() {
        assert_eq!(tier_of_capacity(1024), 1024);
        assert_eq!(tier_of_capacity(1500), 1024);
    }

    #[test]
    fn test_release_then_acquire_reuses_buffer() {
        let pool = BufferPool::default();

        let buffer: Vec<f32> = pool.acquire_filled(100, 1.0);
        assert_eq!(buffer.len(), 100);
        let ptr = buffer.as_ptr();
        pool.release(buffer);

        let reused: Vec<f32> = pool.acquire(120);
        assert!(reused.is_empty());
        assert_eq!(reused.as_ptr(), ptr);

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.recycled, 1);
        assert_eq!(stats.pooled_bytes, 0);
    }

    #[test]
    fn test_types_do_not_mix() {
        let pool = BufferPool::default();
        pool.release(pool.acquire_filled::<u8>(64, 0));

        let buffer: Vec<i8> = pool.acquire(64);
        assert!(buffer.capacity() >= 64);
        assert_eq!(pool.stats().hits, 0);
    }

    #[test]
    fn test_tier_limit_discards() {
        let pool = BufferPool::new(BufferPoolConfig {
            enabled: true,
            max_buffers_per_tier: 1,
            max_pooled_mb: 1,
        });
        pool.release(pool.acquire_filled::<u32>(10, 0));
        pool.release(pool.acquire_filled::<u32>(10, 0));

        let stats = pool.stats();
        assert_eq!(stats.recycled, 1);
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.pooled_bytes, 64 * 4);
    }

    #[test]
    fn test_disabled_pool_never_keeps() {
        let pool = BufferPool::new(BufferPoolConfig {
            enabled: false,
            ..Default::default()
        });
        pool.release(pool.acquire_filled::<u32>(10, 0));
        assert_eq!(pool.stats().recycled, 0);
        assert_eq!(pool.stats().pooled_bytes, 0);
    }
}
