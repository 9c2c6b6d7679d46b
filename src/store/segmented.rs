//! Lock-striped default store.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         SegmentedStore                               │
//! │                                                                      │
//! │  hash(key) % N  ──▶  Segment Selection                               │
//! │                                                                      │
//! │  ┌──────────────┐ ┌──────────────┐     ┌──────────────┐              │
//! │  │  Segment 0   │ │  Segment 1   │ ... │  Segment N-1 │              │
//! │  │  ┌────────┐  │ │  ┌────────┐  │     │  ┌────────┐  │              │
//! │  │  │ Mutex  │  │ │  │ Mutex  │  │     │  │ Mutex  │  │              │
//! │  │  └────┬───┘  │ │  └────┬───┘  │     │  └────┬───┘  │              │
//! │  │  ┌────▼───┐  │ │  ┌────▼───┐  │     │  ┌────▼───┐  │              │
//! │  │  │map+list│  │ │  │map+list│  │     │  │map+list│  │              │
//! │  │  └────────┘  │ │  └────────┘  │     │  └────────┘  │              │
//! │  └──────────────┘ └──────────────┘     └──────────────┘              │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation on a key locks exactly one segment, and only for the map update. The compute
//! function never runs under a segment lock, so unrelated keys never wait on each other's
//! computations and keys in the same segment wait only for a map operation.
//!
//! Eviction order is per segment, not global: an entry may be evicted from one segment while
//! another segment holds older entries.

use super::segment::StoreSegment;
use super::{CellRef, Insert, Store};
use crate::cell::ResultCell;
use crate::config::{EvictionPolicy, MemoConfig};
use crate::error::StoreError;
use crate::metrics::{CacheMetrics, StoreMetrics};
use core::hash::{BuildHasher, Hash};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "hashbrown")]
use hashbrown::DefaultHashBuilder;

#[cfg(not(feature = "hashbrown"))]
use std::collections::hash_map::RandomState as DefaultHashBuilder;

/// The default [`Store`]: keys partitioned across independently locked segments.
///
/// Capacity (`max_entries`) and eviction policy come from the [`MemoConfig`] the store is
/// built from; capacity is divided evenly between segments.
///
/// A store can be [closed](Self::close), after which every operation fails with
/// [`StoreError::Closed`]. The memoizer surfaces that as
/// [`Error::CacheUnavailable`](crate::Error::CacheUnavailable).
pub struct SegmentedStore<K, V, E, S = DefaultHashBuilder> {
    segments: Box<[Mutex<StoreSegment<K, V, E, S>>]>,
    hash_builder: S,
    policy: EvictionPolicy,
    segment_capacity: Option<NonZeroUsize>,
    closed: AtomicBool,
}

impl<K, V, E> SegmentedStore<K, V, E, DefaultHashBuilder>
where
    K: Hash + Eq + Clone,
{
    /// Creates a store sized and partitioned according to `config`.
    pub fn new(config: &MemoConfig) -> Self {
        Self::with_hasher(config, DefaultHashBuilder::default())
    }
}

impl<K, V, E, S> SegmentedStore<K, V, E, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    /// Creates a store with a custom hash builder (cloned into each segment).
    ///
    /// Use this for deterministic hashing or DoS-resistant hashers.
    pub fn with_hasher(config: &MemoConfig, hash_builder: S) -> Self {
        let segment_capacity = config.segment_capacity();
        let segments: Vec<_> = (0..config.segments())
            .map(|_| {
                Mutex::new(StoreSegment::with_hasher(
                    segment_capacity,
                    config.eviction_policy(),
                    hash_builder.clone(),
                ))
            })
            .collect();

        Self {
            segments: segments.into_boxed_slice(),
            hash_builder,
            policy: config.eviction_policy(),
            segment_capacity,
            closed: AtomicBool::new(false),
        }
    }

    #[inline]
    fn segment_index(&self, key: &K) -> usize {
        (self.hash_builder.hash_one(key) as usize) % self.segments.len()
    }

    fn segment(&self, key: &K) -> Result<MutexGuard<'_, StoreSegment<K, V, E, S>>, StoreError> {
        self.ensure_open()?;
        Ok(self.segments[self.segment_index(key)].lock())
    }

    #[inline]
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    /// Returns the number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Total entry capacity across all segments, or `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.segment_capacity
            .map(|cap| cap.get() * self.segments.len())
    }

    /// Closes the store. Every later operation fails with [`StoreError::Closed`].
    ///
    /// Entries already handed out stay usable by their holders; in-flight computations finish
    /// and wake their waiters normally.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Sums the counters of every segment.
    ///
    /// Acquires each segment lock in turn, so the snapshot may be slightly stale under
    /// concurrent use.
    pub fn store_metrics(&self) -> StoreMetrics {
        let mut total = StoreMetrics::default();
        for segment in self.segments.iter() {
            total.merge(segment.lock().metrics());
        }
        total
    }
}

impl<K, V, E, S> Store<K, V, E> for SegmentedStore<K, V, E, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    fn get(&self, key: &K) -> Result<Option<CellRef<V, E>>, StoreError> {
        Ok(self.segment(key)?.get(key))
    }

    fn insert_if_absent(&self, key: K, cell: CellRef<V, E>) -> Result<Insert<V, E>, StoreError> {
        let mut segment = self.segment(&key)?;
        Ok(segment.insert_if_absent(key, cell))
    }

    fn remove_if_same(&self, key: &K, cell: &CellRef<V, E>) -> Result<bool, StoreError> {
        Ok(self.segment(key)?.remove_if_same(key, cell))
    }

    fn remove(&self, key: &K) -> Result<Option<CellRef<V, E>>, StoreError> {
        Ok(self.segment(key)?.remove(key))
    }

    fn retain(
        &self,
        keep: &mut dyn FnMut(&K, &ResultCell<V, E>) -> bool,
    ) -> Result<usize, StoreError> {
        self.ensure_open()?;
        Ok(self
            .segments
            .iter()
            .map(|segment| segment.lock().retain(&mut *keep))
            .sum())
    }

    /// Sums segment sizes, locking each segment in turn; the count may be slightly stale
    /// under concurrent use.
    fn len(&self) -> Result<usize, StoreError> {
        self.ensure_open()?;
        Ok(self.segments.iter().map(|s| s.lock().len()).sum())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        for segment in self.segments.iter() {
            segment.lock().clear();
        }
        Ok(())
    }
}

impl<K, V, E, S> CacheMetrics for SegmentedStore<K, V, E, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher + Clone,
{
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.store_metrics().to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        match self.policy {
            EvictionPolicy::Lru => "SegmentedLRU",
            EvictionPolicy::Fifo => "SegmentedFIFO",
        }
    }
}

impl<K, V, E, S> core::fmt::Debug for SegmentedStore<K, V, E, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SegmentedStore")
            .field("segment_count", &self.segments.len())
            .field("policy", &self.policy)
            .field(
                "capacity",
                &self
                    .segment_capacity
                    .map(|cap| cap.get() * self.segments.len()),
            )
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}
