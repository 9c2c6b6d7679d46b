//! A single lock-striped partition of the [`SegmentedStore`](super::SegmentedStore).
//!
//! Each segment pairs a hash map with an intrusive [`List`] that orders its entries for
//! capacity eviction. Under [`EvictionPolicy::Lru`] lookups promote an entry to the front;
//! under [`EvictionPolicy::Fifo`] entries stay in insertion order.
//!
//! Only settled cells are ever evicted. Evicting an in-flight cell would let a second caller
//! insert a fresh cell for the same key and run the function concurrently with the first
//! owner, so a segment whose entries are all in flight accepts the insert and temporarily
//! exceeds its capacity. The next insert after those cells settle evicts down to capacity
//! again.

use super::{CellRef, Insert};
use crate::cell::ResultCell;
use crate::config::EvictionPolicy;
use crate::list::{Entry, List};
use crate::metrics::StoreMetrics;
use core::hash::{BuildHasher, Hash};
use core::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

#[cfg(feature = "hashbrown")]
use hashbrown::HashMap;

#[cfg(not(feature = "hashbrown"))]
use std::collections::HashMap;

type Node<K, V, E> = *mut Entry<(K, CellRef<V, E>)>;

/// # Safety
///
/// The map holds raw pointers into `list`. They are valid as long as:
/// - the pointer was returned by `list.add()`
/// - the node has not been removed from the list
/// - the segment has not been dropped
///
/// Every code path that removes a node from the list removes its map entry in the same
/// `&mut self` call.
pub(crate) struct StoreSegment<K, V, E, S> {
    capacity: Option<NonZeroUsize>,
    policy: EvictionPolicy,
    list: List<(K, CellRef<V, E>)>,
    map: HashMap<K, Node<K, V, E>, S>,
    metrics: StoreMetrics,
}

// SAFETY: the segment owns every node its raw pointers refer to, and all access goes through
// `&mut self` behind the segment mutex. `Arc<ResultCell<V, E>>` is sendable when V and E are.
unsafe impl<K: Send, V: Send, E: Send, S: Send> Send for StoreSegment<K, V, E, S> {}

impl<K, V, E, S> StoreSegment<K, V, E, S>
where
    K: Hash + Eq + Clone,
    S: BuildHasher,
{
    pub(crate) fn with_hasher(
        capacity: Option<NonZeroUsize>,
        policy: EvictionPolicy,
        hash_builder: S,
    ) -> Self {
        let map_capacity = capacity.map_or(0, |cap| cap.get().next_power_of_two());
        StoreSegment {
            capacity,
            policy,
            list: List::new(),
            map: HashMap::with_capacity_and_hasher(map_capacity, hash_builder),
            metrics: StoreMetrics::default(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub(crate) fn metrics(&self) -> &StoreMetrics {
        &self.metrics
    }

    fn touch(&mut self, node: Node<K, V, E>) {
        if self.policy == EvictionPolicy::Lru {
            // SAFETY: node comes from our map
            unsafe { self.list.move_to_front(node) };
        }
    }

    pub(crate) fn get(&mut self, key: &K) -> Option<CellRef<V, E>> {
        let node = self.map.get(key).copied()?;
        self.touch(node);
        // SAFETY: node comes from our map
        let (_, cell) = unsafe { (*node).get_value() };
        Some(Arc::clone(cell))
    }

    pub(crate) fn insert_if_absent(&mut self, key: K, cell: CellRef<V, E>) -> Insert<V, E> {
        if let Some(node) = self.map.get(&key).copied() {
            self.metrics.insert_conflicts += 1;
            self.touch(node);
            // SAFETY: node comes from our map
            let (_, existing) = unsafe { (*node).get_value() };
            return Insert::Occupied(Arc::clone(existing));
        }

        if let Some(capacity) = self.capacity {
            // Also drains any excess left by an earlier overflow
            while self.map.len() >= capacity.get() {
                if !self.evict_settled() {
                    break;
                }
            }
        }

        let node = self.list.add((key.clone(), cell));
        self.map.insert(key, node);
        self.metrics.insertions += 1;
        Insert::Inserted
    }

    /// Removes the oldest settled entry. Returns `false` if every entry is in flight.
    fn evict_settled(&mut self) -> bool {
        let victim = self.list.find_from_back(|(_, cell)| cell.is_terminal());
        let Some(node) = victim else {
            self.metrics.overflows += 1;
            debug!(
                len = self.map.len(),
                "every entry in segment is in flight, exceeding capacity"
            );
            return false;
        };
        // SAFETY: node was found in our list and is mapped by our map
        if let Some(entry) = unsafe { self.list.remove(node) } {
            // SAFETY: entries removed from the list are never sentinels
            let (key, cell) = unsafe { entry.into_value() };
            self.map.remove(&key);
            self.metrics.evictions += 1;
            debug!(
                generation = cell.generation(),
                policy = self.policy.as_str(),
                "evicted settled entry to respect capacity"
            );
        }
        true
    }

    pub(crate) fn remove_if_same(&mut self, key: &K, cell: &CellRef<V, E>) -> bool {
        let Some(node) = self.map.get(key).copied() else {
            return false;
        };
        // SAFETY: node comes from our map
        let (_, current) = unsafe { (*node).get_value() };
        if !Arc::ptr_eq(current, cell) {
            return false;
        }
        self.remove(key).is_some()
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<CellRef<V, E>> {
        let node = self.map.remove(key)?;
        // SAFETY: node came from our map and is removed from it above
        let entry = unsafe { self.list.remove(node) }?;
        self.metrics.removals += 1;
        // SAFETY: entries removed from the list are never sentinels
        let (_, cell) = unsafe { entry.into_value() };
        Some(cell)
    }

    pub(crate) fn retain(&mut self, keep: &mut dyn FnMut(&K, &ResultCell<V, E>) -> bool) -> usize {
        let Self {
            map, list, metrics, ..
        } = self;
        let before = map.len();
        map.retain(|key, node| {
            let node = *node;
            // SAFETY: node comes from our map
            let cell: &ResultCell<V, E> = unsafe { &(*node).get_value().1 };
            let kept = keep(key, cell);
            if !kept {
                // SAFETY: node is unlinked here and its map entry is dropped by `retain`
                if let Some(entry) = unsafe { list.remove(node) } {
                    // SAFETY: entries removed from the list are never sentinels
                    drop(unsafe { entry.into_value() });
                }
            }
            kept
        });
        let removed = before - map.len();
        metrics.removals += removed as u64;
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.list.clear();
    }
}

impl<K, V, E, S> core::fmt::Debug for StoreSegment<K, V, E, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StoreSegment")
            .field("capacity", &self.capacity)
            .field("policy", &self.policy)
            .field("len", &self.list.len())
            .finish()
    }
}
