//! Concurrent associative store mapping keys to result cells.
//!
//! The memoizer only needs a handful of atomic primitives from its map, captured by the
//! [`Store`] trait:
//!
//! | Operation | Atomicity |
//! |-----------|-----------|
//! | [`get`](Store::get) | Plain lookup |
//! | [`insert_if_absent`](Store::insert_if_absent) | Check and insert in one critical section |
//! | [`remove_if_same`](Store::remove_if_same) | Removes only if the key still maps to the given cell |
//! | [`remove`](Store::remove) / [`retain`](Store::retain) / [`clear`](Store::clear) | Per entry |
//!
//! Cell identity is `Arc` pointer identity, so a conditional removal aimed at an old
//! generation can never remove the cell that replaced it.
//!
//! [`SegmentedStore`] is the default implementation: lock striping over `parking_lot::Mutex`
//! segments, each with its own hash map and recency list.

use crate::cell::ResultCell;
use crate::error::StoreError;
use std::sync::Arc;

mod segment;
mod segmented;

pub use segmented::SegmentedStore;

/// Shared handle to a result cell, held by the store and by every waiter.
pub type CellRef<V, E> = Arc<ResultCell<V, E>>;

/// Result of [`Store::insert_if_absent`].
#[derive(Debug)]
pub enum Insert<V, E> {
    /// The key was absent; the given cell is now mapped.
    Inserted,
    /// The key was already mapped to this cell; the given cell was discarded.
    Occupied(CellRef<V, E>),
}

/// Key to cell mapping with the atomic primitives the memoizer relies on.
///
/// Implementations must make `insert_if_absent` and `remove_if_same` atomic with respect to
/// every other operation on the same key.
pub trait Store<K, V, E> {
    /// Returns the cell currently mapped to `key`.
    fn get(&self, key: &K) -> Result<Option<CellRef<V, E>>, StoreError>;

    /// Maps `key` to `cell` unless the key is already mapped.
    fn insert_if_absent(&self, key: K, cell: CellRef<V, E>) -> Result<Insert<V, E>, StoreError>;

    /// Removes the entry for `key` only if it still maps to `cell`. Returns whether it did.
    fn remove_if_same(&self, key: &K, cell: &CellRef<V, E>) -> Result<bool, StoreError>;

    /// Removes the entry for `key` unconditionally.
    fn remove(&self, key: &K) -> Result<Option<CellRef<V, E>>, StoreError>;

    /// Keeps only the entries for which `keep` returns `true`. Returns how many were removed.
    fn retain(
        &self,
        keep: &mut dyn FnMut(&K, &ResultCell<V, E>) -> bool,
    ) -> Result<usize, StoreError>;

    /// Number of entries, including in-flight ones.
    fn len(&self) -> Result<usize, StoreError>;

    /// Returns `true` if the store holds no entries.
    fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|len| len == 0)
    }

    /// Removes every entry.
    fn clear(&self) -> Result<(), StoreError>;
}
