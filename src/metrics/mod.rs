//! Cache Metrics System
//!
//! Counters describing how the memoizer served its callers, reported through the
//! [`CacheMetrics`] trait as a `BTreeMap` so the output has a deterministic order (stable
//! logs, reproducible simulator CSVs).
//!
//! Two layers contribute:
//!
//! - [`MemoMetrics`]: lock-free counters owned by the [`Memoizer`](crate::Memoizer) itself.
//! - [`StoreMetrics`]: per-segment counters kept under each segment's lock and summed when
//!   read.

use std::collections::BTreeMap;

pub mod memo;
pub mod store;

pub use memo::MemoMetrics;
pub use store::StoreMetrics;

/// Uniform metrics reporting for the memoizer and its store.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Name identifying the component (e.g. "Memoizer", "SegmentedStore").
    fn algorithm_name(&self) -> &'static str;
}
