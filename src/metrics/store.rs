//! Store Metrics

use super::CacheMetrics;
use std::collections::BTreeMap;

/// Counters kept by each store segment under its lock.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreMetrics {
    /// Entries created by a successful insert-if-absent.
    pub insertions: u64,
    /// Insert-if-absent calls that found the key already mapped.
    pub insert_conflicts: u64,
    /// Entries removed explicitly, conditionally or by a sweep.
    pub removals: u64,
    /// Settled entries removed to respect the capacity bound.
    pub evictions: u64,
    /// Inserts that found every entry of a full segment still in flight.
    pub overflows: u64,
}

impl StoreMetrics {
    /// Adds another segment's counters to these.
    pub fn merge(&mut self, other: &StoreMetrics) {
        self.insertions += other.insertions;
        self.insert_conflicts += other.insert_conflicts;
        self.removals += other.removals;
        self.evictions += other.evictions;
        self.overflows += other.overflows;
    }

    /// Converts the counters to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert("insert_conflicts".to_string(), self.insert_conflicts as f64);
        metrics.insert("insertions".to_string(), self.insertions as f64);
        metrics.insert("overflows".to_string(), self.overflows as f64);
        metrics.insert("removals".to_string(), self.removals as f64);
        metrics
    }
}

impl CacheMetrics for StoreMetrics {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "SegmentedStore"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_sums_segments() {
        let mut total = StoreMetrics::default();
        let segment = StoreMetrics {
            insertions: 3,
            insert_conflicts: 1,
            removals: 2,
            evictions: 1,
            overflows: 0,
        };
        total.merge(&segment);
        total.merge(&segment);
        assert_eq!(total.insertions, 6);
        assert_eq!(total.evictions, 2);
        assert_eq!(total.to_btreemap()["removals"], 4.0);
    }
}
