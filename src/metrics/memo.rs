//! Memoizer Metrics

use super::CacheMetrics;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by the memoizer without taking any lock.
///
/// - `hits`: lookups answered by an already settled entry
/// - `misses`: lookups that made the caller the owner of a new computation
/// - `joins`: lookups that waited on a computation owned by another thread
/// - `completions` / `failures` / `cancellations`: how owned computations settled
/// - `retries`: lookups restarted after a cancelled entry or a failed entry dropped for retry
/// - `expirations`: entries removed because they outlived the configured expiration
#[derive(Debug, Default)]
pub struct MemoMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    joins: AtomicU64,
    completions: AtomicU64,
    failures: AtomicU64,
    cancellations: AtomicU64,
    retries: AtomicU64,
    expirations: AtomicU64,
}

macro_rules! counter {
    ($record:ident, $read:ident) => {
        #[doc = concat!("Increments the `", stringify!($read), "` counter.")]
        #[inline]
        pub fn $record(&self) {
            self.$read.fetch_add(1, Ordering::Relaxed);
        }

        #[doc = concat!("Current value of the `", stringify!($read), "` counter.")]
        #[inline]
        pub fn $read(&self) -> u64 {
            self.$read.load(Ordering::Relaxed)
        }
    };
}

impl MemoMetrics {
    /// Creates a zeroed set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_hit, hits);
    counter!(record_miss, misses);
    counter!(record_join, joins);
    counter!(record_completion, completions);
    counter!(record_failure, failures);
    counter!(record_cancellation, cancellations);
    counter!(record_retry, retries);
    counter!(record_expiration, expirations);

    /// Total number of lookups that found or created an entry.
    pub fn requests(&self) -> u64 {
        self.hits() + self.misses() + self.joins()
    }

    /// Fraction of requests that did not invoke the compute function.
    pub fn hit_rate(&self) -> f64 {
        let requests = self.requests();
        if requests > 0 {
            (self.hits() + self.joins()) as f64 / requests as f64
        } else {
            0.0
        }
    }

    /// Converts the counters to a BTreeMap for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("cancellations".to_string(), self.cancellations() as f64);
        metrics.insert("completions".to_string(), self.completions() as f64);
        metrics.insert("expirations".to_string(), self.expirations() as f64);
        metrics.insert("failures".to_string(), self.failures() as f64);
        metrics.insert("hits".to_string(), self.hits() as f64);
        metrics.insert("joins".to_string(), self.joins() as f64);
        metrics.insert("misses".to_string(), self.misses() as f64);
        metrics.insert("retries".to_string(), self.retries() as f64);
        metrics.insert("requests".to_string(), self.requests() as f64);
        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics
    }
}

impl CacheMetrics for MemoMetrics {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "Memoizer"
    }
}
