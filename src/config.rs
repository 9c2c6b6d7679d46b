//! Memoizer Configuration
//!
//! [`MemoConfig`] collects the extension points layered on top of the base memoization
//! algorithm. The defaults reproduce the base behavior exactly:
//!
//! | Option | Default | Effect |
//! |--------|---------|--------|
//! | `retry_on_failure` | `false` | Failed results are cached and replayed to later callers |
//! | `expiration` | `None` | Settled entries live until removed |
//! | `max_entries` | `None` | No bound on the number of entries |
//! | `eviction_policy` | `Lru` | Which settled entry goes first once `max_entries` is reached |
//! | `segments` | CPU based | Number of independently locked store segments |
//!
//! # Sizing Guidelines
//!
//! `max_entries` is split evenly across segments, so each segment holds at most
//! `max_entries / segments` entries (at least one). Entries whose computation is still in
//! flight are never evicted; a segment whose entries are all in flight may temporarily hold
//! more than its share.
//!
//! # Examples
//!
//! ```
//! use memo_rs::config::{EvictionPolicy, MemoConfig};
//! use core::num::NonZeroUsize;
//! use std::time::Duration;
//!
//! let config = MemoConfig::new()
//!     .with_retry_on_failure(true)
//!     .with_expiration(Duration::from_secs(300))
//!     .with_max_entries(NonZeroUsize::new(10_000).unwrap())
//!     .with_eviction_policy(EvictionPolicy::Lru)
//!     .with_segments(16);
//!
//! assert!(config.retry_on_failure());
//! assert_eq!(config.segments(), 16);
//! ```

use core::fmt;
use core::num::NonZeroUsize;
use std::time::Duration;

/// Returns the default number of segments based on available parallelism.
pub fn default_segment_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(16)
        .clamp(4, 64)
}

/// Order in which settled entries are evicted once a segment is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EvictionPolicy {
    /// Evict the entry that was looked up least recently.
    #[default]
    Lru,
    /// Evict the entry that was inserted first, regardless of lookups.
    Fifo,
}

impl EvictionPolicy {
    /// Short name used in metrics and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            EvictionPolicy::Lru => "LRU",
            EvictionPolicy::Fifo => "FIFO",
        }
    }
}

/// Configuration for a [`Memoizer`](crate::Memoizer).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MemoConfig {
    retry_on_failure: bool,
    expiration: Option<Duration>,
    max_entries: Option<NonZeroUsize>,
    eviction_policy: EvictionPolicy,
    segments: usize,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoConfig {
    /// Creates the base configuration: failures cached, no expiration, unbounded, default
    /// segment count.
    #[must_use]
    pub fn new() -> Self {
        Self {
            retry_on_failure: false,
            expiration: None,
            max_entries: None,
            eviction_policy: EvictionPolicy::default(),
            segments: default_segment_count(),
        }
    }

    /// When `true`, a failed entry is dropped on the next lookup so the function is retried.
    #[must_use]
    pub fn with_retry_on_failure(mut self, retry: bool) -> Self {
        self.retry_on_failure = retry;
        self
    }

    /// Treats settled entries older than `ttl` as absent on the next lookup.
    ///
    /// Expired entries are also removed by
    /// [`Memoizer::purge_expired`](crate::Memoizer::purge_expired).
    #[must_use]
    pub fn with_expiration(mut self, ttl: Duration) -> Self {
        self.expiration = Some(ttl);
        self
    }

    /// Caps the number of entries, evicting settled entries per the eviction policy.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: NonZeroUsize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Sets the eviction policy used when `max_entries` is reached.
    #[must_use]
    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    /// Sets the number of store segments.
    ///
    /// More segments = less lock contention but more memory overhead.
    ///
    /// # Panics
    ///
    /// Panics if `segments` is 0.
    #[must_use]
    pub fn with_segments(mut self, segments: usize) -> Self {
        assert!(segments > 0, "segments must be > 0");
        self.segments = segments;
        self
    }

    /// Whether failed entries are retried on the next lookup.
    #[inline]
    pub fn retry_on_failure(&self) -> bool {
        self.retry_on_failure
    }

    /// Time-to-live of settled entries, if any.
    #[inline]
    pub fn expiration(&self) -> Option<Duration> {
        self.expiration
    }

    /// Maximum number of entries, if bounded.
    #[inline]
    pub fn max_entries(&self) -> Option<NonZeroUsize> {
        self.max_entries
    }

    /// Eviction policy applied when the cache is bounded.
    #[inline]
    pub fn eviction_policy(&self) -> EvictionPolicy {
        self.eviction_policy
    }

    /// Number of store segments.
    #[inline]
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Per-segment entry limit derived from `max_entries` and `segments`.
    pub(crate) fn segment_capacity(&self) -> Option<NonZeroUsize> {
        self.max_entries
            .map(|max| NonZeroUsize::new(max.get() / self.segments).unwrap_or(NonZeroUsize::MIN))
    }
}

impl fmt::Debug for MemoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoConfig")
            .field("retry_on_failure", &self.retry_on_failure)
            .field("expiration", &self.expiration)
            .field("max_entries", &self.max_entries)
            .field("eviction_policy", &self.eviction_policy)
            .field("segments", &self.segments)
            .finish()
    }
}
