//! Memoizing cache.
//!
//! [`Memoizer`] wraps a [`Compute`] function and guarantees that, per key and per entry
//! generation, the function runs at most once no matter how many threads ask for the key at
//! the same time.
//!
//! # Algorithm
//!
//! ```text
//!            ┌────────────────────────┐  found, settled  ┌───────────────────┐
//! compute ──▶│ store.get              │─────────────────▶│ return outcome    │
//!            └──────────┬─────────────┘                  └───────────────────┘
//!                       │ absent (or stale entry removed)
//!            ┌──────────▼─────────────┐  occupied        ┌───────────────────┐
//!            │ store.insert_if_absent │─────────────────▶│ wait on that cell │
//!            └──────────┬─────────────┘                  └─────────┬─────────┘
//!                       │ inserted                                 │
//!            ┌──────────▼─────────────┐                            │
//!            │ owner runs f(key)      │                            │
//!            └──────────┬─────────────┘                            │
//!                       └──────────────────┬───────────────────────┘
//!                                          ▼
//!                Completed → Ok(v)   Failed → Err(Computation)
//!                Cancelled → remove_if_same, then start over
//! ```
//!
//! The insert-if-absent step closes the check-then-act window: two threads can both miss on
//! `get`, but only one of them wins the insert and becomes the owner. The other adopts the
//! winner's cell and waits.
//!
//! A cancelled cell is never returned to a caller. It is removed from the store (only if the
//! store still maps the key to that exact cell) and the lookup restarts, so one caller
//! abandoning its computation does not poison the key for everybody else.
//!
//! # Example
//!
//! ```
//! use memo_rs::Memoizer;
//!
//! let memo = Memoizer::new(|key: &String| -> Result<u64, String> {
//!     key.parse::<u64>()
//!         .map(|n| n * n)
//!         .map_err(|_| "parse error".to_string())
//! });
//!
//! assert_eq!(memo.compute(&"17".to_string()), Ok(289));
//! assert!(memo.compute(&"bad".to_string()).is_err());
//! ```

use crate::cancel::CancelToken;
use crate::cell::{CellState, Outcome, ResultCell, WaitError};
use crate::config::MemoConfig;
use crate::error::{Error, StoreError};
use crate::metrics::{CacheMetrics, MemoMetrics};
use crate::store::{CellRef, Insert, SegmentedStore, Store};
use core::hash::Hash;
use core::marker::PhantomData;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// A keyed, possibly failing, possibly slow computation.
///
/// Implementations should be deterministic or idempotent: the memoizer may call the function
/// again for a key after a cancellation, an expiration, an eviction or (when enabled) a
/// failure.
///
/// Any `Fn(&K) -> Result<V, E>` closure implements this trait. Wrap a
/// `Fn(&K, &CancelToken) -> Result<V, E>` closure in [`Cancellable`] to let it observe the
/// owner's cancellation.
pub trait Compute<K: ?Sized, V, E> {
    /// Computes the value for `key`.
    fn compute(&self, key: &K) -> Result<V, E>;

    /// Computes the value for `key` on behalf of an owner that may abandon the call.
    ///
    /// `token` fires when the owner is cancelled. By then the cell has already settled as
    /// cancelled and waiters have moved on, so a long computation can poll
    /// [`CancelToken::is_cancelled`] and return early; its result is discarded either way.
    ///
    /// The default ignores `token` and calls [`compute`](Self::compute).
    fn compute_cancellable(&self, key: &K, token: &CancelToken) -> Result<V, E> {
        let _ = token;
        self.compute(key)
    }
}

impl<K: ?Sized, V, E, F> Compute<K, V, E> for F
where
    F: Fn(&K) -> Result<V, E>,
{
    #[inline]
    fn compute(&self, key: &K) -> Result<V, E> {
        self(key)
    }
}

/// Adapts a `Fn(&K, &CancelToken) -> Result<V, E>` closure into a [`Compute`] that sees the
/// owner's cancellation token.
///
/// # Example
///
/// ```
/// use memo_rs::{Cancellable, CancelToken, Memoizer};
///
/// let memo = Memoizer::new(Cancellable(
///     |key: &u64, token: &CancelToken| -> Result<u64, &'static str> {
///         let mut acc = 0;
///         for i in 0..*key {
///             if token.is_cancelled() {
///                 return Err("abandoned");
///             }
///             acc += i;
///         }
///         Ok(acc)
///     },
/// ));
///
/// assert_eq!(memo.compute(&5), Ok(10));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Cancellable<F>(pub F);

impl<K: ?Sized, V, E, F> Compute<K, V, E> for Cancellable<F>
where
    F: Fn(&K, &CancelToken) -> Result<V, E>,
{
    fn compute(&self, key: &K) -> Result<V, E> {
        (self.0)(key, &CancelToken::new())
    }

    #[inline]
    fn compute_cancellable(&self, key: &K, token: &CancelToken) -> Result<V, E> {
        (self.0)(key, token)
    }
}

/// Concurrent memoizing cache around a compute function `F`.
///
/// # Type Parameters
///
/// - `K`: Key type. Must implement `Hash + Eq + Clone`.
/// - `V`: Value type. Cloned out to every caller.
/// - `E`: Failure cause of the compute function. Cloned out to every caller observing the
///   failure.
/// - `F`: The compute function.
/// - `S`: Backing [`Store`]. Defaults to [`SegmentedStore`].
///
/// # Blocking
///
/// The first caller for a key runs the function on its own thread and blocks for its full
/// duration. Concurrent callers for the same key block until it settles. Callers for other keys
/// are never blocked by it.
pub struct Memoizer<K, V, E, F, S = SegmentedStore<K, V, E>> {
    compute: F,
    store: S,
    config: MemoConfig,
    next_generation: AtomicU64,
    metrics: MemoMetrics,
    _marker: PhantomData<fn(&K) -> (V, E)>,
}

impl<K, V, E, F> Memoizer<K, V, E, F>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Compute<K, V, E>,
{
    /// Creates a memoizer with the default configuration: failures are cached, entries never
    /// expire, and the cache is unbounded.
    pub fn new(compute: F) -> Self {
        Self::with_config(compute, MemoConfig::default())
    }

    /// Creates a memoizer backed by a [`SegmentedStore`] built from `config`.
    pub fn with_config(compute: F, config: MemoConfig) -> Self {
        let store = SegmentedStore::new(&config);
        Self::with_store(compute, config, store)
    }
}

impl<K, V, E, F, S> Memoizer<K, V, E, F, S>
where
    K: Hash + Eq + Clone,
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
    F: Compute<K, V, E>,
    S: Store<K, V, E>,
{
    /// Creates a memoizer on top of a caller-supplied store.
    ///
    /// `max_entries` and `eviction_policy` in `config` are only honored if the store
    /// implements them; retry, expiration and cancellation handling always apply.
    pub fn with_store(compute: F, config: MemoConfig, store: S) -> Self {
        Self {
            compute,
            store,
            config,
            next_generation: AtomicU64::new(1),
            metrics: MemoMetrics::new(),
            _marker: PhantomData,
        }
    }

    /// Returns the value for `key`, computing it if no caller has done so yet.
    ///
    /// # Errors
    ///
    /// - [`Error::Computation`] if the function failed for this key (now or in an earlier,
    ///   cached attempt).
    /// - [`Error::CacheUnavailable`] if the store could not be accessed.
    pub fn compute(&self, key: &K) -> Result<V, Error<E>> {
        self.resolve(key, None, None)
    }

    /// Like [`compute`](Self::compute), but abandonable through `token`.
    ///
    /// If this caller owns the computation, cancelling abandons it: the entry settles as
    /// cancelled at once, waiters retry on their own, and this call returns
    /// [`Error::Interrupted`] when the compute function returns (see [`Cancellable`] for a
    /// function that stops early). If this caller is waiting on another
    /// owner, only this wait ends.
    pub fn compute_with(&self, key: &K, token: &CancelToken) -> Result<V, Error<E>> {
        self.resolve(key, Some(token), None)
    }

    /// Like [`compute`](Self::compute), but a caller that has to wait for another thread's
    /// computation gives up after `timeout` with [`Error::TimedOut`].
    ///
    /// A caller that becomes the owner runs the function to completion regardless of the
    /// timeout. A timed-out waiter leaves the computation running; its result is still cached.
    pub fn compute_timeout(&self, key: &K, timeout: Duration) -> Result<V, Error<E>> {
        self.resolve(key, None, Instant::now().checked_add(timeout))
    }

    /// Returns the cached value for `key` without computing or waiting.
    ///
    /// `None` if the key is absent, still in flight, failed, cancelled or expired. The store is
    /// left as found: stale entries are only dropped by the next computing call.
    pub fn get(&self, key: &K) -> Result<Option<V>, Error<E>> {
        let Some(cell) = self.store.get(key)? else {
            return Ok(None);
        };
        if let Some(ttl) = self.config.expiration() {
            if cell.is_expired(ttl, Instant::now()) {
                return Ok(None);
            }
        }
        match cell.try_outcome() {
            Some(Outcome::Completed(value)) => {
                self.metrics.record_hit();
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }

    /// Removes the entry for `key`.
    ///
    /// An in-flight computation keeps running and its current waiters still receive its
    /// result; later callers compute afresh.
    pub fn invalidate(&self, key: &K) -> Result<bool, StoreError> {
        Ok(self.store.remove(key)?.is_some())
    }

    /// Removes every entry.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear()
    }

    /// Number of entries, including in-flight computations.
    pub fn len(&self) -> Result<usize, StoreError> {
        self.store.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.store.is_empty()
    }

    /// Removes expired entries and leftover cancelled entries. Returns how many were removed.
    ///
    /// Expired entries are also dropped lazily when looked up; this sweep reclaims the ones
    /// nobody asks for again.
    pub fn purge_expired(&self) -> Result<usize, StoreError> {
        let ttl = self.config.expiration();
        let now = Instant::now();
        let metrics = &self.metrics;
        let removed = self.store.retain(&mut |_, cell: &ResultCell<V, E>| {
            if cell.state() == CellState::Cancelled {
                return false;
            }
            match ttl {
                Some(ttl) if cell.is_expired(ttl, now) => {
                    metrics.record_expiration();
                    false
                }
                _ => true,
            }
        })?;
        if removed > 0 {
            debug!(removed, "purged stale entries");
        }
        Ok(removed)
    }

    /// The configuration this memoizer was built with.
    pub fn config(&self) -> &MemoConfig {
        &self.config
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Lock-free counters describing how callers were served.
    pub fn memo_metrics(&self) -> &MemoMetrics {
        &self.metrics
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    fn resolve(
        &self,
        key: &K,
        token: Option<&CancelToken>,
        deadline: Option<Instant>,
    ) -> Result<V, Error<E>> {
        loop {
            let (cell, owner) = match self.lookup(key)? {
                Some(cell) => (cell, false),
                None => {
                    let fresh = Arc::new(ResultCell::new(self.next_generation()));
                    match self.store.insert_if_absent(key.clone(), Arc::clone(&fresh))? {
                        Insert::Inserted => (fresh, true),
                        Insert::Occupied(existing) => (existing, false),
                    }
                }
            };

            let outcome = if owner {
                self.metrics.record_miss();
                debug!(generation = cell.generation(), "computing as owner");
                match cell.run(key, &self.compute, token) {
                    Some(outcome) => {
                        self.record_settled(&outcome);
                        outcome
                    }
                    // Unreachable for a cell this thread just inserted
                    None => cell.wait(),
                }
            } else if let Some(outcome) = cell.try_outcome() {
                self.metrics.record_hit();
                trace!(generation = cell.generation(), "served settled entry");
                outcome
            } else {
                self.metrics.record_join();
                trace!(generation = cell.generation(), "joining in-flight computation");
                cell.wait_with(token, deadline).map_err(|err| match err {
                    WaitError::Interrupted => Error::Interrupted,
                    WaitError::TimedOut => Error::TimedOut,
                })?
            };

            match outcome {
                Outcome::Completed(value) => return Ok(value),
                Outcome::Failed(cause) => return Err(Error::Computation(cause)),
                Outcome::Cancelled => {
                    self.store.remove_if_same(key, &cell)?;
                    if token.is_some_and(CancelToken::is_cancelled) {
                        return Err(Error::Interrupted);
                    }
                    self.metrics.record_retry();
                    debug!(
                        generation = cell.generation(),
                        "computation cancelled, retrying"
                    );
                }
            }
        }
    }

    /// Returns the live cell for `key`, removing and skipping entries that must not be served.
    fn lookup(&self, key: &K) -> Result<Option<CellRef<V, E>>, Error<E>> {
        let Some(cell) = self.store.get(key)? else {
            return Ok(None);
        };

        match cell.state() {
            CellState::Cancelled => {
                self.store.remove_if_same(key, &cell)?;
                return Ok(None);
            }
            CellState::Failed if self.config.retry_on_failure() => {
                if self.store.remove_if_same(key, &cell)? {
                    self.metrics.record_retry();
                    debug!(
                        generation = cell.generation(),
                        "dropping failed entry for retry"
                    );
                }
                return Ok(None);
            }
            _ => {}
        }

        if let Some(ttl) = self.config.expiration() {
            if cell.is_expired(ttl, Instant::now()) {
                if self.store.remove_if_same(key, &cell)? {
                    self.metrics.record_expiration();
                    debug!(generation = cell.generation(), "entry expired");
                }
                return Ok(None);
            }
        }

        Ok(Some(cell))
    }

    fn record_settled(&self, outcome: &Outcome<V, E>) {
        match outcome {
            Outcome::Completed(_) => self.metrics.record_completion(),
            Outcome::Failed(_) => self.metrics.record_failure(),
            Outcome::Cancelled => self.metrics.record_cancellation(),
        }
    }
}

impl<K, V, E, F, S> CacheMetrics for Memoizer<K, V, E, F, S>
where
    S: CacheMetrics,
{
    /// Memoizer counters merged with the store's, store keys prefixed with `store_`.
    fn metrics(&self) -> BTreeMap<String, f64> {
        let mut metrics = self.metrics.to_btreemap();
        for (name, value) in self.store.metrics() {
            metrics.insert(format!("store_{name}"), value);
        }
        metrics
    }

    fn algorithm_name(&self) -> &'static str {
        "Memoizer"
    }
}

impl<K, V, E, F, S> core::fmt::Debug for Memoizer<K, V, E, F, S>
where
    S: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Memoizer")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("metrics", &self.metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Barrier;
    use std::thread;

    fn parse_square(key: &String) -> Result<u64, String> {
        key.parse::<u64>()
            .map(|n| n * n)
            .map_err(|_| "parse error".to_string())
    }

    #[test]
    fn test_compute_caches_value() {
        let calls = AtomicUsize::new(0);
        let memo = Memoizer::new(|key: &String| {
            calls.fetch_add(1, Ordering::SeqCst);
            parse_square(key)
        });

        assert_eq!(memo.compute(&"17".to_string()), Ok(289));
        assert_eq!(memo.compute(&"17".to_string()), Ok(289));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.len(), Ok(1));
        assert_eq!(memo.get(&"17".to_string()), Ok(Some(289)));
        assert_eq!(memo.get(&"18".to_string()), Ok(None));
    }

    #[test]
    fn test_failure_is_cached_by_default() {
        let calls = AtomicUsize::new(0);
        let memo = Memoizer::new(|key: &String| {
            calls.fetch_add(1, Ordering::SeqCst);
            parse_square(key)
        });

        let first = memo.compute(&"bad".to_string());
        let second = memo.compute(&"bad".to_string());
        assert_eq!(first, Err(Error::Computation("parse error".to_string())));
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.get(&"bad".to_string()), Ok(None));
    }

    #[test]
    fn test_retry_on_failure_reinvokes() {
        let calls = AtomicUsize::new(0);
        let memo = Memoizer::with_config(
            |key: &String| {
                calls.fetch_add(1, Ordering::SeqCst);
                parse_square(key)
            },
            MemoConfig::new().with_retry_on_failure(true),
        );

        assert!(memo.compute(&"bad".to_string()).is_err());
        assert!(memo.compute(&"bad".to_string()).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(memo.memo_metrics().retries(), 1);
    }

    #[test]
    fn test_get_leaves_failed_entry_for_next_compute() {
        let calls = AtomicUsize::new(0);
        let memo = Memoizer::with_config(
            |key: &String| {
                calls.fetch_add(1, Ordering::SeqCst);
                parse_square(key)
            },
            MemoConfig::new().with_retry_on_failure(true),
        );

        assert!(memo.compute(&"bad".to_string()).is_err());
        assert_eq!(memo.get(&"bad".to_string()), Ok(None));
        assert_eq!(memo.get(&"bad".to_string()), Ok(None));
        assert_eq!(memo.memo_metrics().retries(), 0);
        assert_eq!(memo.len(), Ok(1));

        // Only the computing call drops the failure and counts a retry
        assert!(memo.compute(&"bad".to_string()).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(memo.memo_metrics().retries(), 1);
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let calls = AtomicUsize::new(0);
        let memo = Memoizer::new(|key: &u64| -> Result<u64, ()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(key + 1)
        });

        assert_eq!(memo.compute(&1), Ok(2));
        assert_eq!(memo.invalidate(&1), Ok(true));
        assert_eq!(memo.invalidate(&1), Ok(false));
        assert_eq!(memo.compute(&1), Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        memo.clear().unwrap();
        assert_eq!(memo.is_empty(), Ok(true));
    }

    #[test]
    fn test_owner_cancelled_before_start_returns_interrupted() {
        let calls = AtomicUsize::new(0);
        let memo = Memoizer::new(|key: &u64| -> Result<u64, ()> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(*key)
        });

        let token = CancelToken::new();
        token.cancel();
        assert_eq!(memo.compute_with(&5, &token), Err(Error::Interrupted));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // The cancelled entry is gone, so the next caller computes normally
        assert_eq!(memo.len(), Ok(0));
        assert_eq!(memo.compute(&5), Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_waiter_retries_after_owner_cancels() {
        let calls = AtomicUsize::new(0);
        let started = Barrier::new(2);
        let memo = Memoizer::new(|key: &u64| -> Result<u64, ()> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                started.wait();
                thread::sleep(Duration::from_millis(50));
            }
            Ok(key * 10)
        });
        let token = CancelToken::new();

        thread::scope(|s| {
            let owner = s.spawn(|| memo.compute_with(&3, &token));
            started.wait();
            let waiter = s.spawn(|| memo.compute(&3));
            // Give the waiter time to join the in-flight cell before cancelling
            thread::sleep(Duration::from_millis(10));
            token.cancel();

            assert_eq!(owner.join().unwrap(), Err(Error::Interrupted));
            assert_eq!(waiter.join().unwrap(), Ok(30));
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(memo.memo_metrics().cancellations(), 1);
        assert_eq!(memo.compute(&3), Ok(30));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_owner_cancel_lets_waiters_retry_before_compute_returns() {
        let calls = AtomicUsize::new(0);
        let started = Barrier::new(2);
        let (release, held) = std::sync::mpsc::channel::<()>();
        let held = parking_lot::Mutex::new(held);
        let memo = Memoizer::new(|key: &u64| -> Result<u64, ()> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                started.wait();
                let _ = held.lock().recv_timeout(Duration::from_secs(5));
            }
            Ok(key + 1)
        });
        let token = CancelToken::new();

        thread::scope(|s| {
            let owner = s.spawn(|| memo.compute_with(&9, &token));
            started.wait();
            let waiter = s.spawn(|| memo.compute(&9));
            thread::sleep(Duration::from_millis(10));
            token.cancel();

            // Served by a fresh generation while the abandoned call is still blocked
            assert_eq!(waiter.join().unwrap(), Ok(10));
            assert!(!owner.is_finished());

            release.send(()).unwrap();
            assert_eq!(owner.join().unwrap(), Err(Error::Interrupted));
        });

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(memo.compute(&9), Ok(10));
    }

    #[test]
    fn test_cancellable_compute_observes_owner_token() {
        let memo = Memoizer::new(Cancellable(
            |_: &u64, token: &CancelToken| -> Result<u64, ()> {
                let deadline = Instant::now() + Duration::from_secs(5);
                while !token.is_cancelled() && Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(())
            },
        ));
        let token = CancelToken::new();

        thread::scope(|s| {
            let owner = s.spawn(|| memo.compute_with(&1, &token));
            thread::sleep(Duration::from_millis(20));
            token.cancel();
            assert_eq!(owner.join().unwrap(), Err(Error::Interrupted));
        });

        // The early return after cancellation is discarded, not cached as a failure
        assert_eq!(memo.memo_metrics().failures(), 0);
        assert_eq!(memo.memo_metrics().cancellations(), 1);
        assert_eq!(memo.len(), Ok(0));
    }

    #[test]
    fn test_waiter_timeout_leaves_computation_running() {
        let started = Barrier::new(2);
        let memo = Memoizer::new(|key: &u64| -> Result<u64, ()> {
            started.wait();
            thread::sleep(Duration::from_millis(100));
            Ok(*key)
        });

        thread::scope(|s| {
            let owner = s.spawn(|| memo.compute(&9));
            started.wait();
            assert_eq!(
                memo.compute_timeout(&9, Duration::from_millis(10)),
                Err(Error::TimedOut)
            );
            assert_eq!(owner.join().unwrap(), Ok(9));
        });
        assert_eq!(memo.get(&9), Ok(Some(9)));
    }

    #[test]
    fn test_expiration_recomputes() {
        let calls = AtomicUsize::new(0);
        let memo = Memoizer::with_config(
            |key: &u64| -> Result<u64, ()> {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(*key)
            },
            MemoConfig::new().with_expiration(Duration::from_millis(200)),
        );

        assert_eq!(memo.compute(&1), Ok(1));
        assert_eq!(memo.compute(&1), Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        thread::sleep(Duration::from_millis(250));
        assert_eq!(memo.compute(&1), Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(memo.memo_metrics().expirations(), 1);
    }

    #[test]
    fn test_purge_expired_sweeps_untouched_entries() {
        let memo = Memoizer::with_config(
            |key: &u64| -> Result<u64, ()> { Ok(*key) },
            MemoConfig::new().with_expiration(Duration::from_millis(200)),
        );
        for key in 0..20 {
            memo.compute(&key).unwrap();
        }
        assert_eq!(memo.purge_expired(), Ok(0));
        thread::sleep(Duration::from_millis(250));
        assert_eq!(memo.purge_expired(), Ok(20));
        assert_eq!(memo.is_empty(), Ok(true));
    }

    #[test]
    fn test_closed_store_is_cache_unavailable() {
        let memo = Memoizer::new(|key: &u64| -> Result<u64, ()> { Ok(*key) });
        memo.store().close();
        assert_eq!(
            memo.compute(&1),
            Err(Error::CacheUnavailable(StoreError::Closed))
        );
        assert_eq!(memo.len(), Err(StoreError::Closed));
    }

    #[test]
    fn test_metrics_report() {
        let memo = Memoizer::new(|key: &u64| -> Result<u64, ()> { Ok(*key) });
        memo.compute(&1).unwrap();
        memo.compute(&1).unwrap();
        memo.compute(&2).unwrap();

        let metrics = memo.metrics();
        assert_eq!(metrics["misses"], 2.0);
        assert_eq!(metrics["hits"], 1.0);
        assert_eq!(metrics["completions"], 2.0);
        assert_eq!(metrics["store_insertions"], 2.0);
        assert_eq!(memo.algorithm_name(), "Memoizer");
    }
}
