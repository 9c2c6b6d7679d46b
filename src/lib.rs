#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Components
//!
//! ```text
//! caller ──▶ Memoizer::compute(key)
//!               │
//!               ├──▶ Store (insert-if-absent / remove-if-same)     store::SegmentedStore
//!               │
//!               └──▶ ResultCell (run as owner, or wait)             cell::ResultCell
//!                        │
//!                        └──▶ Compute::compute(key)   at most once per cell
//! ```
//!
//! | Type | Role |
//! |------|------|
//! | [`Memoizer`] | Public entry point; orchestrates lookup, ownership and retries |
//! | [`ResultCell`] | One attempt at one key: `Pending → Running → Completed/Failed/Cancelled` |
//! | [`Store`] / [`SegmentedStore`] | Key to cell map with the atomic primitives the memoizer needs |
//! | [`CancelToken`] | Lets a caller abandon its call |
//! | [`MemoConfig`] | Retry, expiration, capacity and segment settings |
//!
//! ## Errors
//!
//! [`Memoizer::compute`] returns `Result<V, Error<E>>` where `E` is the compute function's
//! error type:
//!
//! - [`Error::Computation`]: the function failed for this key
//! - [`Error::Interrupted`]: this caller cancelled through its token
//! - [`Error::TimedOut`]: this caller's wait exceeded its timeout
//! - [`Error::CacheUnavailable`]: the store failed
//!
//! Cancellation of an in-flight computation is never reported to waiters: they retry.
//!
//! ## Sharing Across Threads
//!
//! `Memoizer` is `Send + Sync` when its compute function, keys and values are, so it can be
//! shared through `Arc` or borrowed by scoped threads:
//!
//! ```rust
//! use memo_rs::Memoizer;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::thread;
//!
//! let calls = AtomicUsize::new(0);
//! let memo = Memoizer::new(|n: &u64| -> Result<u64, ()> {
//!     calls.fetch_add(1, Ordering::SeqCst);
//!     Ok(n * n)
//! });
//!
//! thread::scope(|s| {
//!     for _ in 0..8 {
//!         s.spawn(|| assert_eq!(memo.compute(&12), Ok(144)));
//!     }
//! });
//! assert_eq!(calls.load(Ordering::SeqCst), 1);
//! ```
//!
//! ## Modules
//!
//! - [`memo`]: the memoizing cache and the [`Compute`] trait
//! - [`cell`]: the single-assignment result cell
//! - [`store`]: the store trait and the lock-striped default
//! - [`cancel`]: caller cancellation tokens
//! - [`config`]: configuration
//! - [`error`]: error types
//! - [`metrics`]: metrics collection

/// Caller-side cancellation tokens.
pub mod cancel;

/// Single-assignment result cell shared between one owner and many waiters.
pub mod cell;

/// Memoizer configuration.
pub mod config;

/// Error types.
pub mod error;

/// Intrusive doubly linked list ordering store entries for eviction.
///
/// **Note**: This module is internal infrastructure. It exposes unsafe raw pointer
/// operations that require careful invariant maintenance.
pub(crate) mod list;

/// The memoizing cache.
pub mod memo;

/// Metrics collection and reporting.
pub mod metrics;

/// Concurrent key to cell store.
pub mod store;

pub use cancel::CancelToken;
pub use cell::{CellState, Outcome, ResultCell, WaitError};
pub use config::{EvictionPolicy, MemoConfig};
pub use error::{Error, StoreError};
pub use memo::{Cancellable, Compute, Memoizer};
pub use metrics::CacheMetrics;
pub use store::{CellRef, Insert, SegmentedStore, Store};
