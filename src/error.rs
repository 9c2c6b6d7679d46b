//! Error types surfaced by the memoizing cache.
//!
//! A caller of [`Memoizer::compute`](crate::Memoizer::compute) either receives a value or one of
//! the [`Error`] variants below. Cancellation of an in-flight computation never shows up here:
//! it is handled inside the cache by evicting the stale entry and retrying.

use thiserror::Error;

/// Failure reported by a [`Store`](crate::store::Store) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store has been closed and no longer accepts operations.
    #[error("store is closed")]
    Closed,
    /// The backing store failed for an implementation-specific reason.
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Error returned by [`Memoizer::compute`](crate::Memoizer::compute) and its variants.
///
/// `E` is the error type of the wrapped compute function. It is stored in the result cell and
/// cloned out to every caller observing that cell, which is why the cache requires `E: Clone`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error<E> {
    /// The compute function failed for this key. The cause is cached unless
    /// `retry_on_failure` is enabled.
    #[error("computation failed: {0}")]
    Computation(E),

    /// This caller's wait was abandoned through its [`CancelToken`](crate::CancelToken).
    /// Other callers waiting on the same computation are not affected.
    #[error("wait interrupted by caller cancellation")]
    Interrupted,

    /// This caller gave up waiting for an in-flight computation. The computation keeps running
    /// and its result is still cached for later callers.
    #[error("timed out waiting for in-flight computation")]
    TimedOut,

    /// The underlying store could not be accessed.
    #[error("cache unavailable: {0}")]
    CacheUnavailable(#[from] StoreError),
}

impl<E> Error<E> {
    /// Returns the compute function's failure cause, if this is a computation error.
    pub fn cause(&self) -> Option<&E> {
        match self {
            Error::Computation(cause) => Some(cause),
            _ => None,
        }
    }

    /// Returns `true` if the error is local to this caller and says nothing about the
    /// computation itself.
    pub fn is_caller_local(&self) -> bool {
        matches!(self, Error::Interrupted | Error::TimedOut)
    }
}
