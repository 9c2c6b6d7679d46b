//! Caller-side cancellation.
//!
//! A [`CancelToken`] is handed to [`Memoizer::compute_with`](crate::Memoizer::compute_with).
//! What cancelling it does depends on the caller's role for that key:
//!
//! - **Owner**: the computation is abandoned. If the token fires before the compute function
//!   starts, it never starts. If it fires while the function runs, the cell becomes
//!   `Cancelled` right away and the function's eventual result is discarded; a function
//!   wrapped in [`Cancellable`](crate::Cancellable) sees the token and can stop early. Every
//!   waiter observes the cancellation at the same moment and the cache retries on their behalf.
//! - **Waiter**: only this caller stops waiting. The computation and the other waiters are
//!   untouched.
//!
//! Cancelling wakes any thread currently blocked on a result cell under this token, so an
//! interrupted waiter returns promptly instead of sleeping until the computation finishes.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Something blocked threads can be woken from.
pub(crate) trait Interrupt: Send + Sync {
    /// Wakes every thread blocked on this object so it re-checks its exit conditions.
    fn interrupt(&self);
}

#[derive(Default)]
struct TokenInner {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    watchers: Mutex<Vec<(u64, Weak<dyn Interrupt>)>>,
}

/// A cloneable cancellation flag shared between a caller and whoever may abandon its call.
///
/// All clones observe the same state. Cancellation is permanent.
///
/// # Example
///
/// ```
/// use memo_rs::CancelToken;
///
/// let token = CancelToken::new();
/// let handle = token.clone();
/// assert!(!token.is_cancelled());
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl CancelToken {
    /// Creates a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token and wakes every wait currently guarded by it.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let watchers = self.inner.watchers.lock();
        for (_, watcher) in watchers.iter() {
            if let Some(watcher) = watcher.upgrade() {
                watcher.interrupt();
            }
        }
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called on any clone.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Registers `watcher` to be interrupted on cancellation until the returned guard drops.
    pub(crate) fn register(&self, watcher: Weak<dyn Interrupt>) -> Registration<'_> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.watchers.lock().push((id, watcher));
        Registration { token: self, id }
    }

    #[cfg(test)]
    fn watcher_count(&self) -> usize {
        self.inner.watchers.lock().len()
    }
}

impl core::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Keeps a watcher registered with a [`CancelToken`]; deregisters on drop.
pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    id: u64,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut watchers = self.token.inner.watchers.lock();
        watchers.retain(|(id, _)| *id != self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counter(AtomicUsize);

    impl Interrupt for Counter {
        fn interrupt(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        // Idempotent
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancel_interrupts_registered_watchers() {
        let token = CancelToken::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let as_dyn: Arc<dyn Interrupt> = counter.clone();
        let registration = token.register(Arc::downgrade(&as_dyn));
        token.cancel();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        drop(registration);
        assert_eq!(token.watcher_count(), 0);
    }

    #[test]
    fn test_dropped_registration_is_not_interrupted() {
        let token = CancelToken::new();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let as_dyn: Arc<dyn Interrupt> = counter.clone();
        {
            let _registration = token.register(Arc::downgrade(&as_dyn));
            assert_eq!(token.watcher_count(), 1);
        }
        token.cancel();
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_debug_output() {
        let token = CancelToken::new();
        assert_eq!(format!("{token:?}"), "CancelToken { cancelled: false }");
    }
}
