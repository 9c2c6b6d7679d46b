//! Single-assignment result cell.
//!
//! A [`ResultCell`] represents one attempt at computing the value for one key. Exactly one
//! thread, the owner, drives it through [`run`](ResultCell::run); any number of other threads
//! block in [`wait`](ResultCell::wait) until it settles.
//!
//! # Lifecycle
//!
//! ```text
//!   Pending ──run()──▶ Running ──┬──▶ Completed(value)
//!      │                         ├──▶ Failed(cause)
//!      └────token cancelled──────┴──▶ Cancelled
//! ```
//!
//! The transition into a terminal state happens exactly once and is broadcast to all waiters.
//! After that the cell never changes again, so every past and future `wait` observes the same
//! [`Outcome`].
//!
//! # Locking
//!
//! The internal `parking_lot::Mutex` guards only the state tag and stored result. It is never
//! held while the compute function executes, so a long computation blocks nobody but its owner
//! and the threads that explicitly wait for it.

use crate::cancel::{CancelToken, Interrupt};
use crate::memo::Compute;
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Observable state of a [`ResultCell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellState {
    /// Created, not yet claimed by an owner.
    Pending,
    /// The owner is executing the compute function.
    Running,
    /// The compute function returned a value.
    Completed,
    /// The compute function returned an error.
    Failed,
    /// The attempt was abandoned before producing a result.
    Cancelled,
}

impl CellState {
    /// Returns `true` for `Completed`, `Failed` and `Cancelled`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CellState::Completed | CellState::Failed | CellState::Cancelled
        )
    }
}

/// What a waiter observes once a cell has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<V, E> {
    /// The computed value.
    Completed(V),
    /// The compute function's failure cause.
    Failed(E),
    /// The attempt was abandoned; the caller should retry with a fresh cell.
    Cancelled,
}

/// Why [`ResultCell::wait_with`] returned without an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The waiter's own [`CancelToken`] fired.
    Interrupted,
    /// The waiter's deadline passed.
    TimedOut,
}

enum Slot<V, E> {
    Pending,
    Running,
    Completed(V),
    Failed(E),
    Cancelled,
}

struct Inner<V, E> {
    slot: Slot<V, E>,
    settled_at: Option<Instant>,
}

impl<V: Clone, E: Clone> Inner<V, E> {
    fn outcome(&self) -> Option<Outcome<V, E>> {
        match &self.slot {
            Slot::Pending | Slot::Running => None,
            Slot::Completed(value) => Some(Outcome::Completed(value.clone())),
            Slot::Failed(cause) => Some(Outcome::Failed(cause.clone())),
            Slot::Cancelled => Some(Outcome::Cancelled),
        }
    }
}

impl<V, E> Inner<V, E> {
    fn state(&self) -> CellState {
        match self.slot {
            Slot::Pending => CellState::Pending,
            Slot::Running => CellState::Running,
            Slot::Completed(_) => CellState::Completed,
            Slot::Failed(_) => CellState::Failed,
            Slot::Cancelled => CellState::Cancelled,
        }
    }
}

/// A single-assignment, single-writer/multi-reader slot for one computation.
///
/// Cells are created by the [`Memoizer`](crate::Memoizer) and shared through `Arc` between the
/// store entry for their key and every thread waiting on them.
pub struct ResultCell<V, E> {
    generation: u64,
    inner: Mutex<Inner<V, E>>,
    settled: Condvar,
}

impl<V, E> ResultCell<V, E> {
    /// Creates a `Pending` cell tagged with `generation`.
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            inner: Mutex::new(Inner {
                slot: Slot::Pending,
                settled_at: None,
            }),
            settled: Condvar::new(),
        }
    }

    /// The generation id assigned at creation.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Current state of the cell.
    pub fn state(&self) -> CellState {
        self.inner.lock().state()
    }

    /// Returns `true` once the cell has settled.
    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Returns `true` if the cell settled with a value or a failure at least `ttl` before `now`.
    ///
    /// In-flight and cancelled cells never expire; cancelled cells are removed by the
    /// cancellation path instead.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        let inner = self.inner.lock();
        match (&inner.slot, inner.settled_at) {
            (Slot::Completed(_) | Slot::Failed(_), Some(at)) => {
                now.saturating_duration_since(at) >= ttl
            }
            _ => false,
        }
    }

    /// Moves an in-flight cell into `slot` and wakes every waiter.
    ///
    /// Returns `false`, leaving the cell untouched, if it has already settled.
    fn settle(&self, slot: Slot<V, E>) -> bool {
        let mut inner = self.inner.lock();
        if !matches!(inner.slot, Slot::Pending | Slot::Running) {
            return false;
        }
        inner.slot = slot;
        inner.settled_at = Some(Instant::now());
        self.settled.notify_all();
        true
    }
}

impl<V: Clone, E: Clone> ResultCell<V, E> {
    /// Blocks until the cell settles and returns its outcome.
    ///
    /// Safe to call from any number of threads; it only observes the cell.
    pub fn wait(&self) -> Outcome<V, E> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(outcome) = inner.outcome() {
                return outcome;
            }
            self.settled.wait(&mut inner);
        }
    }

    /// Returns the outcome if the cell has settled, without blocking.
    pub fn try_outcome(&self) -> Option<Outcome<V, E>> {
        self.inner.lock().outcome()
    }
}

impl<V, E> ResultCell<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Runs `f` for `key` on the calling thread and settles the cell with the result.
    ///
    /// Must only be called by the thread that won ownership of the cell. The calling thread
    /// blocks for the full duration of the computation: the first caller for a key pays its
    /// cost while later callers wait.
    ///
    /// Returns `None`, without invoking `f`, if the cell was already claimed.
    ///
    /// Cancelling `token` while `f` runs settles the cell `Cancelled` immediately, so waiters
    /// move on without waiting for `f` to return. `f` sees the token through
    /// [`Compute::compute_cancellable`] and may stop early; whatever it returns after the
    /// cancellation is discarded.
    ///
    /// If `f` panics the cell settles as `Cancelled` so waiters retry, and the panic continues
    /// to unwind on the owner's thread.
    pub fn run<K, F>(
        self: &Arc<Self>,
        key: &K,
        f: &F,
        token: Option<&CancelToken>,
    ) -> Option<Outcome<V, E>>
    where
        K: ?Sized,
        F: Compute<K, V, E> + ?Sized,
    {
        {
            let mut inner = self.inner.lock();
            if !matches!(inner.slot, Slot::Pending) {
                return None;
            }
            if token.is_some_and(CancelToken::is_cancelled) {
                inner.slot = Slot::Cancelled;
                inner.settled_at = Some(Instant::now());
                self.settled.notify_all();
                return Some(Outcome::Cancelled);
            }
            inner.slot = Slot::Running;
        }

        let detached;
        let token = match token {
            Some(token) => token,
            None => {
                detached = CancelToken::new();
                &detached
            }
        };

        let watcher: Arc<dyn Interrupt> = Arc::new(OwnerCancel {
            cell: Arc::downgrade(self),
        });
        let registration = token.register(Arc::downgrade(&watcher));
        // A cancel racing the registration may have found no watcher to call
        if token.is_cancelled() {
            self.settle(Slot::Cancelled);
            return Some(Outcome::Cancelled);
        }

        let guard = RunGuard { cell: &**self };
        let result = f.compute_cancellable(key, token);
        core::mem::forget(guard);
        drop(registration);

        let (slot, outcome) = if token.is_cancelled() {
            (Slot::Cancelled, Outcome::Cancelled)
        } else {
            match result {
                Ok(value) => (Slot::Completed(value.clone()), Outcome::Completed(value)),
                Err(cause) => (Slot::Failed(cause.clone()), Outcome::Failed(cause)),
            }
        };
        if self.settle(slot) {
            Some(outcome)
        } else {
            // Settled by the token's watcher while `f` was still running
            Some(Outcome::Cancelled)
        }
    }

    /// Like [`wait`](Self::wait), but gives up when `token` is cancelled or `deadline` passes.
    ///
    /// Giving up is local to this caller: the cell, its owner and its other waiters are not
    /// affected. An outcome that is already available wins over both exit conditions.
    pub fn wait_with(
        self: &Arc<Self>,
        token: Option<&CancelToken>,
        deadline: Option<Instant>,
    ) -> Result<Outcome<V, E>, WaitError> {
        let _registration = token.map(|token| {
            let this: Arc<dyn Interrupt> = Arc::clone(self) as Arc<dyn Interrupt>;
            let watcher: Weak<dyn Interrupt> = Arc::downgrade(&this);
            token.register(watcher)
        });

        let mut inner = self.inner.lock();
        loop {
            if let Some(outcome) = inner.outcome() {
                return Ok(outcome);
            }
            if token.is_some_and(CancelToken::is_cancelled) {
                return Err(WaitError::Interrupted);
            }
            match deadline {
                Some(deadline) => {
                    if self.settled.wait_until(&mut inner, deadline).timed_out() {
                        return inner.outcome().ok_or(WaitError::TimedOut);
                    }
                }
                None => self.settled.wait(&mut inner),
            }
        }
    }
}

impl<V: Send, E: Send> Interrupt for ResultCell<V, E> {
    fn interrupt(&self) {
        // Taking the lock orders this wake-up after any waiter that already checked its token.
        let _inner = self.inner.lock();
        self.settled.notify_all();
    }
}

impl<V, E> core::fmt::Debug for ResultCell<V, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ResultCell")
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish()
    }
}

/// Settles a running cell as cancelled when the owner's token fires.
struct OwnerCancel<V, E> {
    cell: Weak<ResultCell<V, E>>,
}

impl<V: Send, E: Send> Interrupt for OwnerCancel<V, E> {
    fn interrupt(&self) {
        if let Some(cell) = self.cell.upgrade() {
            cell.settle(Slot::Cancelled);
        }
    }
}

/// Settles the cell as cancelled if the compute function unwinds.
struct RunGuard<'a, V, E> {
    cell: &'a ResultCell<V, E>,
}

impl<V, E> Drop for RunGuard<'_, V, E> {
    fn drop(&mut self) {
        self.cell.settle(Slot::Cancelled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn square(key: &u64) -> Result<u64, String> {
        Ok(key * key)
    }

    #[test]
    fn test_run_completes() {
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        assert_eq!(cell.state(), CellState::Pending);
        assert_eq!(cell.try_outcome(), None);

        let outcome = cell.run(&17, &square, None);
        assert_eq!(outcome, Some(Outcome::Completed(289)));
        assert_eq!(cell.state(), CellState::Completed);
        assert_eq!(cell.wait(), Outcome::Completed(289));
        assert_eq!(cell.generation(), 1);
    }

    #[test]
    fn test_run_fails() {
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        let fail = |_: &u64| -> Result<u64, String> { Err("parse error".to_string()) };
        assert_eq!(
            cell.run(&1, &fail, None),
            Some(Outcome::Failed("parse error".to_string()))
        );
        assert_eq!(cell.state(), CellState::Failed);
        assert_eq!(cell.wait(), Outcome::Failed("parse error".to_string()));
    }

    #[test]
    fn test_run_twice_is_rejected() {
        let calls = AtomicUsize::new(0);
        let f = |key: &u64| -> Result<u64, String> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(*key)
        };
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        assert!(cell.run(&5, &f, None).is_some());
        assert!(cell.run(&5, &f, None).is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cell.wait(), Outcome::Completed(5));
    }

    #[test]
    fn test_cancelled_before_run_skips_compute() {
        let calls = AtomicUsize::new(0);
        let f = |key: &u64| -> Result<u64, String> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(*key)
        };
        let token = CancelToken::new();
        token.cancel();
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        assert_eq!(cell.run(&5, &f, Some(&token)), Some(Outcome::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cell.state(), CellState::Cancelled);
    }

    #[test]
    fn test_cancelled_during_run_discards_result() {
        let token = CancelToken::new();
        let inner_token = token.clone();
        let f = move |key: &u64| -> Result<u64, String> {
            inner_token.cancel();
            Ok(*key)
        };
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        assert_eq!(cell.run(&5, &f, Some(&token)), Some(Outcome::Cancelled));
        assert_eq!(cell.wait(), Outcome::Cancelled);
    }

    #[test]
    fn test_owner_cancel_releases_waiters_while_compute_runs() {
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        let token = CancelToken::new();
        let (release, held) = std::sync::mpsc::channel::<()>();

        let owner = {
            let cell = Arc::clone(&cell);
            let token = token.clone();
            thread::spawn(move || {
                let f = move |key: &u64| -> Result<u64, String> {
                    let _ = held.recv_timeout(Duration::from_secs(5));
                    Ok(*key)
                };
                cell.run(&7, &f, Some(&token))
            })
        };
        while cell.state() != CellState::Running {
            thread::sleep(Duration::from_millis(1));
        }
        let waiter = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.wait())
        };

        token.cancel();
        // The compute function is still blocked, yet the cell has settled
        assert_eq!(cell.state(), CellState::Cancelled);
        assert_eq!(waiter.join().unwrap(), Outcome::Cancelled);

        release.send(()).unwrap();
        assert_eq!(owner.join().unwrap(), Some(Outcome::Cancelled));
        assert_eq!(cell.wait(), Outcome::Cancelled);
    }

    #[test]
    fn test_late_settle_does_not_overwrite() {
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        assert!(cell.settle(Slot::Cancelled));
        assert!(!cell.settle(Slot::Completed(3)));
        assert_eq!(cell.wait(), Outcome::Cancelled);
    }

    #[test]
    fn test_panic_in_compute_cancels_cell() {
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        let owner = Arc::clone(&cell);
        let result = thread::spawn(move || {
            let f = |_: &u64| -> Result<u64, String> { panic!("boom") };
            owner.run(&1, &f, None)
        })
        .join();
        assert!(result.is_err());
        assert_eq!(cell.state(), CellState::Cancelled);
        assert_eq!(cell.wait(), Outcome::Cancelled);
    }

    #[test]
    fn test_waiters_observe_same_outcome() {
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        let mut waiters = Vec::new();
        for _ in 0..8 {
            let cell = Arc::clone(&cell);
            waiters.push(thread::spawn(move || cell.wait()));
        }

        let slow = |key: &u64| -> Result<u64, String> {
            thread::sleep(Duration::from_millis(20));
            Ok(key * 2)
        };
        assert_eq!(cell.run(&21, &slow, None), Some(Outcome::Completed(42)));

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), Outcome::Completed(42));
        }
    }

    #[test]
    fn test_wait_with_deadline_times_out() {
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        let deadline = Instant::now() + Duration::from_millis(20);
        assert_eq!(cell.wait_with(None, Some(deadline)), Err(WaitError::TimedOut));
        // Timing out leaves the cell untouched.
        assert_eq!(cell.state(), CellState::Pending);
    }

    #[test]
    fn test_wait_with_interrupted_by_token() {
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        let token = CancelToken::new();

        let waiter = {
            let cell = Arc::clone(&cell);
            let token = token.clone();
            thread::spawn(move || cell.wait_with(Some(&token), None))
        };
        thread::sleep(Duration::from_millis(20));
        token.cancel();

        assert_eq!(waiter.join().unwrap(), Err(WaitError::Interrupted));
        assert_eq!(cell.state(), CellState::Pending);

        // Other waiters still get the result.
        cell.run(&3, &square, None);
        assert_eq!(cell.wait_with(None, None), Ok(Outcome::Completed(9)));
    }

    #[test]
    fn test_settled_outcome_wins_over_cancelled_token() {
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        cell.run(&4, &square, None);
        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            cell.wait_with(Some(&token), None),
            Ok(Outcome::Completed(16))
        );
    }

    #[test]
    fn test_expiration() {
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        let ttl = Duration::from_secs(60);
        assert!(!cell.is_expired(ttl, Instant::now()));
        cell.run(&2, &square, None);
        assert!(!cell.is_expired(ttl, Instant::now()));
        assert!(cell.is_expired(ttl, Instant::now() + Duration::from_secs(61)));
        assert!(cell.is_expired(Duration::ZERO, Instant::now()));
    }

    #[test]
    fn test_cancelled_cell_never_expires() {
        let token = CancelToken::new();
        token.cancel();
        let cell: Arc<ResultCell<u64, String>> = Arc::new(ResultCell::new(1));
        cell.run(&2, &square, Some(&token));
        assert!(!cell.is_expired(Duration::ZERO, Instant::now() + Duration::from_secs(1)));
    }

    #[test]
    fn test_state_is_terminal() {
        assert!(!CellState::Pending.is_terminal());
        assert!(!CellState::Running.is_terminal());
        assert!(CellState::Completed.is_terminal());
        assert!(CellState::Failed.is_terminal());
        assert!(CellState::Cancelled.is_terminal());
    }
}
