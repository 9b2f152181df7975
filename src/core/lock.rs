//! Exclusive access to the simulation session.
//!
//! Fee estimations and fork resets both mutate the same session, so the
//! session lives inside this lock and is only reachable through a guard.
//! Waiters are served strictly in arrival order (the underlying tokio mutex
//! is fair). The lock is not reentrant: a holder that acquires again waits
//! forever.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, MutexGuard};

pub struct SessionLock<T> {
    inner: Mutex<T>,
    waiting: AtomicUsize,
}

impl<T> SessionLock<T> {
    pub fn new(session: T) -> Self {
        Self {
            inner: Mutex::new(session),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Suspend until the caller is the sole holder.
    ///
    /// `holder` only labels log lines. Dropping the guard releases the lock,
    /// on every exit path.
    pub async fn acquire(&self, holder: &'static str) -> SessionGuard<'_, T> {
        let queued = QueueSlot::enter(&self.waiting);
        tracing::trace!(holder, ahead = queued.position - 1, "waiting for session lock");

        let started = Instant::now();
        let guard = self.inner.lock().await;
        drop(queued);

        tracing::debug!(
            holder,
            waited_ms = started.elapsed().as_millis() as u64,
            "session lock acquired"
        );

        SessionGuard {
            guard,
            holder,
            acquired_at: Instant::now(),
        }
    }

    /// Number of tasks currently suspended in [`acquire`](Self::acquire).
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Holder's view of the session. Releases the lock when dropped.
pub struct SessionGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    holder: &'static str,
    acquired_at: Instant,
}

impl<T> Deref for SessionGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> Drop for SessionGuard<'_, T> {
    fn drop(&mut self) {
        tracing::debug!(
            holder = self.holder,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "session lock released"
        );
    }
}

/// Counts a waiter until it either gets the lock or is cancelled.
struct QueueSlot<'a> {
    counter: &'a AtomicUsize,
    position: usize,
}

impl<'a> QueueSlot<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        let position = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Self { counter, position }
    }
}

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
