//! Tick notification primitive between the tick producer and the dispatcher.
//!
//! This is deliberately *not* a general-purpose channel: the contract (see the
//! timer service's concurrency model) is that the tick producer never carries
//! a payload and never blocks on the dispatcher. It only ever wakes the
//! dispatcher up; the dispatcher is responsible for reading a monotonic clock
//! itself and catching up on however many tick intervals actually elapsed.
//! Multiple notifications between two dispatcher wakeups coalesce into one —
//! this is what makes the primitive safe to call from a context that must
//! never block.
//!
//! # Example
//!
//! ```rust
//! use tmrsvc_channel::tick_channel;
//!
//! let (notifier, waiter) = tick_channel();
//!
//! std::thread::spawn(move || {
//!     notifier.notify();
//! });
//!
//! waiter.wait().unwrap();
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use thiserror::Error;

/// Error returned by [`Waiter`] operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TickChannelError {
    /// The channel has been shut down; no further ticks will be delivered.
    #[error("tick channel has been shut down")]
    ShutDown,
}

/// Result type for tick channel operations.
pub type TickResult<T> = Result<T, TickChannelError>;

struct Inner {
    pending: Mutex<bool>,
    cv: Condvar,
    shutdown: AtomicBool,
}

/// Notifies a [`Waiter`] that at least one tick interval has elapsed.
///
/// Held by the tick-producer thread. Must never be used to pass timer
/// engine state — its only method beyond `notify`/`shutdown` is the ability
/// to wake the dispatcher.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<Inner>,
}

/// Receives tick notifications on behalf of the dispatcher.
pub struct Waiter {
    inner: Arc<Inner>,
}

/// Create a linked `(Notifier, Waiter)` pair.
pub fn tick_channel() -> (Notifier, Waiter) {
    let inner = Arc::new(Inner {
        pending: Mutex::new(false),
        cv: Condvar::new(),
        shutdown: AtomicBool::new(false),
    });
    (
        Notifier {
            inner: inner.clone(),
        },
        Waiter { inner },
    )
}

impl Notifier {
    /// Wake the waiter. Coalesces with any notification not yet observed.
    pub fn notify(&self) {
        let mut pending = self.inner.pending.lock().unwrap();
        *pending = true;
        self.inner.cv.notify_one();
    }

    /// Signal shutdown and wake the waiter so it can observe it.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        let mut pending = self.inner.pending.lock().unwrap();
        *pending = true;
        self.inner.cv.notify_all();
    }
}

impl Waiter {
    /// Block until a tick is notified or the channel shuts down.
    pub fn wait(&self) -> TickResult<()> {
        let mut pending = self.inner.pending.lock().unwrap();
        while !*pending {
            pending = self.inner.cv.wait(pending).unwrap();
        }
        *pending = false;
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(TickChannelError::ShutDown);
        }
        Ok(())
    }

    /// Block until a tick is notified, shutdown occurs, or `timeout` elapses.
    ///
    /// Returns `Ok(true)` if a tick was observed, `Ok(false)` on a bare
    /// timeout (no tick, no shutdown).
    pub fn wait_timeout(&self, timeout: Duration) -> TickResult<bool> {
        let (mut pending, result) = self
            .inner
            .cv
            .wait_timeout_while(self.inner.pending.lock().unwrap(), timeout, |p| !*p)
            .unwrap();
        if !*pending {
            return Ok(false);
        }
        *pending = false;
        drop(result);
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(TickChannelError::ShutDown);
        }
        Ok(true)
    }

    /// True once shutdown has been signalled, independent of pending ticks.
    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::thread;

    #[test]
    fn wait_blocks_until_notified() {
        let (notifier, waiter) = tick_channel();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            notifier.notify();
        });
        waiter.wait().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn notifications_coalesce() {
        let (notifier, waiter) = tick_channel();
        notifier.notify();
        notifier.notify();
        notifier.notify();
        // Three notifications before any wait collapse into a single wakeup.
        waiter.wait().unwrap();
        assert_eq!(
            waiter.wait_timeout(Duration::from_millis(10)).unwrap(),
            false
        );
    }

    #[test]
    fn shutdown_unblocks_waiter() {
        let (notifier, waiter) = tick_channel();
        let handle = thread::spawn(move || {
            notifier.shutdown();
        });
        handle.join().unwrap();
        assert_eq!(waiter.wait(), Err(TickChannelError::ShutDown));
        assert!(waiter.is_shut_down());
    }

    #[test]
    fn wait_timeout_returns_false_without_notification() {
        let (_notifier, waiter) = tick_channel();
        assert_eq!(
            waiter.wait_timeout(Duration::from_millis(10)).unwrap(),
            false
        );
    }
}
