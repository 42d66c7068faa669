/*!
 * Cancellation Token
 *
 * Cooperative cancellation for interruptible lock acquisition. Cancelling a
 * token sets a flag and unparks every waiter registered against it; woken
 * waiters observe the flag and bail out with `LockError::Interrupted`.
 * Waiters on the same park address that were not cancelled treat the wake
 * as spurious and re-park.
 */

use parking_lot::Mutex;
use parking_lot_core::{unpark_all, UnparkToken};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Shareable cancellation signal
///
/// Cloning is cheap; all clones observe the same flag. A token is one-shot:
/// once cancelled it stays cancelled.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    /// Park addresses of waiters currently blocked against this token
    parked: Mutex<Vec<usize>>,
}

impl CancelToken {
    /// Create a new, un-cancelled token
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the token has been cancelled
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Cancel the token and wake every registered waiter
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);

        let parked = self.inner.parked.lock();
        if !parked.is_empty() {
            trace!(waiters = parked.len(), "cancelling parked waiters");
        }
        for &addr in parked.iter() {
            // Wakes every thread parked on this address; non-cancelled
            // waiters revalidate and re-park.
            unsafe {
                unpark_all(addr, UnparkToken(1));
            }
        }
    }

    /// Register a park address for the duration of a blocking attempt
    ///
    /// The registration is removed when the returned guard drops, so a
    /// finished (or timed out) attempt never leaks a stale address.
    pub(crate) fn register(&self, addr: usize) -> Registration<'_> {
        self.inner.parked.lock().push(addr);
        Registration { token: self, addr }
    }

    fn deregister(&self, addr: usize) {
        let mut parked = self.inner.parked.lock();
        if let Some(pos) = parked.iter().position(|&a| a == addr) {
            parked.swap_remove(pos);
        }
    }
}

/// RAII registration of a waiter's park address
pub(crate) struct Registration<'a> {
    token: &'a CancelToken,
    addr: usize,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.token.deregister(self.addr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_sticky() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        token.cancel();
        assert!(token.is_cancelled());

        // Cancelling again is a no-op
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();

        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_registration_cleanup() {
        let token = CancelToken::new();
        {
            let _reg = token.register(0xdead);
            assert_eq!(token.inner.parked.lock().len(), 1);
        }
        assert!(token.inner.parked.lock().is_empty());
    }
}
