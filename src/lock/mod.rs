/*!
 * Exclusive Lock
 *
 * Non-reentrant mutual exclusion built from a single atomic state word and
 * parking_lot_core's park/unpark wait queue.
 *
 * # Design
 *
 * The state word has three values: FREE, HELD, and CONTENDED (held with
 * waiters, possibly stale). Uncontended acquisition is one CAS; uncontended
 * release is one CAS with no syscall. A contended acquirer spins briefly,
 * then publishes CONTENDED and parks on the state word's address. The park
 * validation callback re-checks the state under the bucket lock, so a
 * release landing between the publish and the park cannot be missed.
 *
 * Waiters parked on the same address are woken in FIFO order, but a freshly
 * arriving thread may still win the CAS before a woken waiter retries. No
 * fairness beyond FIFO park order is guaranteed.
 *
 * # Safety contract
 *
 * Ownership is not tracked: the lock cannot tell which thread acquired it,
 * and it is not reentrant. Pairing `acquire` with `release` is the caller's
 * responsibility; a `release` that finds the lock free reports `false`
 * instead of corrupting state.
 */

mod condition;

pub use condition::Condition;

use crate::cancel::CancelToken;
use crate::config::SyncConfig;
use crate::errors::{LockError, LockResult};
use parking_lot_core::{park, unpark_one, ParkResult, ParkToken, UnparkToken};
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::trace;

/// Lock is available
const FREE: u32 = 0;
/// Lock is held, no waiters recorded
const HELD: u32 = 1;
/// Lock is held and at least one waiter parked (or parking)
const CONTENDED: u32 = 2;

/// Why a bounded slow-path attempt gave up
enum Unacquired {
    TimedOut,
    Interrupted,
}

/// CAS-first mutual exclusion lock with a parked FIFO wait queue
#[repr(C, align(64))]
pub struct ExclusiveLock {
    state: AtomicU32,
    config: SyncConfig,
}

impl ExclusiveLock {
    /// Create a lock with default spin tuning
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    /// Create a lock with explicit spin tuning
    pub fn with_config(config: SyncConfig) -> Self {
        Self {
            state: AtomicU32::new(FREE),
            config,
        }
    }

    /// Attempt the CAS once without blocking
    #[inline]
    pub fn try_acquire(&self) -> bool {
        self.state
            .compare_exchange(FREE, HELD, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Block until the lock is acquired
    ///
    /// Fast path is a single CAS; on contention the thread spins briefly,
    /// then parks until a release wakes it. Spurious wakeups are absorbed by
    /// the retry loop.
    pub fn acquire(&self) {
        if self.try_acquire() {
            return;
        }
        // Infallible without a deadline or cancel token.
        let _ = self.acquire_slow(None, None);
    }

    /// Block until acquired or the token is cancelled
    ///
    /// A cancelled attempt returns `Err(LockError::Interrupted)` and leaves
    /// the lock exactly as if the call had never been made.
    pub fn acquire_interruptibly(&self, cancel: &CancelToken) -> LockResult<()> {
        if cancel.is_cancelled() {
            return Err(LockError::Interrupted);
        }
        if self.try_acquire() {
            return Ok(());
        }
        self.acquire_slow(None, Some(cancel)).map_err(|_| LockError::Interrupted)
    }

    /// Block until acquired or the timeout expires
    ///
    /// Expiry is a normal outcome, reported as `false`.
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        if self.try_acquire() {
            return true;
        }
        let deadline = Instant::now() + timeout;
        self.acquire_slow(Some(deadline), None).is_ok()
    }

    /// Release the lock
    ///
    /// Returns `false` if the lock was not held (mismatched release);
    /// nothing is woken and no state changes in that case. On a successful
    /// contended release exactly one parked waiter is unparked.
    pub fn release(&self) -> bool {
        loop {
            match self.state.load(Ordering::Relaxed) {
                FREE => return false,
                HELD => {
                    if self
                        .state
                        .compare_exchange(HELD, FREE, Ordering::Release, Ordering::Relaxed)
                        .is_ok()
                    {
                        return true;
                    }
                }
                _ => {
                    if self
                        .state
                        .compare_exchange(CONTENDED, FREE, Ordering::Release, Ordering::Relaxed)
                        .is_ok()
                    {
                        // CONTENDED may be stale (a timed waiter gave up);
                        // an unpark with no parked thread is a no-op.
                        unsafe {
                            unpark_one(self.park_addr(), |_| UnparkToken(0));
                        }
                        return true;
                    }
                }
            }
        }
    }

    /// Snapshot of whether the lock is currently held (advisory)
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != FREE
    }

    /// Create a condition variable scoped to this lock
    ///
    /// Threads coordinating through the condition must share the same
    /// `Condition` instance.
    pub fn condition(&self) -> Condition<'_> {
        Condition::new(self)
    }

    /// Stable park address: the state word itself
    #[inline]
    pub(crate) fn park_addr(&self) -> usize {
        &self.state as *const AtomicU32 as usize
    }

    /// Contended path: spin, publish contention, park, retry
    fn acquire_slow(
        &self,
        deadline: Option<Instant>,
        cancel: Option<&CancelToken>,
    ) -> Result<(), Unacquired> {
        let addr = self.park_addr();
        // Keep the token pointed at our park address for as long as we may
        // block; dropped (deregistered) on every exit path.
        let _registration = cancel.map(|token| token.register(addr));

        let spin_start = Instant::now();
        let mut spins: u32 = 0;

        loop {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    // A release may have spent its single wakeup on us while
                    // the cancel landed; hand it on so a non-cancelled waiter
                    // is not left parked on a free lock. No-op if the bucket
                    // is empty.
                    unsafe {
                        unpark_one(addr, |_| UnparkToken(0));
                    }
                    return Err(Unacquired::Interrupted);
                }
            }

            // Adaptive spin phase: short holds resolve here without a syscall.
            if spins < self.config.max_spins && spin_start.elapsed() < self.config.spin_duration {
                if self.try_acquire() {
                    return Ok(());
                }
                if spins % 10 == 0 {
                    thread::yield_now();
                }
                spins += 1;
                continue;
            }

            // Publish contention. If the word was FREE, the swap itself took
            // the lock (leaving CONTENDED, so our release will unpark).
            if self.state.swap(CONTENDED, Ordering::Acquire) == FREE {
                return Ok(());
            }

            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return Err(Unacquired::TimedOut);
                }
            }

            trace!(addr, "parking contended acquirer");
            let result = unsafe {
                park(
                    addr,
                    || {
                        // Runs under the bucket lock: only sleep if the lock
                        // is still marked contended and the token has not
                        // fired. A release that raced us fails the state
                        // check; a cancel that raced us fails the token
                        // check (its unpark_all takes the same bucket lock,
                        // so the flag store is visible here). Either way we
                        // retry instead of sleeping through the wakeup.
                        self.state.load(Ordering::Relaxed) == CONTENDED
                            && !cancel.is_some_and(|token| token.is_cancelled())
                    },
                    || {},
                    |_unpark_token, _was_last| {},
                    ParkToken(0),
                    deadline,
                )
            };

            if let ParkResult::TimedOut = result {
                if deadline.is_some_and(|d| Instant::now() >= d) {
                    return Err(Unacquired::TimedOut);
                }
            }
            // Unparked, invalid, or spurious: loop and retry the swap.
        }
    }
}

impl Default for ExclusiveLock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExclusiveLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExclusiveLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}
