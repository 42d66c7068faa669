/*!
 * Condition Variable
 *
 * Monitor-style wait/notify scoped to an `ExclusiveLock`. The waiter
 * registers in the park bucket first and releases the lock from the
 * before-sleep callback, so a notifier that changes the condition under the
 * lock can never slip its wakeup into the release-to-park window.
 */

use super::ExclusiveLock;
use parking_lot_core::{park, unpark_all, unpark_one, ParkResult, ParkToken, UnparkToken};
use std::sync::atomic::AtomicU32;
use std::time::{Duration, Instant};

/// Condition variable bound to one lock's critical section
///
/// Callers must hold the lock when calling `wait`/`wait_for`, and should
/// hold it while changing the awaited condition before notifying. Wakeups
/// may be spurious; always re-check the condition in a loop:
///
/// ```
/// use priosync::ExclusiveLock;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// let lock = ExclusiveLock::new();
/// let cond = lock.condition();
/// let ready = AtomicBool::new(true);
///
/// lock.acquire();
/// while !ready.load(Ordering::Relaxed) {
///     cond.wait();
/// }
/// lock.release();
/// ```
pub struct Condition<'a> {
    lock: &'a ExclusiveLock,
    /// Park anchor; its address keys this condition's wait set
    anchor: AtomicU32,
}

impl<'a> Condition<'a> {
    pub(super) fn new(lock: &'a ExclusiveLock) -> Self {
        Self {
            lock,
            anchor: AtomicU32::new(0),
        }
    }

    #[inline]
    fn park_addr(&self) -> usize {
        &self.anchor as *const AtomicU32 as usize
    }

    /// Suspend until notified, releasing the lock while parked
    ///
    /// The lock is re-acquired before returning, whether the wakeup was
    /// genuine or spurious.
    pub fn wait(&self) {
        self.wait_internal(None);
    }

    /// Suspend until notified or the timeout expires
    ///
    /// Returns `true` if woken by a notify, `false` on timeout. The lock is
    /// re-acquired before returning in both cases.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.wait_internal(Some(Instant::now() + timeout))
    }

    fn wait_internal(&self, deadline: Option<Instant>) -> bool {
        debug_assert!(
            self.lock.is_locked(),
            "Condition::wait called without holding the lock"
        );
        let result = unsafe {
            park(
                self.park_addr(),
                || true,
                || {
                    // Runs after bucket registration: a notifier still
                    // waiting on the lock will find us parked.
                    self.lock.release();
                },
                |_unpark_token, _was_last| {},
                ParkToken(0),
                deadline,
            )
        };

        self.lock.acquire();
        matches!(result, ParkResult::Unparked(_))
    }

    /// Wake one waiter; returns whether anything was woken
    pub fn notify_one(&self) -> bool {
        let result = unsafe { unpark_one(self.park_addr(), |_| UnparkToken(0)) };
        result.unparked_threads > 0
    }

    /// Wake all waiters; returns how many were woken
    pub fn notify_all(&self) -> usize {
        unsafe { unpark_all(self.park_addr(), UnparkToken(0)) }
    }
}
