/*!
 * Error Types
 *
 * Centralized error handling with thiserror.
 *
 * Timeouts are deliberately not errors: timed operations report expiry
 * through their return value (`false`, `None`, or the rejected item), since
 * a bounded wait running out is a normal outcome.
 */

use thiserror::Error;

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;

/// Lock acquisition errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// An interruptible wait was cancelled before the lock was acquired.
    /// The cancelled attempt leaves the lock state untouched.
    #[error("wait was interrupted before the lock was acquired")]
    Interrupted,
}
