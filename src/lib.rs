/*!
 * priosync
 *
 * Hand-built blocking primitives: an exclusive lock assembled from a
 * compare-and-swap state word plus a park/unpark wait queue, and a
 * priority-ordered transfer queue with direct producer-to-consumer handoff.
 *
 * # Architecture
 *
 * - `lock`: CAS-first mutual exclusion with try/blocking/timed/interruptible
 *   acquisition and an associated condition variable.
 * - `queue`: unbounded priority queue where a producer can hand an element
 *   straight to an already-waiting consumer, bypassing the buffered store.
 *
 * # Performance
 *
 * - Lock-free fast paths (single CAS when uncontended)
 * - Bounded adaptive spinning before parking
 * - Real blocking via parking_lot primitives, never unbounded spinning
 */

pub mod cancel;
pub mod config;
pub mod errors;
pub mod lock;
pub mod queue;

// Re-exports
pub use cancel::CancelToken;
pub use config::SyncConfig;
pub use errors::{LockError, LockResult};
pub use lock::{Condition, ExclusiveLock};
pub use queue::PriorityTransferQueue;
