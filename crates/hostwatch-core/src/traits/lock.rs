// # Host Lock Trait
//
// Per-host single-flight: at most one pass per host may be in flight,
// system-wide. A second trigger is dropped, never queued or delayed.

use async_trait::async_trait;

/// Trait for per-host mutual exclusion with try-acquire-and-drop semantics
///
/// Implementations must not block waiting for the holder. In-process
/// deployments use `MemoryHostLock`; multi-worker deployments back this
/// with a shared store.
#[async_trait]
pub trait HostLock: Send + Sync {
    /// Try to take the lock for a host
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Acquired; the caller must `release` it
    /// - `Ok(false)`: Another pass holds it; drop this trigger
    /// - `Err(Error)`: Lock backend failure
    async fn try_acquire(&self, host_id: u64) -> Result<bool, crate::Error>;

    /// Release a previously acquired lock
    async fn release(&self, host_id: u64) -> Result<(), crate::Error>;
}
