// # Host Store Trait
//
// Defines the interface for persisting host records.
//
// ## Purpose
//
// The host store carries the reachability state between passes:
// - The consecutive failure counter
// - The unreachable notification latch
// - Reachable/usable flags and the observed proxy status
//
// Losing it only costs hysteresis progress; the next passes rebuild it.
//
// ## Implementations
//
// - File-based: JSON file with atomic writes
// - In-memory: tests and ephemeral deployments

use async_trait::async_trait;

use crate::model::Host;

/// Trait for host store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Passes for different hosts run in parallel and write different records.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, databases, etc.)
/// - ✅ Cache records in memory (with explicit flush)
///
/// ## Forbidden Capabilities
/// - ❌ Decide reachability (owned by `ReachabilityTracker`)
/// - ❌ Create hosts on its own (provisioning owns record lifecycle)
#[async_trait]
pub trait HostStore: Send + Sync {
    /// Get a host record
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Host))`: The record
    /// - `Ok(None)`: No such host
    /// - `Err(Error)`: Storage error
    async fn get_host(&self, host_id: u64) -> Result<Option<Host>, crate::Error>;

    /// Create or replace a host record
    async fn save_host(&self, host: &Host) -> Result<(), crate::Error>;

    /// List all host records
    async fn list_hosts(&self) -> Result<Vec<Host>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
