// # Connectivity Probe Trait
//
// Defines the interface for checking whether a host answers at all.
//
// ## Implementations
//
// - Docker CLI over ssh/local shell: `hostwatch-docker` crate
//
// ## Usage
//
// ```rust,ignore
// use hostwatch_core::ConnectivityProbe;
//
// let reachable = probe.probe(&host).await.unwrap_or(false);
// ```

use async_trait::async_trait;

use crate::model::Host;

/// Trait for connectivity probe implementations
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform transport I/O against the host (ssh, local shell, socket)
/// - ✅ Apply the transport's own timeout
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (the next scheduled pass is the retry)
/// - ❌ Mutate the host record (owned by `ReachabilityTracker`)
/// - ❌ Send notifications
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Probe the host once
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The host answered
    /// - `Ok(false)`: The host did not answer
    /// - `Err(Error)`: The probe itself failed; callers treat this as `false`
    async fn probe(&self, host: &Host) -> Result<bool, crate::Error>;
}
