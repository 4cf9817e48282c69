// # Proxy Control Trait
//
// Defines the operations the proxy supervisor delegates to the host:
// deciding whether an absent proxy should be started, starting it, and
// attaching it to the networks it must serve.

use async_trait::async_trait;

use crate::model::Host;

/// Trait for proxy control implementations
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Run container runtime commands on the host
///
/// ## Forbidden Capabilities
/// - ❌ Send notifications (owned by `ProxySupervisor`)
/// - ❌ Retry a failed start (the next pass observes the proxy again)
#[async_trait]
pub trait ProxyControl: Send + Sync {
    /// Whether an absent proxy should be (re)started on this host
    async fn should_start(&self, host: &Host) -> Result<bool, crate::Error>;

    /// Start the proxy container
    async fn start(&self, host: &Host) -> Result<(), crate::Error>;

    /// Attach the proxy to every required network
    ///
    /// # Idempotency
    ///
    /// Must be safe to repeat every pass; a network already attached is a no-op.
    async fn attach_networks(&self, host: &Host) -> Result<(), crate::Error>;
}
