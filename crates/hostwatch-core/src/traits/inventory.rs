// # Inventory Source Trait
//
// Defines the interface for fetching the raw container inventory of a host.
//
// The fetch is two-phase, mirroring the container runtime CLI:
// 1. list the ids of running containers
// 2. inspect those ids, one JSON document per line
//
// Parsing the inspect output into typed descriptors is owned by
// [`crate::inventory::ContainerInventory`], not by implementations.

use async_trait::async_trait;

use crate::model::Host;

/// Trait for inventory source implementations
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Run the container runtime's list/inspect commands on the host
///
/// ## Forbidden Capabilities
/// - ❌ Interpret labels or statuses (owned by the core)
/// - ❌ Retry on failure (an error simply ends the pass)
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// List ids of the running containers on the host
    ///
    /// An empty list is a valid answer and ends the pass quietly.
    async fn list_container_ids(&self, host: &Host) -> Result<Vec<String>, crate::Error>;

    /// Inspect the given containers
    ///
    /// # Returns
    ///
    /// Newline-delimited JSON, one inspect document per container.
    async fn inspect(&self, host: &Host, ids: &[String]) -> Result<String, crate::Error>;
}
