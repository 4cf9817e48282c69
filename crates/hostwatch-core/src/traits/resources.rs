// # Resource Repository Trait
//
// Typed, host-scoped read access to the logical resources a host owns,
// plus the single write this crate performs on them: the status field.
//
// ## Implementations
//
// - In-memory: `MemoryResourceStore`
// - Future: the control plane's database

use async_trait::async_trait;

use crate::model::{HostResources, ManagedResource, Preview, ResourceRef, Service};

/// Trait for resource repository implementations
///
/// Implementations never create or delete records; provisioning owns that.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    /// Applications deployed on the host
    async fn applications(&self, host_id: u64) -> Result<Vec<ManagedResource>, crate::Error>;

    /// Preview deployments on the host
    async fn previews(&self, host_id: u64) -> Result<Vec<Preview>, crate::Error>;

    /// Standalone databases on the host
    async fn databases(&self, host_id: u64) -> Result<Vec<ManagedResource>, crate::Error>;

    /// Services on the host, with their sub-resources
    async fn services(&self, host_id: u64) -> Result<Vec<Service>, crate::Error>;

    /// Write the status field of one resource
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Written
    /// - `Err(Error::NotFound)`: The record disappeared
    async fn set_status(&self, resource: &ResourceRef, status: &str)
    -> Result<(), crate::Error>;

    /// Load every resource kind for the host in one go
    async fn load(&self, host_id: u64) -> Result<HostResources, crate::Error> {
        Ok(HostResources {
            applications: self.applications(host_id).await?,
            previews: self.previews(host_id).await?,
            databases: self.databases(host_id).await?,
            services: self.services(host_id).await?,
        })
    }
}
