// # Memory Resource Store
//
// In-memory ResourceRepository keyed by host id.
//
// The daemon loads it from a JSON snapshot exported by the control plane:
//
// ```json
// {
//   "hosts": {
//     "1": {
//       "applications": [{ "id": 42, "uuid": "a1", "name": "web", "status": "running (healthy)" }],
//       "previews": [],
//       "databases": [],
//       "services": []
//     }
//   }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::{HostResources, ManagedResource, Preview, ResourceRef, Service};
use crate::traits::ResourceRepository;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotFormat {
    #[serde(default)]
    hosts: BTreeMap<u64, HostResources>,
}

/// In-memory resource repository
#[derive(Debug, Clone, Default)]
pub struct MemoryResourceStore {
    inner: Arc<RwLock<BTreeMap<u64, HostResources>>>,
}

impl MemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON snapshot file
    pub async fn from_snapshot<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::repository(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse a JSON snapshot
    pub fn from_json(content: &str) -> Result<Self, Error> {
        let snapshot: SnapshotFormat = serde_json::from_str(content)
            .map_err(|e| Error::parse(format!("Invalid resource snapshot: {}", e)))?;

        tracing::debug!("Loaded resources for {} host(s)", snapshot.hosts.len());
        Ok(Self {
            inner: Arc::new(RwLock::new(snapshot.hosts)),
        })
    }

    /// Replace everything a host owns
    pub async fn insert(&self, host_id: u64, resources: HostResources) {
        self.inner.write().await.insert(host_id, resources);
    }

    /// Current resources of a host (empty when unknown)
    pub async fn snapshot(&self, host_id: u64) -> HostResources {
        self.inner
            .read()
            .await
            .get(&host_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn with_host<T>(&self, host_id: u64, f: impl FnOnce(&HostResources) -> T) -> T
    where
        T: Default,
    {
        self.inner.read().await.get(&host_id).map(f).unwrap_or_default()
    }
}

#[async_trait]
impl ResourceRepository for MemoryResourceStore {
    async fn applications(&self, host_id: u64) -> Result<Vec<ManagedResource>, Error> {
        Ok(self.with_host(host_id, |r| r.applications.clone()).await)
    }

    async fn previews(&self, host_id: u64) -> Result<Vec<Preview>, Error> {
        Ok(self.with_host(host_id, |r| r.previews.clone()).await)
    }

    async fn databases(&self, host_id: u64) -> Result<Vec<ManagedResource>, Error> {
        Ok(self.with_host(host_id, |r| r.databases.clone()).await)
    }

    async fn services(&self, host_id: u64) -> Result<Vec<Service>, Error> {
        Ok(self.with_host(host_id, |r| r.services.clone()).await)
    }

    async fn set_status(&self, resource: &ResourceRef, status: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;

        let target = guard
            .values_mut()
            .find_map(|resources| find_mut(resources, resource))
            .ok_or_else(|| Error::not_found(resource.to_string()))?;
        target.status = status.to_string();

        Ok(())
    }
}

fn find_mut<'a>(
    resources: &'a mut HostResources,
    resource: &ResourceRef,
) -> Option<&'a mut ManagedResource> {
    match *resource {
        ResourceRef::Application { id } => resources.applications.iter_mut().find(|a| a.id == id),
        ResourceRef::Preview { id } => resources
            .previews
            .iter_mut()
            .map(|p| &mut p.resource)
            .find(|p| p.id == id),
        ResourceRef::Database { id } => resources.databases.iter_mut().find(|d| d.id == id),
        ResourceRef::ServiceComponent {
            service_id,
            sub_type,
            id,
        } => {
            let service = resources.services.iter_mut().find(|s| s.id == service_id)?;
            let components = match sub_type {
                crate::model::ServiceSubType::Application => &mut service.applications,
                crate::model::ServiceSubType::Database => &mut service.databases,
            };
            components.iter_mut().find(|c| c.id == id)
        }
    }
}
