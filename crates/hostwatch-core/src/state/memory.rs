// # Memory Host Store
//
// In-memory implementation of HostStore.
//
// ## Crash Behavior
//
// - All reachability state is lost on restart
// - A host that was mid-episode starts counting failures from zero again
//   and may re-send its Unreachable notification
//
// ## When to Use
//
// - Tests and embedding
// - Deployments where the control plane persists hosts itself

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::Host;
use crate::traits::HostStore;

/// In-memory host store implementation
///
/// # Example
///
/// ```rust,no_run
/// use hostwatch_core::model::Host;
/// use hostwatch_core::state::MemoryHostStore;
/// use hostwatch_core::traits::HostStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryHostStore::with_hosts(vec![Host::new(1, "edge-1", 10)]);
///
///     let host = store.get_host(1).await?;
///     assert_eq!(host.map(|h| h.name), Some("edge-1".to_string()));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryHostStore {
    inner: Arc<RwLock<BTreeMap<u64, Host>>>,
}

impl MemoryHostStore {
    /// Create a new empty memory host store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with hosts
    pub fn with_hosts(hosts: impl IntoIterator<Item = Host>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(hosts.into_iter().map(|h| (h.id, h)).collect())),
        }
    }

    /// Get the number of hosts in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[async_trait]
impl HostStore for MemoryHostStore {
    async fn get_host(&self, host_id: u64) -> Result<Option<Host>, Error> {
        Ok(self.inner.read().await.get(&host_id).cloned())
    }

    async fn save_host(&self, host: &Host) -> Result<(), Error> {
        self.inner.write().await.insert(host.id, host.clone());
        Ok(())
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, Error> {
        Ok(self.inner.read().await.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Nothing buffered
        Ok(())
    }
}
