//! Per-host single-flight locking
//!
//! A pass for a host that is already being reconciled is dropped, never
//! queued. [`MemoryHostLock`] covers a single process; a deployment running
//! several workers implements [`HostLock`] on top of shared storage.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::Error;
use crate::traits::HostLock;

/// In-process host lock
#[derive(Debug, Clone, Default)]
pub struct MemoryHostLock {
    held: Arc<Mutex<HashSet<u64>>>,
}

impl MemoryHostLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pass currently holds the lock for `host_id`
    pub fn is_held(&self, host_id: u64) -> bool {
        self.held
            .lock()
            .map(|held| held.contains(&host_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl HostLock for MemoryHostLock {
    async fn try_acquire(&self, host_id: u64) -> Result<bool, Error> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| Error::lock("host lock poisoned"))?;
        Ok(held.insert(host_id))
    }

    async fn release(&self, host_id: u64) -> Result<(), Error> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| Error::lock("host lock poisoned"))?;
        held.remove(&host_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let lock = MemoryHostLock::new();

        assert!(tokio_test::block_on(lock.try_acquire(1)).unwrap());
        assert!(!tokio_test::block_on(lock.try_acquire(1)).unwrap());
        assert!(tokio_test::block_on(lock.try_acquire(2)).unwrap());
        assert!(lock.is_held(1));

        tokio_test::block_on(lock.release(1)).unwrap();
        assert!(!lock.is_held(1));
        assert!(tokio_test::block_on(lock.try_acquire(1)).unwrap());
    }

    #[test]
    fn test_clones_share_state() {
        let lock = MemoryHostLock::new();
        let other = lock.clone();

        assert!(tokio_test::block_on(lock.try_acquire(7)).unwrap());
        assert!(!tokio_test::block_on(other.try_acquire(7)).unwrap());
    }
}
