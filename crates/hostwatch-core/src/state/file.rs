// # File Host Store
//
// File-based implementation of HostStore with crash recovery.
//
// ## Purpose
//
// Keeps the reachability state of every host (failure counter, latch,
// flags, proxy status) across daemon restarts, so a restart in the middle
// of an unreachable episode neither resets the hysteresis nor re-sends the
// Unreachable notification.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Automatic backup: `.backup` keeps the previous good state
// - Recovery: a file that fails to parse is replaced by its backup
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "hosts": {
//     "1": {
//       "id": 1,
//       "name": "edge-1",
//       "team_id": 10,
//       "unreachable_count": 2,
//       "unreachable_notified": false,
//       "reachable": false,
//       "usable": true
//     }
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::model::Host;
use crate::traits::HostStore;

/// Host file format version
const HOST_FILE_VERSION: &str = "1.0";

/// File-based host store with crash recovery
///
/// Every `save_host` is written through to disk before returning.
///
/// # Example
///
/// ```rust,no_run
/// use hostwatch_core::model::Host;
/// use hostwatch_core::state::FileHostStore;
/// use hostwatch_core::traits::HostStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileHostStore::new("/var/lib/hostwatch/hosts.json").await?;
///
///     store.save_host(&Host::new(1, "edge-1", 10)).await?;
///     let host = store.get_host(1).await?;
///     assert!(host.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileHostStore {
    path: PathBuf,
    state: Arc<RwLock<FileState>>,
}

#[derive(Debug)]
struct FileState {
    hosts: BTreeMap<u64, Host>,
    dirty: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct HostFileFormat {
    version: String,
    hosts: BTreeMap<u64, Host>,
}

impl FileHostStore {
    /// Create or load a file host store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing file
    /// 3. Fall back to the backup if the file is corrupted
    /// 4. Start empty if neither can be read
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let hosts = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: Arc::new(RwLock::new(FileState {
                hosts,
                dirty: false,
            })),
        })
    }

    /// Seed a host record only if none exists yet
    ///
    /// Used at startup so configured hosts keep their persisted
    /// reachability state.
    pub async fn ensure_host(&self, host: &Host) -> Result<(), Error> {
        let inserted = {
            let mut guard = self.state.write().await;
            if guard.hosts.contains_key(&host.id) {
                false
            } else {
                guard.hosts.insert(host.id, host.clone());
                guard.dirty = true;
                true
            }
        };

        if inserted {
            self.write_state().await
        } else {
            Ok(())
        }
    }

    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<u64, Host>, Error> {
        match Self::load(path).await {
            Ok(hosts) => {
                tracing::debug!("Loaded {} host record(s) from {}", hosts.len(), path.display());
                Ok(hosts)
            }
            Err(Error::Parse(msg)) => {
                tracing::warn!("Host file appears corrupted: {}. Attempting recovery from backup.", msg);

                let backup_path = Self::backup_path(path);
                if !backup_path.exists() {
                    tracing::warn!("No backup file found. Starting with empty host state.");
                    return Ok(BTreeMap::new());
                }

                match Self::load(&backup_path).await {
                    Ok(hosts) => {
                        tracing::info!("Recovered {} host record(s) from backup", hosts.len());
                        if let Err(e) = fs::copy(&backup_path, path).await {
                            tracing::error!("Failed to restore host file from backup: {}", e);
                        }
                        Ok(hosts)
                    }
                    Err(e) => {
                        tracing::error!("Backup also unreadable: {}. Starting with empty host state.", e);
                        Ok(BTreeMap::new())
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn load(path: &Path) -> Result<BTreeMap<u64, Host>, Error> {
        if !path.exists() {
            tracing::debug!("Host file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::host_store(format!("Failed to read host file {}: {}", path.display(), e))
        })?;

        let file: HostFileFormat = serde_json::from_str(&content).map_err(|e| {
            Error::parse(format!("Failed to parse host file {}: {}", path.display(), e))
        })?;

        if file.version != HOST_FILE_VERSION {
            tracing::warn!(
                "Host file version mismatch: expected {}, got {}. Attempting to load anyway.",
                HOST_FILE_VERSION,
                file.version
            );
        }

        Ok(file.hosts)
    }

    async fn write_state(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;

        let file = HostFileFormat {
            version: HOST_FILE_VERSION.to_string(),
            hosts: guard.hosts.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let temp_path = self.temp_path();
        {
            let mut handle = fs::File::create(&temp_path).await.map_err(|e| {
                Error::host_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            handle.write_all(json.as_bytes()).await.map_err(|e| {
                Error::host_store(format!(
                    "Failed to write temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            handle.flush().await?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::host_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        guard.dirty = false;
        tracing::trace!("Host state written to {}", self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl HostStore for FileHostStore {
    async fn get_host(&self, host_id: u64) -> Result<Option<Host>, Error> {
        let guard = self.state.read().await;
        Ok(guard.hosts.get(&host_id).cloned())
    }

    async fn save_host(&self, host: &Host) -> Result<(), Error> {
        {
            let mut guard = self.state.write().await;
            guard.hosts.insert(host.id, host.clone());
            guard.dirty = true;
        }

        self.write_state().await
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, Error> {
        let guard = self.state.read().await;
        Ok(guard.hosts.values().cloned().collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        let dirty = self.state.read().await.dirty;
        if dirty { self.write_state().await } else { Ok(()) }
    }
}
