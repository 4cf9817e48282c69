//! Typed container inventory
//!
//! One polled snapshot of a host's running containers, parsed from the
//! container runtime's inspect output.
//!
//! ## Input Format
//!
//! Newline-delimited JSON, one inspect document per line (the output of
//! `docker container inspect <ids> --format '{{json .}}'`). A single JSON
//! array of documents is accepted as well.
//!
//! Only the fields the reconciliation needs are read:
//!
//! ```json
//! {
//!   "Id": "4f1c...",
//!   "Name": "/web-42",
//!   "State": { "Status": "running", "Health": { "Status": "healthy" } },
//!   "Config": { "Labels": { "hostwatch.applicationId": "42" } }
//! }
//! ```

use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::model::container_status;

/// Health reported for containers without a health check
pub const DEFAULT_HEALTH: &str = "unhealthy";

/// Run state reported when the runtime omits one
pub const UNKNOWN_RUN_STATE: &str = "unknown";

/// One container in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    pub id: String,
    /// Container name without the runtime's leading `/`
    pub name: String,
    pub run_state: String,
    pub health_state: String,
    pub labels: HashMap<String, String>,
}

impl ContainerDescriptor {
    /// Create a descriptor with default health and no labels
    pub fn new(name: impl Into<String>, run_state: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            run_state: run_state.into(),
            health_state: DEFAULT_HEALTH.to_string(),
            labels: HashMap::new(),
        }
    }

    pub fn with_health(mut self, health_state: impl Into<String>) -> Self {
        self.health_state = health_state.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Composite status stored on the matched resource
    pub fn status(&self) -> String {
        container_status(&self.run_state, &self.health_state)
    }
}

/// A polled snapshot of a host's containers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerInventory {
    containers: Vec<ContainerDescriptor>,
    skipped: usize,
}

impl ContainerInventory {
    /// Build an inventory from already-typed descriptors
    pub fn new(containers: Vec<ContainerDescriptor>) -> Self {
        Self {
            containers,
            skipped: 0,
        }
    }

    /// Parse raw inspect output
    ///
    /// Blank lines are skipped. A malformed document is logged, left out
    /// and counted in [`ContainerInventory::skipped`]; such a snapshot is
    /// incomplete and must not be used to decide what has stopped.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let mut skipped = 0;

        let documents: Vec<RawContainer> = if trimmed.starts_with('[') {
            match serde_json::from_str(trimmed) {
                Ok(documents) => documents,
                Err(e) => {
                    warn!("Discarding malformed inspect array: {}", e);
                    skipped += 1;
                    Vec::new()
                }
            }
        } else {
            trimmed
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .filter_map(|line| match serde_json::from_str(line) {
                    Ok(document) => Some(document),
                    Err(e) => {
                        warn!("Skipping malformed inspect line: {}", e);
                        skipped += 1;
                        None
                    }
                })
                .collect()
        };

        let containers: Vec<ContainerDescriptor> =
            documents.into_iter().map(RawContainer::into_descriptor).collect();
        debug!("Parsed {} container(s) from inspect output", containers.len());

        Self { containers, skipped }
    }

    /// Documents that could not be parsed
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Find a container by exact name
    pub fn find_by_name(&self, name: &str) -> Option<&ContainerDescriptor> {
        self.containers.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContainerDescriptor> {
        self.containers.iter()
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

/// Split the raw output of a container id listing
pub fn parse_container_ids(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawContainer {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    state: Option<RawState>,
    #[serde(default)]
    config: Option<RawConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawState {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    health: Option<RawHealth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawHealth {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawConfig {
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
}

impl RawContainer {
    fn into_descriptor(self) -> ContainerDescriptor {
        let (run_state, health_state) = match self.state {
            Some(state) => (
                state.status,
                state.health.and_then(|health| health.status),
            ),
            None => (None, None),
        };

        ContainerDescriptor {
            id: self.id,
            name: self.name.trim_start_matches('/').to_string(),
            run_state: run_state
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN_RUN_STATE.to_string()),
            health_state: health_state
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_HEALTH.to_string()),
            labels: self.config.and_then(|config| config.labels).unwrap_or_default(),
        }
    }
}
