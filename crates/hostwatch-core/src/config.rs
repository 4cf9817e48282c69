//! Configuration types for the hostwatch system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Main hostwatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostwatchConfig {
    /// Reachability hysteresis settings
    #[serde(default)]
    pub reachability: ReachabilityConfig,

    /// Reverse-proxy supervision settings
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Container label names used for routing
    #[serde(default)]
    pub labels: LabelConfig,

    /// Deep-link construction for stop notifications
    #[serde(default)]
    pub links: LinkConfig,

    /// Pass scheduling
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Host record persistence
    #[serde(default)]
    pub host_store: HostStoreConfig,
}

impl HostwatchConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.reachability.validate()?;
        self.proxy.validate()?;
        self.labels.validate()?;
        self.links.validate()?;
        self.scheduler.validate()?;
        self.host_store.validate()?;

        Ok(())
    }
}

/// Reachability hysteresis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReachabilityConfig {
    /// Consecutive failed probes after which the host is confirmed unreachable
    #[serde(default = "default_unreachable_threshold")]
    pub unreachable_threshold: u32,
}

impl ReachabilityConfig {
    /// Validate the reachability configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.unreachable_threshold == 0 {
            return Err(crate::Error::config("Unreachable threshold must be > 0"));
        }
        Ok(())
    }
}

impl Default for ReachabilityConfig {
    fn default() -> Self {
        Self {
            unreachable_threshold: default_unreachable_threshold(),
        }
    }
}

/// Reverse-proxy supervision configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Reserved name of the proxy container
    #[serde(default = "default_proxy_container_name")]
    pub container_name: String,

    /// Networks the proxy must be attached to
    #[serde(default = "default_proxy_networks")]
    pub networks: Vec<String>,

    /// Whether an absent proxy may be started automatically
    #[serde(default = "default_true")]
    pub auto_start: bool,
}

impl ProxyConfig {
    /// Validate the proxy configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.container_name.trim().is_empty() {
            return Err(crate::Error::config("Proxy container name cannot be empty"));
        }
        if self.networks.iter().any(|n| n.trim().is_empty()) {
            return Err(crate::Error::config("Proxy network names cannot be empty"));
        }
        Ok(())
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            container_name: default_proxy_container_name(),
            networks: default_proxy_networks(),
            auto_start: true,
        }
    }
}

/// Container label naming
///
/// Routing labels are `<prefix>.applicationId`, `<prefix>.pullRequestId`,
/// `<prefix>.serviceId`, `<prefix>.service.subType` and
/// `<prefix>.service.subId`. Databases are identified by the compose
/// service label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    /// Prefix of the routing labels
    #[serde(default = "default_label_prefix")]
    pub prefix: String,

    /// Label carrying the compose service name (a database uuid)
    #[serde(default = "default_compose_service_label")]
    pub compose_service: String,
}

impl LabelConfig {
    /// Validate the label configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.prefix.trim().is_empty() {
            return Err(crate::Error::config("Label prefix cannot be empty"));
        }
        if self.compose_service.trim().is_empty() {
            return Err(crate::Error::config("Compose service label cannot be empty"));
        }
        Ok(())
    }

    /// Fully qualified name of a prefixed label
    pub fn key(&self, name: &str) -> String {
        format!("{}.{}", self.prefix, name)
    }
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            prefix: default_label_prefix(),
            compose_service: default_compose_service_label(),
        }
    }
}

/// Deep-link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Dashboard base URL, e.g. "https://dash.example.com"
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl LinkConfig {
    /// Validate the link configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Base URL must use HTTP or HTTPS scheme. Got: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval between passes for every host (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Capacity of the scheduler event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Validate the scheduler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Scheduler interval must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Host store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostStoreConfig {
    /// File-based host store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory host store (not persistent)
    #[default]
    Memory,
}

impl HostStoreConfig {
    /// Validate the host store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            HostStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Host store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

fn default_unreachable_threshold() -> u32 {
    3
}

fn default_proxy_container_name() -> String {
    "hostwatch-proxy".to_string()
}

fn default_proxy_networks() -> Vec<String> {
    vec!["hostwatch".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_label_prefix() -> String {
    "hostwatch".to_string()
}

fn default_compose_service_label() -> String {
    "com.docker.compose.service".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_interval_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    1000
}
