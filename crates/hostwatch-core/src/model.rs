//! Records read and updated by a reconciliation pass
//!
//! Hosts and resources are created and destroyed by external provisioning.
//! This crate only reads them and updates their status and latch fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status value for a resource with no live container
pub const STATUS_EXITED: &str = "exited";

/// Compose the stored status of a live container: `"<runState> (<health>)"`
pub fn container_status(run_state: &str, health_state: &str) -> String {
    format!("{} ({})", run_state, health_state)
}

/// A managed machine whose container runtime is polled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    /// Host id
    pub id: u64,
    /// Display name used in notifications
    pub name: String,
    /// Owning team, the addressee of every notification
    pub team_id: u64,
    /// Transport target (ssh destination); `None` means the local machine
    #[serde(default)]
    pub address: Option<String>,
    /// Consecutive failed probes not yet acted upon
    #[serde(default)]
    pub unreachable_count: u32,
    /// Latch: an Unreachable notification was sent for the current episode
    #[serde(default)]
    pub unreachable_notified: bool,
    /// Last known reachability
    #[serde(default = "default_true")]
    pub reachable: bool,
    /// Whether the host may receive workloads
    #[serde(default = "default_true")]
    pub usable: bool,
    /// Run state of the proxy container, as last observed
    #[serde(default)]
    pub proxy_status: Option<String>,
    /// Time of the last connectivity probe
    #[serde(default)]
    pub last_probe_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Host {
    /// Create a reachable host with a clean counter and latch
    pub fn new(id: u64, name: impl Into<String>, team_id: u64) -> Self {
        Self {
            id,
            name: name.into(),
            team_id,
            address: None,
            unreachable_count: 0,
            unreachable_notified: false,
            reachable: true,
            usable: true,
            proxy_status: None,
            last_probe_at: None,
        }
    }

    /// Set the transport target
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

fn default_true() -> bool {
    true
}

/// Project/environment linkage used to build dashboard deep links
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentLink {
    /// Project uuid
    #[serde(default)]
    pub project_uuid: Option<String>,
    /// Environment name
    #[serde(default)]
    pub environment_name: Option<String>,
}

/// A logical deployed unit tracked against container reality
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedResource {
    pub id: u64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fqdn: Option<String>,
    /// `"<runState> (<health>)"` or `"exited"`
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub environment: EnvironmentLink,
}

impl ManagedResource {
    /// Create a resource with status `exited` and no linkage
    pub fn new(id: u64) -> Self {
        Self {
            id,
            uuid: None,
            name: None,
            fqdn: None,
            status: default_status(),
            environment: EnvironmentLink::default(),
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_fqdn(mut self, fqdn: impl Into<String>) -> Self {
        self.fqdn = Some(fqdn.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_environment(
        mut self,
        project_uuid: impl Into<String>,
        environment_name: impl Into<String>,
    ) -> Self {
        self.environment = EnvironmentLink {
            project_uuid: Some(project_uuid.into()),
            environment_name: Some(environment_name.into()),
        };
        self
    }

    /// Whether the stored status is `exited`
    pub fn is_exited(&self) -> bool {
        self.status == STATUS_EXITED
    }

    /// Name shown in stop notifications: `name (fqdn)`, `name`, or `fqdn`
    pub fn display_name(&self) -> String {
        let name = self.name.as_deref().filter(|n| !n.is_empty());
        let fqdn = self.fqdn.as_deref().filter(|f| !f.is_empty());
        match (name, fqdn) {
            (Some(name), Some(fqdn)) => format!("{} ({})", name, fqdn),
            (Some(name), None) => name.to_string(),
            (None, Some(fqdn)) => fqdn.to_string(),
            (None, None) => format!("#{}", self.id),
        }
    }
}

fn default_status() -> String {
    STATUS_EXITED.to_string()
}

/// A preview deployment of an application for one pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub application_id: u64,
    pub pull_request_id: u64,
    /// Parent application uuid, used for the deep link
    #[serde(default)]
    pub application_uuid: Option<String>,
    /// Preview record; its environment is the parent application's
    pub resource: ManagedResource,
}

/// A composed service with nested sub-resources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: u64,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub environment: EnvironmentLink,
    #[serde(default)]
    pub applications: Vec<ManagedResource>,
    #[serde(default)]
    pub databases: Vec<ManagedResource>,
}

impl Service {
    /// Sub-resources of one kind
    pub fn components(&self, sub_type: ServiceSubType) -> &[ManagedResource] {
        match sub_type {
            ServiceSubType::Application => &self.applications,
            ServiceSubType::Database => &self.databases,
        }
    }
}

/// Kind of a service sub-resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceSubType {
    Application,
    Database,
}

impl ServiceSubType {
    /// Parse the `service.subType` label value
    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "application" => Some(Self::Application),
            "database" => Some(Self::Database),
            _ => None,
        }
    }
}

/// Everything a host owns, as returned by the resource repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostResources {
    #[serde(default)]
    pub applications: Vec<ManagedResource>,
    #[serde(default)]
    pub previews: Vec<Preview>,
    #[serde(default)]
    pub databases: Vec<ManagedResource>,
    #[serde(default)]
    pub services: Vec<Service>,
}

/// Identity of a resource whose status can be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceRef {
    Application { id: u64 },
    Preview { id: u64 },
    Database { id: u64 },
    ServiceComponent {
        service_id: u64,
        sub_type: ServiceSubType,
        id: u64,
    },
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Application { id } => write!(f, "application#{}", id),
            ResourceRef::Preview { id } => write!(f, "preview#{}", id),
            ResourceRef::Database { id } => write!(f, "database#{}", id),
            ResourceRef::ServiceComponent {
                service_id,
                sub_type,
                id,
            } => write!(f, "service#{}/{:?}#{}", service_id, sub_type, id),
        }
    }
}

/// A planned status write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub resource: ResourceRef,
    pub status: String,
}

/// Notification events, each addressed to the host's owning team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// The host failed enough consecutive probes to be confirmed down
    Unreachable { host_id: u64, host_name: String },
    /// A host previously reported unreachable answered a probe
    Revived { host_id: u64, host_name: String },
    /// A supervised container was (re)started
    ContainerRestarted {
        container_name: String,
        host_id: u64,
        host_name: String,
    },
    /// A tracked resource has no live container any more
    ContainerStopped {
        container_name: String,
        host_id: u64,
        host_name: String,
        url: Option<String>,
    },
}

impl Notification {
    pub fn unreachable(host: &Host) -> Self {
        Self::Unreachable {
            host_id: host.id,
            host_name: host.name.clone(),
        }
    }

    pub fn revived(host: &Host) -> Self {
        Self::Revived {
            host_id: host.id,
            host_name: host.name.clone(),
        }
    }

    pub fn container_restarted(container_name: impl Into<String>, host: &Host) -> Self {
        Self::ContainerRestarted {
            container_name: container_name.into(),
            host_id: host.id,
            host_name: host.name.clone(),
        }
    }

    pub fn container_stopped(
        container_name: impl Into<String>,
        host: &Host,
        url: Option<String>,
    ) -> Self {
        Self::ContainerStopped {
            container_name: container_name.into(),
            host_id: host.id,
            host_name: host.name.clone(),
            url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_status_format() {
        assert_eq!(container_status("running", "healthy"), "running (healthy)");
    }

    #[test]
    fn test_display_name_variants() {
        let both = ManagedResource::new(1).with_name("web").with_fqdn("https://a.io");
        assert_eq!(both.display_name(), "web (https://a.io)");

        let fqdn_only = ManagedResource::new(2).with_fqdn("https://b.io");
        assert_eq!(fqdn_only.display_name(), "https://b.io");

        let name_only = ManagedResource::new(3).with_name("postgres");
        assert_eq!(name_only.display_name(), "postgres");

        assert_eq!(ManagedResource::new(4).display_name(), "#4");
    }

    #[test]
    fn test_host_deserializes_with_defaults() {
        let host: Host = serde_json::from_str(r#"{"id": 1, "name": "edge", "team_id": 9}"#).unwrap();
        assert_eq!(host, Host::new(1, "edge", 9));
    }

    #[test]
    fn test_sub_type_labels() {
        assert_eq!(
            ServiceSubType::from_label("application"),
            Some(ServiceSubType::Application)
        );
        assert_eq!(
            ServiceSubType::from_label("database"),
            Some(ServiceSubType::Database)
        );
        assert_eq!(ServiceSubType::from_label("worker"), None);
    }
}
