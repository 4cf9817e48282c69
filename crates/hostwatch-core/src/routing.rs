//! Label-based routing of containers to logical resources
//!
//! Containers carry flat `key -> value` label maps. The router turns that
//! loosely-typed map into an explicit [`RoutingKey`], so the reconciliation
//! engine never looks labels up ad hoc.
//!
//! ## Precedence
//!
//! 1. application id + pull request id → [`RoutingKey::Preview`]
//! 2. application id → [`RoutingKey::Application`]
//! 3. compose service label → [`RoutingKey::Database`]
//! 4. otherwise → [`RoutingKey::Unmatched`]
//!
//! Independently, a service id label adds a
//! [`RoutingKey::ServiceComponent`] next to the primary key.
//!
//! A value that is empty or `"0"` counts as absent; numeric labels that do
//! not parse count as absent too. `pullRequestId=0` is therefore a regular
//! application deployment.

use std::collections::HashMap;

use crate::config::LabelConfig;
use crate::model::ServiceSubType;

/// The resource identity a container represents
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoutingKey {
    Application {
        application_id: u64,
    },
    Preview {
        application_id: u64,
        pull_request_id: u64,
    },
    Database {
        compose_service_uuid: String,
    },
    ServiceComponent {
        service_id: u64,
        sub_type: ServiceSubType,
        sub_id: u64,
    },
    Unmatched,
}

/// Classification of one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    /// Preview, Application, Database or Unmatched
    pub primary: RoutingKey,
    /// ServiceComponent, when the service label set is present
    pub service: Option<RoutingKey>,
}

impl Routes {
    /// Whether no label set matched at all
    pub fn is_unmatched(&self) -> bool {
        self.primary == RoutingKey::Unmatched && self.service.is_none()
    }

    /// Matched keys, primary first
    pub fn keys(&self) -> impl Iterator<Item = &RoutingKey> {
        std::iter::once(&self.primary)
            .filter(|key| **key != RoutingKey::Unmatched)
            .chain(self.service.iter())
    }
}

/// Parses container labels into routing keys
#[derive(Debug, Clone)]
pub struct LabelRouter {
    application_id: String,
    pull_request_id: String,
    service_id: String,
    service_sub_type: String,
    service_sub_id: String,
    compose_service: String,
}

impl LabelRouter {
    /// Create a router for the configured label names
    pub fn new(config: &LabelConfig) -> Self {
        Self {
            application_id: config.key("applicationId"),
            pull_request_id: config.key("pullRequestId"),
            service_id: config.key("serviceId"),
            service_sub_type: config.key("service.subType"),
            service_sub_id: config.key("service.subId"),
            compose_service: config.compose_service.clone(),
        }
    }

    /// Classify a label map
    pub fn route(&self, labels: &HashMap<String, String>) -> Routes {
        Routes {
            primary: self.primary(labels),
            service: self.service(labels),
        }
    }

    fn primary(&self, labels: &HashMap<String, String>) -> RoutingKey {
        if let Some(application_id) = numeric(labels, &self.application_id) {
            return match numeric(labels, &self.pull_request_id) {
                Some(pull_request_id) => RoutingKey::Preview {
                    application_id,
                    pull_request_id,
                },
                None => RoutingKey::Application { application_id },
            };
        }

        match present(labels, &self.compose_service) {
            Some(uuid) => RoutingKey::Database {
                compose_service_uuid: uuid.to_string(),
            },
            None => RoutingKey::Unmatched,
        }
    }

    fn service(&self, labels: &HashMap<String, String>) -> Option<RoutingKey> {
        let service_id = numeric(labels, &self.service_id)?;
        let sub_type = present(labels, &self.service_sub_type).and_then(ServiceSubType::from_label)?;
        let sub_id = numeric(labels, &self.service_sub_id)?;

        Some(RoutingKey::ServiceComponent {
            service_id,
            sub_type,
            sub_id,
        })
    }
}

impl Default for LabelRouter {
    fn default() -> Self {
        Self::new(&LabelConfig::default())
    }
}

fn present<'a>(labels: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    labels
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty() && *value != "0")
}

fn numeric(labels: &HashMap<String, String>, key: &str) -> Option<u64> {
    present(labels, key)
        .and_then(|value| value.parse().ok())
        .filter(|id| *id != 0)
}
