//! Reconciliation of observed containers against recorded resources
//!
//! The engine is pure: it takes a snapshot and the host's resource sets and
//! returns a [`ReconcilePlan`] of status writes and notifications. Applying
//! the plan is the job's responsibility, which keeps the diff testable
//! without any persistence.
//!
//! ## Algorithm
//!
//! 1. Every container gets the composite status `"<runState> (<health>)"`.
//! 2. Each container is routed by its labels and matched to a tracked
//!    resource; matches go into a per-kind found set and get a status write
//!    when the stored status differs.
//! 3. Tracked resources absent from the found set, and not already
//!    `exited`, are written `exited` and produce one ContainerStopped
//!    notification each.
//!
//! Service sub-resources are found by an `id-name` key because applications
//! and databases of a service share one numeric id space.

use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::config::LinkConfig;
use crate::inventory::ContainerInventory;
use crate::model::{
    EnvironmentLink, Host, HostResources, ManagedResource, Notification, ResourceRef,
    STATUS_EXITED, ServiceSubType, StatusUpdate,
};
use crate::routing::{LabelRouter, RoutingKey};

/// Status writes and notifications computed by one diff
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Writes, in application, preview, database, service order
    pub status_updates: Vec<StatusUpdate>,
    /// ContainerStopped notifications for resources that went away
    pub notifications: Vec<Notification>,
    /// Containers that matched no tracked resource
    pub untracked: Vec<String>,
}

impl ReconcilePlan {
    /// Whether applying the plan would change nothing
    pub fn is_empty(&self) -> bool {
        self.status_updates.is_empty() && self.notifications.is_empty()
    }
}

/// Resource identities matched to at least one live container
#[derive(Debug, Default)]
struct FoundSet {
    applications: HashSet<u64>,
    previews: HashSet<u64>,
    databases: HashSet<u64>,
    services: HashSet<String>,
}

/// Diffing engine for one host's containers and resources
#[derive(Debug, Clone)]
pub struct ReconciliationEngine {
    router: LabelRouter,
    base_url: String,
}

impl ReconciliationEngine {
    /// Create an engine
    ///
    /// # Parameters
    ///
    /// - `router`: Label router for container classification
    /// - `links`: Base URL for deep links in stop notifications
    pub fn new(router: LabelRouter, links: &LinkConfig) -> Self {
        Self {
            router,
            base_url: links.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Diff a snapshot against the host's tracked resources
    pub fn plan(
        &self,
        host: &Host,
        inventory: &ContainerInventory,
        resources: &HostResources,
    ) -> ReconcilePlan {
        let mut found = FoundSet::default();
        // Last container wins when several match one resource
        let mut observed: BTreeMap<ResourceRef, (String, &str)> = BTreeMap::new();
        let mut untracked = Vec::new();

        for container in inventory.iter() {
            let status = container.status();
            let routes = self.router.route(&container.labels);
            let mut matched = false;

            for key in routes.keys() {
                match match_resource(key, resources, &mut found) {
                    Some((resource_ref, resource)) => {
                        debug!("Container {} matched {}", container.name, resource_ref);
                        observed.insert(resource_ref, (status.clone(), resource.status.as_str()));
                        matched = true;
                    }
                    None => {
                        debug!(
                            "Container {} routes to {:?} but no such resource is tracked",
                            container.name, key
                        );
                    }
                }
            }

            if !matched {
                untracked.push(container.name.clone());
            }
        }

        let mut plan = ReconcilePlan {
            untracked,
            ..ReconcilePlan::default()
        };

        plan.status_updates.extend(
            observed
                .into_iter()
                .filter(|(_, (computed, stored))| computed != stored)
                .map(|(resource, (status, _))| StatusUpdate { resource, status }),
        );

        self.plan_missing(host, resources, &found, &mut plan);

        plan
    }

    /// Status writes marking every owned resource `exited`
    ///
    /// Used when a host is confirmed unreachable. Covers applications,
    /// databases and service sub-resources; previews are left alone.
    pub fn exit_all(&self, resources: &HostResources) -> Vec<StatusUpdate> {
        let applications = resources
            .applications
            .iter()
            .map(|a| (ResourceRef::Application { id: a.id }, a));
        let databases = resources
            .databases
            .iter()
            .map(|d| (ResourceRef::Database { id: d.id }, d));
        let components = resources.services.iter().flat_map(|service| {
            [ServiceSubType::Application, ServiceSubType::Database]
                .into_iter()
                .flat_map(move |sub_type| {
                    service.components(sub_type).iter().map(move |c| {
                        (
                            ResourceRef::ServiceComponent {
                                service_id: service.id,
                                sub_type,
                                id: c.id,
                            },
                            c,
                        )
                    })
                })
        });

        applications
            .chain(databases)
            .chain(components)
            .filter(|(_, resource)| !resource.is_exited())
            .map(|(resource, _)| StatusUpdate {
                resource,
                status: STATUS_EXITED.to_string(),
            })
            .collect()
    }

    fn plan_missing(
        &self,
        host: &Host,
        resources: &HostResources,
        found: &FoundSet,
        plan: &mut ReconcilePlan,
    ) {
        for application in &resources.applications {
            if found.applications.contains(&application.id) || application.is_exited() {
                continue;
            }
            let url = self.link(
                &application.environment,
                "application",
                application.uuid.as_deref(),
            );
            stop(plan, host, ResourceRef::Application { id: application.id }, application, url);
        }

        for preview in &resources.previews {
            let resource = &preview.resource;
            if found.previews.contains(&resource.id) || resource.is_exited() {
                continue;
            }
            let url = self.link(
                &resource.environment,
                "application",
                preview.application_uuid.as_deref(),
            );
            stop(plan, host, ResourceRef::Preview { id: resource.id }, resource, url);
        }

        for database in &resources.databases {
            if found.databases.contains(&database.id) || database.is_exited() {
                continue;
            }
            let url = self.link(&database.environment, "database", database.uuid.as_deref());
            stop(plan, host, ResourceRef::Database { id: database.id }, database, url);
        }

        let mut seen = HashSet::new();
        for service in &resources.services {
            for sub_type in [ServiceSubType::Application, ServiceSubType::Database] {
                for component in service.components(sub_type) {
                    if found.services.contains(&service_key(component))
                        || component.is_exited()
                        || !seen.insert((service.id, sub_type, component.id))
                    {
                        continue;
                    }
                    let url = self.link(&service.environment, "service", service.uuid.as_deref());
                    let resource_ref = ResourceRef::ServiceComponent {
                        service_id: service.id,
                        sub_type,
                        id: component.id,
                    };
                    stop(plan, host, resource_ref, component, url);
                }
            }
        }
    }

    /// `{base}/project/{project}/{environment}/{kind}/{uuid}` when all parts are known
    fn link(&self, environment: &EnvironmentLink, kind: &str, uuid: Option<&str>) -> Option<String> {
        let project = non_empty(environment.project_uuid.as_deref())?;
        let environment_name = non_empty(environment.environment_name.as_deref())?;
        let uuid = non_empty(uuid)?;

        Some(format!(
            "{}/project/{}/{}/{}/{}",
            self.base_url, project, environment_name, kind, uuid
        ))
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(LabelRouter::default(), &LinkConfig::default())
    }
}

fn match_resource<'r>(
    key: &RoutingKey,
    resources: &'r HostResources,
    found: &mut FoundSet,
) -> Option<(ResourceRef, &'r ManagedResource)> {
    match key {
        RoutingKey::Application { application_id } => {
            let application = resources
                .applications
                .iter()
                .find(|a| a.id == *application_id)?;
            found.applications.insert(application.id);
            Some((ResourceRef::Application { id: application.id }, application))
        }
        RoutingKey::Preview {
            application_id,
            pull_request_id,
        } => {
            let preview = resources.previews.iter().find(|p| {
                p.application_id == *application_id && p.pull_request_id == *pull_request_id
            })?;
            found.previews.insert(preview.resource.id);
            Some((ResourceRef::Preview { id: preview.resource.id }, &preview.resource))
        }
        RoutingKey::Database {
            compose_service_uuid,
        } => {
            let database = resources
                .databases
                .iter()
                .find(|d| d.uuid.as_deref() == Some(compose_service_uuid.as_str()))?;
            found.databases.insert(database.id);
            Some((ResourceRef::Database { id: database.id }, database))
        }
        RoutingKey::ServiceComponent {
            service_id,
            sub_type,
            sub_id,
        } => {
            let service = resources.services.iter().find(|s| s.id == *service_id)?;
            let component = service
                .components(*sub_type)
                .iter()
                .find(|c| c.id == *sub_id)?;
            found.services.insert(service_key(component));
            Some((
                ResourceRef::ServiceComponent {
                    service_id: service.id,
                    sub_type: *sub_type,
                    id: component.id,
                },
                component,
            ))
        }
        RoutingKey::Unmatched => None,
    }
}

fn stop(
    plan: &mut ReconcilePlan,
    host: &Host,
    resource_ref: ResourceRef,
    resource: &ManagedResource,
    url: Option<String>,
) {
    debug!("{} has no live container, marking exited", resource_ref);
    plan.status_updates.push(StatusUpdate {
        resource: resource_ref,
        status: STATUS_EXITED.to_string(),
    });
    plan.notifications.push(Notification::container_stopped(
        resource.display_name(),
        host,
        url,
    ));
}

fn service_key(component: &ManagedResource) -> String {
    format!("{}-{}", component.id, component.name.as_deref().unwrap_or_default())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::ContainerDescriptor;
    use crate::model::{Preview, Service};

    fn host() -> Host {
        Host::new(1, "edge-1", 10)
    }

    fn app_container(id: u64, state: &str, health: &str) -> ContainerDescriptor {
        ContainerDescriptor::new(format!("app-{}", id), state)
            .with_health(health)
            .with_label("hostwatch.applicationId", id.to_string())
    }

    #[test]
    fn test_unchanged_status_produces_no_write() {
        let engine = ReconciliationEngine::default();
        let resources = HostResources {
            applications: vec![ManagedResource::new(42).with_status("running (healthy)")],
            ..HostResources::default()
        };
        let inventory = ContainerInventory::new(vec![app_container(42, "running", "healthy")]);

        let plan = engine.plan(&host(), &inventory, &resources);
        assert!(plan.is_empty());
        assert!(plan.untracked.is_empty());
    }

    #[test]
    fn test_changed_status_is_written() {
        let engine = ReconciliationEngine::default();
        let resources = HostResources {
            applications: vec![ManagedResource::new(42).with_status("running (starting)")],
            ..HostResources::default()
        };
        let inventory = ContainerInventory::new(vec![app_container(42, "running", "healthy")]);

        let plan = engine.plan(&host(), &inventory, &resources);
        assert_eq!(
            plan.status_updates,
            vec![StatusUpdate {
                resource: ResourceRef::Application { id: 42 },
                status: "running (healthy)".to_string(),
            }]
        );
        assert!(plan.notifications.is_empty());
    }

    #[test]
    fn test_missing_application_stops_with_link() {
        let engine = ReconciliationEngine::new(
            LabelRouter::default(),
            &LinkConfig {
                base_url: "https://dash.example.com/".to_string(),
            },
        );
        let resources = HostResources {
            applications: vec![
                ManagedResource::new(7)
                    .with_uuid("app-uuid")
                    .with_name("web")
                    .with_fqdn("https://web.example.com")
                    .with_status("running (healthy)")
                    .with_environment("proj-uuid", "production"),
            ],
            ..HostResources::default()
        };

        let plan = engine.plan(&host(), &ContainerInventory::default(), &resources);
        assert_eq!(
            plan.status_updates,
            vec![StatusUpdate {
                resource: ResourceRef::Application { id: 7 },
                status: STATUS_EXITED.to_string(),
            }]
        );
        assert_eq!(
            plan.notifications,
            vec![Notification::container_stopped(
                "web (https://web.example.com)",
                &host(),
                Some(
                    "https://dash.example.com/project/proj-uuid/production/application/app-uuid"
                        .to_string()
                ),
            )]
        );
    }

    #[test]
    fn test_missing_without_linkage_omits_url() {
        let engine = ReconciliationEngine::default();
        let resources = HostResources {
            databases: vec![
                ManagedResource::new(3)
                    .with_uuid("db-uuid")
                    .with_name("postgres")
                    .with_status("running (healthy)"),
            ],
            ..HostResources::default()
        };

        let plan = engine.plan(&host(), &ContainerInventory::default(), &resources);
        assert_eq!(
            plan.notifications,
            vec![Notification::container_stopped("postgres", &host(), None)]
        );
    }

    #[test]
    fn test_already_exited_is_skipped() {
        let engine = ReconciliationEngine::default();
        let resources = HostResources {
            applications: vec![ManagedResource::new(7)],
            databases: vec![ManagedResource::new(8)],
            ..HostResources::default()
        };

        let plan = engine.plan(&host(), &ContainerInventory::default(), &resources);
        assert!(plan.is_empty());
    }

    #[test]
    fn test_preview_matched_by_application_and_pull_request() {
        let engine = ReconciliationEngine::default();
        let resources = HostResources {
            applications: vec![ManagedResource::new(42).with_status("running (healthy)")],
            previews: vec![Preview {
                application_id: 42,
                pull_request_id: 5,
                application_uuid: Some("app-uuid".to_string()),
                resource: ManagedResource::new(900).with_status("exited"),
            }],
            ..HostResources::default()
        };
        let inventory = ContainerInventory::new(vec![
            app_container(42, "running", "healthy"),
            ContainerDescriptor::new("pr-5", "running")
                .with_label("hostwatch.applicationId", "42")
                .with_label("hostwatch.pullRequestId", "5"),
        ]);

        let plan = engine.plan(&host(), &inventory, &resources);
        assert_eq!(
            plan.status_updates,
            vec![StatusUpdate {
                resource: ResourceRef::Preview { id: 900 },
                status: "running (unhealthy)".to_string(),
            }]
        );
        assert!(plan.notifications.is_empty());
    }

    #[test]
    fn test_service_components_and_links() {
        let engine = ReconciliationEngine::default();
        let service = Service {
            id: 5,
            uuid: Some("svc-uuid".to_string()),
            name: Some("ghost".to_string()),
            environment: EnvironmentLink {
                project_uuid: Some("proj".to_string()),
                environment_name: Some("staging".to_string()),
            },
            applications: vec![ManagedResource::new(11).with_name("ghost").with_status("running (healthy)")],
            // Same numeric id as the application, different kind
            databases: vec![ManagedResource::new(11).with_name("mysql").with_status("running (healthy)")],
        };
        let resources = HostResources {
            services: vec![service],
            ..HostResources::default()
        };
        let inventory = ContainerInventory::new(vec![
            ContainerDescriptor::new("ghost-11", "running")
                .with_health("healthy")
                .with_label("hostwatch.serviceId", "5")
                .with_label("hostwatch.service.subType", "application")
                .with_label("hostwatch.service.subId", "11"),
        ]);

        let plan = engine.plan(&host(), &inventory, &resources);
        assert_eq!(
            plan.status_updates,
            vec![StatusUpdate {
                resource: ResourceRef::ServiceComponent {
                    service_id: 5,
                    sub_type: ServiceSubType::Database,
                    id: 11,
                },
                status: STATUS_EXITED.to_string(),
            }]
        );
        assert_eq!(
            plan.notifications,
            vec![Notification::container_stopped(
                "mysql",
                &host(),
                Some("http://localhost:8000/project/proj/staging/service/svc-uuid".to_string()),
            )]
        );
    }

    #[test]
    fn test_untracked_container_is_reported_not_notified() {
        let engine = ReconciliationEngine::default();
        let inventory = ContainerInventory::new(vec![
            app_container(99, "running", "healthy"),
            ContainerDescriptor::new("random", "running"),
        ]);

        let plan = engine.plan(&host(), &inventory, &HostResources::default());
        assert!(plan.is_empty());
        assert_eq!(plan.untracked, vec!["app-99".to_string(), "random".to_string()]);
    }

    #[test]
    fn test_exit_all_skips_previews_and_exited() {
        let engine = ReconciliationEngine::default();
        let resources = HostResources {
            applications: vec![
                ManagedResource::new(1).with_status("running (healthy)"),
                ManagedResource::new(2),
            ],
            previews: vec![Preview {
                application_id: 1,
                pull_request_id: 3,
                application_uuid: None,
                resource: ManagedResource::new(30).with_status("running (healthy)"),
            }],
            databases: vec![ManagedResource::new(4).with_status("running (unhealthy)")],
            services: vec![Service {
                id: 9,
                uuid: None,
                name: None,
                environment: EnvironmentLink::default(),
                applications: vec![ManagedResource::new(5).with_status("running (healthy)")],
                databases: vec![],
            }],
        };

        let refs: Vec<ResourceRef> = engine
            .exit_all(&resources)
            .into_iter()
            .map(|update| update.resource)
            .collect();
        assert_eq!(
            refs,
            vec![
                ResourceRef::Application { id: 1 },
                ResourceRef::Database { id: 4 },
                ResourceRef::ServiceComponent {
                    service_id: 9,
                    sub_type: ServiceSubType::Application,
                    id: 5,
                },
            ]
        );
    }
}
