//! Reverse-proxy supervision
//!
//! Every pass checks the snapshot for the reserved proxy container:
//! - absent: ask whether it should be started, start it, notify the team
//! - present: record its run state on the host and re-attach it to the
//!   required networks (idempotent)
//!
//! Nothing here fails the pass. Start problems go to the alert sink, attach
//! problems to the log; the next pass looks again.

use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::inventory::ContainerInventory;
use crate::model::{Host, Notification};
use crate::traits::{AlertSink, Notifier, ProxyControl};

/// What the supervisor observed and did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyOutcome {
    /// Proxy present; status recorded, networks attached
    Running {
        status: String,
        networks_attached: bool,
    },
    /// Proxy absent and started
    Started,
    /// Proxy absent and the predicate said not to start it
    NotStarted,
    /// Proxy absent and the check or start failed
    StartFailed { error: String },
}

/// Keeps the proxy container alive and wired up
#[derive(Debug, Clone)]
pub struct ProxySupervisor {
    container_name: String,
}

impl ProxySupervisor {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            container_name: config.container_name.clone(),
        }
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Supervise the proxy for one pass
    ///
    /// Updates `host.proxy_status` when the proxy is present; the caller
    /// persists the host.
    pub async fn supervise(
        &self,
        host: &mut Host,
        inventory: &ContainerInventory,
        control: &dyn ProxyControl,
        notifier: &dyn Notifier,
        alerts: &dyn AlertSink,
    ) -> ProxyOutcome {
        let Some(proxy) = inventory.find_by_name(&self.container_name) else {
            return self.restart(host, control, notifier, alerts).await;
        };

        debug!("Proxy {} on host {} is {}", self.container_name, host.id, proxy.run_state);
        host.proxy_status = Some(proxy.run_state.clone());

        let networks_attached = match control.attach_networks(host).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Failed to attach proxy networks on host {}: {}",
                    host.id, e
                );
                false
            }
        };

        ProxyOutcome::Running {
            status: proxy.run_state.clone(),
            networks_attached,
        }
    }

    async fn restart(
        &self,
        host: &Host,
        control: &dyn ProxyControl,
        notifier: &dyn Notifier,
        alerts: &dyn AlertSink,
    ) -> ProxyOutcome {
        let should_start = match control.should_start(host).await {
            Ok(should_start) => should_start,
            Err(e) => return self.start_failed(host, alerts, e.to_string()).await,
        };

        if !should_start {
            info!("Proxy {} absent on host {}, not starting it", self.container_name, host.id);
            alerts
                .alert(&format!(
                    "Proxy {} could not be started on host {} ({})",
                    self.container_name, host.name, host.id
                ))
                .await;
            return ProxyOutcome::NotStarted;
        }

        if let Err(e) = control.start(host).await {
            return self.start_failed(host, alerts, e.to_string()).await;
        }

        info!("Started proxy {} on host {}", self.container_name, host.id);
        let notification = Notification::container_restarted(self.container_name.clone(), host);
        if let Err(e) = notifier.notify(host.team_id, notification).await {
            warn!("Failed to send proxy restart notification for host {}: {}", host.id, e);
            alerts
                .alert(&format!("Proxy restart notification failed for host {}: {}", host.id, e))
                .await;
        }

        ProxyOutcome::Started
    }

    async fn start_failed(&self, host: &Host, alerts: &dyn AlertSink, error: String) -> ProxyOutcome {
        warn!("Proxy {} start failed on host {}: {}", self.container_name, host.id, error);
        alerts
            .alert(&format!(
                "Proxy {} start failed on host {} ({}): {}",
                self.container_name, host.name, host.id, error
            ))
            .await;
        ProxyOutcome::StartFailed { error }
    }
}

impl Default for ProxySupervisor {
    fn default() -> Self {
        Self::new(&ProxyConfig::default())
    }
}
