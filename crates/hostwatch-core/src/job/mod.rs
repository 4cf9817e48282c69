//! Reconciliation pass orchestration
//!
//! The [`ReconciliationJob`] runs one pass for one host:
//!
//! ```text
//!   try_acquire(host) ──no──▶ Dropped
//!         │
//!         ▼
//!   count ≥ threshold? ──yes──▶ mark resources exited, save, notify once ──▶ ConfirmedUnreachable
//!         │
//!         ▼
//!   probe ──fail──▶ count += 1 ──▶ Unreachable
//!         │
//!         ▼
//!   inventory ──empty/unavailable/malformed──▶ NoInventory
//!         │
//!         ▼
//!   proxy supervision ──▶ plan ──▶ apply writes + notifications ──▶ Completed
//! ```
//!
//! ## Error Boundary
//!
//! Probe and inventory failures are transient and end the pass quietly.
//! Any other error (store, repository) is caught once in [`ReconciliationJob::run`],
//! sent to the alert sink and returned as [`PassOutcome::Failed`]. A panic
//! in a collaborator is caught at the same boundary, so the host lock is
//! always released. There is no retry inside a pass; the next scheduled
//! pass re-observes reality.

pub mod scheduler;

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::HostwatchConfig;
use crate::error::{Error, Result};
use crate::inventory::ContainerInventory;
use crate::model::{Host, Notification, StatusUpdate};
use crate::proxy::{ProxyOutcome, ProxySupervisor};
use crate::reachability::{ReachabilityTracker, Step};
use crate::reconcile::ReconciliationEngine;
use crate::routing::LabelRouter;
use crate::traits::{
    AlertSink, ConnectivityProbe, HostLock, HostStore, InventorySource, Notifier, ProxyControl,
    ResourceRepository,
};

pub use scheduler::{Scheduler, SchedulerEvent};

/// Counters of a completed pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    /// Containers in the snapshot
    pub containers: usize,
    /// Resource status writes applied
    pub status_writes: usize,
    /// ContainerStopped notifications sent
    pub notifications: usize,
    /// Containers that matched no tracked resource
    pub unmatched: usize,
    /// What proxy supervision did
    pub proxy: ProxyOutcome,
}

/// How a pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass for the host was in flight
    Dropped,
    /// Probe failed; nothing else ran
    Unreachable { consecutive_failures: u32 },
    /// Threshold reached; owned resources marked `exited`
    ConfirmedUnreachable { status_writes: usize, notified: bool },
    /// Inventory empty or unavailable
    NoInventory,
    /// Full reconciliation ran
    Completed(PassSummary),
    /// Unexpected failure, already reported to the alert sink
    Failed { error: String },
}

/// Everything a pass talks to
///
/// All collaborators are shared trait objects so one set can serve many
/// concurrent passes.
#[derive(Clone)]
pub struct Collaborators {
    pub hosts: Arc<dyn HostStore>,
    pub resources: Arc<dyn ResourceRepository>,
    pub probe: Arc<dyn ConnectivityProbe>,
    pub inventory: Arc<dyn InventorySource>,
    pub proxy: Arc<dyn ProxyControl>,
    pub notifier: Arc<dyn Notifier>,
    pub alerts: Arc<dyn AlertSink>,
    pub lock: Arc<dyn HostLock>,
}

/// One reconciliation pass per host, on demand
///
/// ## Threading
///
/// `run` takes `&self` and may be called concurrently for different hosts.
/// Calls for the same host are serialized by the [`HostLock`]: the second
/// one returns [`PassOutcome::Dropped`] immediately.
pub struct ReconciliationJob {
    deps: Collaborators,
    tracker: ReachabilityTracker,
    engine: ReconciliationEngine,
    supervisor: ProxySupervisor,
}

impl ReconciliationJob {
    /// Create a job
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the configuration does not validate.
    pub fn new(deps: Collaborators, config: &HostwatchConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            deps,
            tracker: ReachabilityTracker::from_config(&config.reachability),
            engine: ReconciliationEngine::new(LabelRouter::new(&config.labels), &config.links),
            supervisor: ProxySupervisor::new(&config.proxy),
        })
    }

    /// Host store shared with the job
    pub fn hosts(&self) -> Arc<dyn HostStore> {
        Arc::clone(&self.deps.hosts)
    }

    /// Run one pass for `host_id`
    ///
    /// Never returns an error: every failure is folded into the outcome.
    pub async fn run(&self, host_id: u64) -> PassOutcome {
        match self.deps.lock.try_acquire(host_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Pass for host {} already in flight, dropping", host_id);
                return PassOutcome::Dropped;
            }
            Err(e) => return self.fail(host_id, e).await,
        }

        let outcome = match AssertUnwindSafe(self.pass(host_id)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => self.fail(host_id, e).await,
            Err(panic) => {
                let message = format!("pass panicked: {}", panic_message(&*panic));
                self.fail(host_id, Error::Other(message)).await
            }
        };

        if let Err(e) = self.deps.lock.release(host_id).await {
            error!("Failed to release lock for host {}: {}", host_id, e);
            self.deps
                .alerts
                .alert(&format!("Failed to release lock for host {}: {}", host_id, e))
                .await;
        }

        outcome
    }

    async fn pass(&self, host_id: u64) -> Result<PassOutcome> {
        let mut host = self
            .deps
            .hosts
            .get_host(host_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("host {}", host_id)))?;

        if let Some(outcome) = self.tracker.check_threshold(&mut host) {
            // The reset counter is only persisted once every resource is
            // marked, so a failed write repeats the confirmation next pass.
            let resources = self.deps.resources.load(host.id).await?;
            let status_writes = self.apply(&self.engine.exit_all(&resources)).await?;
            self.deps.hosts.save_host(&host).await?;

            let notified = outcome.notification.is_some();
            if let Some(notification) = outcome.notification {
                self.notify(&host, notification).await;
            }

            info!(
                "Host {} confirmed unreachable, {} resource(s) marked exited",
                host.id, status_writes
            );

            return Ok(PassOutcome::ConfirmedUnreachable {
                status_writes,
                notified,
            });
        }

        let reachable = match self.deps.probe.probe(&host).await {
            Ok(reachable) => reachable,
            Err(e) => {
                warn!("Probe of host {} failed: {}", host.id, e);
                false
            }
        };

        let outcome = self.tracker.record_probe(&mut host, reachable);
        self.deps.hosts.save_host(&host).await?;
        if let Some(notification) = outcome.notification {
            self.notify(&host, notification).await;
        }

        if outcome.step == Step::Halt {
            return Ok(PassOutcome::Unreachable {
                consecutive_failures: host.unreachable_count,
            });
        }

        let Some(inventory) = self.fetch_inventory(&host).await else {
            return Ok(PassOutcome::NoInventory);
        };

        let proxy = self
            .supervisor
            .supervise(
                &mut host,
                &inventory,
                self.deps.proxy.as_ref(),
                self.deps.notifier.as_ref(),
                self.deps.alerts.as_ref(),
            )
            .await;

        let resources = self.deps.resources.load(host.id).await?;
        let plan = self.engine.plan(&host, &inventory, &resources);
        for name in &plan.untracked {
            debug!("Container {} on host {} matches no tracked resource", name, host.id);
        }

        let status_writes = self.apply(&plan.status_updates).await?;
        let notifications = plan.notifications.len();
        for notification in plan.notifications {
            self.notify(&host, notification).await;
        }

        self.deps.hosts.save_host(&host).await?;

        debug!(
            "Host {} reconciled: {} container(s), {} write(s), {} notification(s)",
            host.id,
            inventory.len(),
            status_writes,
            notifications
        );

        Ok(PassOutcome::Completed(PassSummary {
            containers: inventory.len(),
            status_writes,
            notifications,
            unmatched: plan.untracked.len(),
            proxy,
        }))
    }

    /// Snapshot of the host's containers, `None` when there is nothing to
    /// reconcile this cycle
    async fn fetch_inventory(&self, host: &Host) -> Option<ContainerInventory> {
        let ids = match self.deps.inventory.list_container_ids(host).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Listing containers on host {} failed: {}", host.id, e);
                return None;
            }
        };
        if ids.is_empty() {
            debug!("No containers on host {}", host.id);
            return None;
        }

        let raw = match self.deps.inventory.inspect(host, &ids).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Inspecting containers on host {} failed: {}", host.id, e);
                return None;
            }
        };

        let inventory = ContainerInventory::parse(&raw);
        if inventory.skipped() > 0 {
            warn!(
                "Inspect output for host {} had {} malformed document(s), skipping this pass",
                host.id,
                inventory.skipped()
            );
            return None;
        }
        if inventory.is_empty() {
            debug!("Inspect output for host {} held no containers", host.id);
            return None;
        }
        Some(inventory)
    }

    async fn apply(&self, updates: &[StatusUpdate]) -> Result<usize> {
        for update in updates {
            debug!("Setting {} to {}", update.resource, update.status);
            self.deps
                .resources
                .set_status(&update.resource, &update.status)
                .await?;
        }
        Ok(updates.len())
    }

    async fn notify(&self, host: &Host, notification: Notification) {
        if let Err(e) = self.deps.notifier.notify(host.team_id, notification).await {
            warn!("Failed to notify team {} for host {}: {}", host.team_id, host.id, e);
            self.deps
                .alerts
                .alert(&format!("Notification for host {} failed: {}", host.id, e))
                .await;
        }
    }

    /// Report a failure outside any pass (e.g. a crashed pass task)
    pub(crate) async fn alert(&self, message: &str) {
        self.deps.alerts.alert(message).await;
    }

    async fn fail(&self, host_id: u64, e: Error) -> PassOutcome {
        error!("Reconciliation of host {} failed: {}", host_id, e);
        self.deps
            .alerts
            .alert(&format!("Reconciliation of host {} failed: {}", host_id, e))
            .await;
        PassOutcome::Failed {
            error: e.to_string(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic payload")
}
