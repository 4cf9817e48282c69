//! Fixed-interval dispatch of reconciliation passes
//!
//! Every tick lists the hosts and spawns one pass per host. Passes for
//! different hosts run in parallel; a host whose previous pass is still in
//! flight has the new one dropped by the job's [`HostLock`](crate::traits::HostLock).
//!
//! ## Load Resistance
//!
//! - Missed ticks are skipped, not bursted
//! - The event channel is bounded; events are dropped with a warning when full

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

use super::{PassOutcome, ReconciliationJob};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::traits::HostStore;

/// Events emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Scheduler started
    Started { hosts: usize },

    /// A pass ran to an outcome
    PassFinished { host_id: u64, outcome: PassOutcome },

    /// A pass was dropped because another one held the host
    PassDropped { host_id: u64 },

    /// Scheduler stopped
    Stopped { reason: String },
}

/// Interval scheduler
///
/// ## Lifecycle
///
/// 1. Create with [`Scheduler::new()`]
/// 2. Start with [`Scheduler::run()`]
/// 3. On SIGINT the in-flight passes are awaited and the host store flushed
pub struct Scheduler {
    job: Arc<ReconciliationJob>,
    hosts: Arc<dyn HostStore>,
    interval: Duration,
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver)
    pub fn new(
        job: Arc<ReconciliationJob>,
        config: &SchedulerConfig,
    ) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);
        let hosts = job.hosts();

        Ok((
            Self {
                job,
                hosts,
                interval: Duration::from_secs(config.interval_secs),
                event_tx: tx,
            },
            rx,
        ))
    }

    /// Override the tick interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run until ctrl-c (SIGINT)
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run until `shutdown_rx` fires
    ///
    /// With `None` this is [`Scheduler::run()`]. Callers that handle
    /// signals themselves (the daemon waits for SIGTERM as well) pass the
    /// receiving half of their own shutdown channel.
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    /// Run one pass for every host and wait for all of them
    pub async fn run_once(&self) -> Result<Vec<(u64, PassOutcome)>> {
        let mut passes = JoinSet::new();
        self.dispatch(&mut passes).await?;

        let mut outcomes = Vec::new();
        while let Some(joined) = passes.join_next().await {
            if let Some(finished) = self.record(joined).await {
                outcomes.push(finished);
            }
        }
        outcomes.sort_by_key(|(host_id, _)| *host_id);
        Ok(outcomes)
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        let hosts = self.hosts.list_hosts().await?.len();
        info!("Scheduler started for {} host(s), interval {:?}", hosts, self.interval);
        self.emit_event(SchedulerEvent::Started { hosts });

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(interval);
        let mut passes: JoinSet<(u64, PassOutcome)> = JoinSet::new();

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    if let Err(e) = self.dispatch(&mut passes).await {
                        error!("Failed to dispatch passes: {}", e);
                    }
                }

                Some(joined) = passes.join_next(), if !passes.is_empty() => {
                    self.record(joined).await;
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if !passes.is_empty() {
            info!("Waiting for {} in-flight pass(es)", passes.len());
        }
        while let Some(joined) = passes.join_next().await {
            self.record(joined).await;
        }

        self.emit_event(SchedulerEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        self.hosts.flush().await?;
        info!("Host state flushed, scheduler stopped");

        Ok(())
    }

    async fn dispatch(&self, passes: &mut JoinSet<(u64, PassOutcome)>) -> Result<()> {
        let hosts = self.hosts.list_hosts().await?;
        debug!("Dispatching passes for {} host(s)", hosts.len());

        for host in hosts {
            let job = Arc::clone(&self.job);
            passes.spawn(async move { (host.id, job.run(host.id).await) });
        }
        Ok(())
    }

    async fn record(
        &self,
        joined: std::result::Result<(u64, PassOutcome), JoinError>,
    ) -> Option<(u64, PassOutcome)> {
        match joined {
            Ok((host_id, PassOutcome::Dropped)) => {
                debug!("Pass for host {} dropped", host_id);
                self.emit_event(SchedulerEvent::PassDropped { host_id });
                Some((host_id, PassOutcome::Dropped))
            }
            Ok((host_id, outcome)) => {
                self.emit_event(SchedulerEvent::PassFinished {
                    host_id,
                    outcome: outcome.clone(),
                });
                Some((host_id, outcome))
            }
            Err(e) => {
                error!("Pass task failed: {}", e);
                if e.is_panic() {
                    self.job
                        .alert(&format!("Reconciliation task panicked: {}", e))
                        .await;
                }
                None
            }
        }
    }

    fn emit_event(&self, event: SchedulerEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
