//! Host reachability state machine
//!
//! ## States
//!
//! ```text
//!            probe ok                    probe fails
//! Reachable ─────────► Reachable      Reachable ─────────► Probing(count = 1)
//! Probing(n) ─probe ok─► Reachable    Probing(n) ─fails──► Probing(n + 1)
//! Probing(n ≥ threshold) ── next pass ──► Confirmed-Unreachable ──► count = 0
//! ```
//!
//! The threshold is checked at the start of a pass, before probing. With
//! the default threshold of 3, the 4th pass after the first failure is the
//! one that marks every resource `exited` and notifies. The latch
//! (`unreachable_notified`) keeps the notification to one per episode;
//! it is cleared, with a Revived notification, by the next successful probe.
//!
//! The tracker mutates the in-memory host record and returns what the pass
//! must do next. Persisting the host and delivering notifications is the
//! job's responsibility.

use tracing::{debug, info, warn};

use crate::config::ReachabilityConfig;
use crate::model::{Host, Notification};

/// Whether the pass continues after a reachability step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Go on to the inventory fetch
    Proceed,
    /// End the pass here
    Halt,
}

/// Decision of one reachability step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachabilityOutcome {
    pub step: Step,
    /// At most one notification per step
    pub notification: Option<Notification>,
    /// Every owned resource must be marked `exited`
    pub mark_all_exited: bool,
}

impl ReachabilityOutcome {
    fn proceed(notification: Option<Notification>) -> Self {
        Self {
            step: Step::Proceed,
            notification,
            mark_all_exited: false,
        }
    }

    fn halt() -> Self {
        Self {
            step: Step::Halt,
            notification: None,
            mark_all_exited: false,
        }
    }
}

/// Failure-count hysteresis with notification latching
#[derive(Debug, Clone)]
pub struct ReachabilityTracker {
    threshold: u32,
}

impl ReachabilityTracker {
    /// Create a tracker with the given consecutive-failure threshold
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    /// Create a tracker from configuration
    pub fn from_config(config: &ReachabilityConfig) -> Self {
        Self::new(config.unreachable_threshold)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Threshold check performed on entry, before any probe
    ///
    /// # Returns
    ///
    /// - `Some(outcome)`: Confirmed unreachable; the pass halts after
    ///   marking resources `exited`
    /// - `None`: Below threshold; run the probe
    pub fn check_threshold(&self, host: &mut Host) -> Option<ReachabilityOutcome> {
        if host.unreachable_count < self.threshold {
            return None;
        }

        warn!(
            "Host {} confirmed unreachable after {} failed probe(s)",
            host.id, host.unreachable_count
        );

        let notification = if host.unreachable_notified {
            debug!("Host {} unreachable notification already sent", host.id);
            None
        } else {
            host.unreachable_notified = true;
            Some(Notification::unreachable(host))
        };

        host.reachable = false;
        host.unreachable_count = 0;

        Some(ReachabilityOutcome {
            step: Step::Halt,
            notification,
            mark_all_exited: true,
        })
    }

    /// Apply the result of a probe
    ///
    /// # Parameters
    ///
    /// - `reachable`: Whether the host answered (probe errors count as `false`)
    pub fn record_probe(&self, host: &mut Host, reachable: bool) -> ReachabilityOutcome {
        host.last_probe_at = Some(chrono::Utc::now());

        if !reachable {
            host.unreachable_count = host.unreachable_count.saturating_add(1);
            host.reachable = false;
            info!(
                "Host {} failed probe ({} consecutive)",
                host.id, host.unreachable_count
            );
            return ReachabilityOutcome::halt();
        }

        if !host.reachable || !host.usable {
            info!("Host {} is reachable again", host.id);
        }
        host.reachable = true;
        host.usable = true;
        host.unreachable_count = 0;

        let notification = if host.unreachable_notified {
            host.unreachable_notified = false;
            Some(Notification::revived(host))
        } else {
            None
        };

        ReachabilityOutcome::proceed(notification)
    }
}

impl Default for ReachabilityTracker {
    fn default() -> Self {
        Self::from_config(&ReachabilityConfig::default())
    }
}
