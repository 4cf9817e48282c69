// # hostwatch-core
//
// Core library for host reachability supervision and container status
// reconciliation.
//
// ## Architecture Overview
//
// One reconciliation pass per host, per tick:
// - **ReachabilityTracker**: failure-count hysteresis with a notification latch
// - **ContainerInventory**: typed snapshot parsed from raw inspect output
// - **LabelRouter**: container labels to a tagged routing key
// - **ProxySupervisor**: keeps the reserved proxy container alive and attached
// - **ReconciliationEngine**: pure diff of containers against tracked resources
// - **ReconciliationJob**: orchestrates the pass behind a per-host lock
// - **Scheduler**: dispatches passes on a fixed interval
//
// ## Design Principles
//
// 1. **Decide, then apply**: the diff returns intents; the job applies them
// 2. **Collaborators behind traits**: transport, persistence and delivery are injected
// 3. **Self-healing**: no retries inside a pass; the next pass re-observes reality
// 4. **Library-First**: the daemon is a thin wiring layer over this crate

pub mod config;
pub mod error;
pub mod inventory;
pub mod job;
pub mod lock;
pub mod model;
pub mod notify;
pub mod proxy;
pub mod reachability;
pub mod reconcile;
pub mod routing;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::HostwatchConfig;
pub use error::{Error, Result};
pub use inventory::{ContainerDescriptor, ContainerInventory};
pub use job::{Collaborators, PassOutcome, PassSummary, ReconciliationJob, Scheduler, SchedulerEvent};
pub use lock::MemoryHostLock;
pub use notify::{LogAlertSink, LogNotifier};
pub use proxy::{ProxyOutcome, ProxySupervisor};
pub use reachability::ReachabilityTracker;
pub use reconcile::{ReconcilePlan, ReconciliationEngine};
pub use routing::{LabelRouter, RoutingKey};
pub use state::{FileHostStore, MemoryHostStore, MemoryResourceStore};
