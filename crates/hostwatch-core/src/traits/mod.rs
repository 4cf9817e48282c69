//! Collaborator traits for the hostwatch system
//!
//! The core makes decisions; everything that touches a host, a database or
//! a person sits behind one of these interfaces.
//!
//! - [`ConnectivityProbe`]: Is the host answering?
//! - [`InventorySource`]: Raw container inventory of a host
//! - [`ResourceRepository`]: Host-scoped resources and their status field
//! - [`HostStore`]: Persistent host records (reachability state)
//! - [`Notifier`] / [`AlertSink`]: Outbound events and diagnostics
//! - [`ProxyControl`]: Start and wire up the reverse proxy
//! - [`HostLock`]: Per-host single-flight

pub mod probe;
pub mod inventory;
pub mod resources;
pub mod host_store;
pub mod notifier;
pub mod proxy;
pub mod lock;

pub use probe::ConnectivityProbe;
pub use inventory::InventorySource;
pub use resources::ResourceRepository;
pub use host_store::HostStore;
pub use notifier::{AlertSink, Notifier};
pub use proxy::ProxyControl;
pub use lock::HostLock;
