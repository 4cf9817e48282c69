//! Log-backed notification and alert sinks
//!
//! Delivery (mail, chat, webhooks) is owned by whoever embeds the core.
//! These sinks write every event to `tracing` and are what the daemon uses
//! out of the box.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::Error;
use crate::model::Notification;
use crate::traits::{AlertSink, Notifier};

/// Notifier that logs each notification
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, team_id: u64, notification: Notification) -> Result<(), Error> {
        match &notification {
            Notification::Unreachable { host_id, host_name } => {
                warn!(team_id, host_id, "Host {} is unreachable", host_name);
            }
            Notification::Revived { host_id, host_name } => {
                info!(team_id, host_id, "Host {} is reachable again", host_name);
            }
            Notification::ContainerRestarted {
                container_name,
                host_id,
                ..
            } => {
                info!(team_id, host_id, "Container {} was restarted", container_name);
            }
            Notification::ContainerStopped {
                container_name,
                host_id,
                url,
                ..
            } => {
                warn!(
                    team_id,
                    host_id,
                    url = url.as_deref().unwrap_or("-"),
                    "Container {} stopped",
                    container_name
                );
            }
        }
        Ok(())
    }
}

/// Alert sink that logs at error level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn alert(&self, message: &str) {
        error!("{}", message);
    }
}
