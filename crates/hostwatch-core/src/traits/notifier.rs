// # Notifier and Alert Sink Traits
//
// Two outbound channels:
// - `Notifier`: user-facing events addressed to the host's owning team
// - `AlertSink`: operator-facing free-text diagnostics for unexpected failures
//
// Formatting and delivery (mail, chat, webhooks) live behind these traits.

use async_trait::async_trait;

use crate::model::Notification;

/// Trait for notification delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification to a team
    async fn notify(&self, team_id: u64, notification: Notification) -> Result<(), crate::Error>;
}

/// Trait for the internal alert sink
///
/// Alerting must never fail the caller; implementations swallow their own errors.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Report an unexpected failure
    async fn alert(&self, message: &str);
}
