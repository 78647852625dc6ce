//! Concrete collaborator implementations wired into the reference daemon.
//! The real mwan3/UCI controller and a production notification fan-out are
//! explicitly out of scope for this repo (spec.md §1) — these stand in for
//! them with `tracing`-based logging so the daemon is runnable end-to-end.

use failover_core::{Controller, Notification, Notifier};
use std::future::Future;
use std::pin::Pin;

/// Logs every attempted route change instead of touching mwan3/UCI.
/// A production deployment swaps this for a real `Controller`.
pub struct LoggingController;

impl Controller for LoggingController {
    fn switch(&self, from: Option<&str>, to: &str) -> anyhow::Result<()> {
        tracing::info!(from = ?from, to, "controller: would apply route switch");
        Ok(())
    }
}

/// Logs every notification instead of dispatching to a real channel
/// (webhook, MQTT, push). A production deployment swaps this for a real
/// `Notifier`.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn send(
        &self,
        notification: Notification,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>> {
        Box::pin(async move {
            tracing::warn!(
                priority = ?notification.priority,
                title = %notification.title,
                message = %notification.message,
                "notification"
            );
            Ok(())
        })
    }
}
