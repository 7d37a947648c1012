//! The notification manager is an actor receiving alert events from the
//! evaluator and fanning each one out to every configured notifier.

use crate::core::{AlertEvent, SharedNotifier};
use crate::notification::NotifyError;
use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// A failed delivery, tagged with the notifier that produced it.
#[derive(Debug)]
pub struct DeliveryFailure {
    pub handler: &'static str,
    pub error: NotifyError,
}

/// The `NotificationManager` actor.
pub struct NotificationManager {
    notifiers: Vec<SharedNotifier>,
    event_rx: broadcast::Receiver<AlertEvent>,
}

impl NotificationManager {
    /// Creates a new `NotificationManager`.
    pub fn new(notifiers: Vec<SharedNotifier>, event_rx: broadcast::Receiver<AlertEvent>) -> Self {
        Self {
            notifiers,
            event_rx,
        }
    }

    /// Runs the notification manager's main loop until the channel closes.
    pub async fn run(mut self) {
        loop {
            match self.event_rx.recv().await {
                Ok(event) => {
                    dispatch(&self.notifiers, &event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    error!("NotificationManager lagged, dropping {} alert events.", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("Alert channel closed. Shutting down NotificationManager.");
                    break;
                }
            }
        }
    }
}

/// Notifies every notifier concurrently and collects the failures.
///
/// A failing notifier does not prevent delivery through the others. Each
/// failure is logged and returned to the caller.
pub async fn dispatch(notifiers: &[SharedNotifier], event: &AlertEvent) -> Vec<DeliveryFailure> {
    debug!(
        level = %event.level,
        alert = %event.alert.name,
        "Dispatching to {} notifiers", notifiers.len()
    );
    let results = join_all(notifiers.iter().map(|notifier| async move {
        (notifier.name(), notifier.notify(event).await)
    }))
    .await;

    results
        .into_iter()
        .filter_map(|(handler, result)| match result {
            Ok(()) => None,
            Err(error) => {
                error!(handler, error = %error, "Notification failed");
                Some(DeliveryFailure { handler, error })
            }
        })
        .collect()
}
