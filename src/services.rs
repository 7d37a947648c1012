//! Encapsulation for setting up the notification channels.

use crate::{
    config::Config,
    core::{AlertEvent, SharedNotifier},
    formatting::MessageComposer,
    notification::{manager::NotificationManager, slack::SlackNotifier, smtp::SmtpNotifier},
};
use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

/// Builds a notifier for every channel present in the configuration.
///
/// Configuration errors (missing webhook, empty recipients, ...) fail here,
/// before any alert is dispatched.
pub fn build_notifiers(config: &Config) -> Result<Vec<SharedNotifier>> {
    let composer = Arc::new(MessageComposer::new(config.reactor.clone())?);
    let mut notifiers: Vec<SharedNotifier> = Vec::new();

    if let Some(slack_config) = &config.slack {
        let notifier = SlackNotifier::new(slack_config.clone(), composer.clone())
            .context("invalid Slack configuration")?;
        info!("Slack notifications enabled.");
        notifiers.push(Arc::new(notifier));
    }

    if let Some(smtp_config) = &config.smtp {
        let notifier = SmtpNotifier::new(smtp_config.clone(), composer.clone())
            .context("invalid SMTP configuration")?;
        info!(
            "SMTP notifications enabled ({}:{}).",
            smtp_config.host, smtp_config.port
        );
        notifiers.push(Arc::new(notifier));
    }

    Ok(notifiers)
}

/// Keeps only the notifier with the given name, when one is requested.
pub fn select_notifiers(
    notifiers: Vec<SharedNotifier>,
    handler: Option<&str>,
) -> Result<Vec<SharedNotifier>> {
    let Some(name) = handler else {
        return Ok(notifiers);
    };
    let selected: Vec<SharedNotifier> = notifiers
        .into_iter()
        .filter(|notifier| notifier.name() == name)
        .collect();
    if selected.is_empty() {
        bail!("Handler '{}' is not configured", name);
    }
    Ok(selected)
}

/// Sets up the notification pipeline if any channel is configured.
///
/// Returns the sender the evaluator publishes alert events on together with
/// the manager task handle, or `Ok(None)` when no channel is enabled.
pub fn setup_notification_pipeline(
    config: &Config,
) -> Result<Option<(broadcast::Sender<AlertEvent>, JoinHandle<()>)>> {
    let notifiers = build_notifiers(config)?;
    if notifiers.is_empty() {
        tracing::warn!("No notification channel is configured. Notifications are disabled.");
        return Ok(None);
    }

    let (tx, rx) = broadcast::channel::<AlertEvent>(config.queue_capacity);
    let manager = NotificationManager::new(notifiers, rx);
    let handle = tokio::spawn(manager.run());
    info!("Notification pipeline started.");
    Ok(Some((tx, handle)))
}
