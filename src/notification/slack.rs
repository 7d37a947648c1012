//! A notifier posting alert messages to a Slack incoming webhook.

use crate::config::SlackConfig;
use crate::core::{Alert, AlertEvent, Level, Notifier};
use crate::formatting::{MessageComposer, Variant};
use crate::mentions::{self, normalize_mention};
use crate::notification::{NotifyError, Step};
use crate::overrides::{effective, make_channel_name};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Sigil Slack expects in front of user mentions.
const MENTION_SIGIL: char = '@';

/// The JSON body posted to the webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackPayload {
    pub username: String,
    pub text: String,
    pub icon_emoji: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}

/// Maps a level to the emoji used as the message icon.
pub fn icon_for(level: Level) -> &'static str {
    match level {
        Level::Critical => ":exclamation:",
        Level::Normal => ":white_check_mark:",
        _ => ":warning:",
    }
}

/// Delivers notifications to a Slack incoming webhook.
pub struct SlackNotifier {
    config: SlackConfig,
    webhook: String,
    channel: Option<String>,
    composer: Arc<MessageComposer>,
    client: reqwest::Client,
}

impl SlackNotifier {
    pub const NAME: &'static str = "slack";

    /// Creates a new `SlackNotifier`, failing when no webhook is configured.
    pub fn new(config: SlackConfig, composer: Arc<MessageComposer>) -> Result<Self, NotifyError> {
        let webhook = match config.webhook.as_deref() {
            Some(url) if !url.trim().is_empty() => url.to_string(),
            _ => {
                return Err(NotifyError::Config(
                    "Slack webhook is not defined".to_string(),
                ))
            }
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {}", e)))?;
        let channel = make_channel_name(config.channel.as_deref());

        Ok(Self {
            config,
            webhook,
            channel,
            composer,
            client,
        })
    }

    /// Returns the resolved mentions for a level, without sigils.
    pub fn get_mentions(&self, level: Level, alert: &Alert) -> Result<Vec<String>, NotifyError> {
        mentions::resolve(level, alert.override_for(Self::NAME), &self.config.mentions)
    }

    /// Renders the chat message for an event.
    pub fn get_message(&self, event: &AlertEvent) -> Result<String, NotifyError> {
        let variant = if event.ntype == "graphite" {
            Variant::Slack
        } else {
            Variant::Short
        };
        let mentions = self
            .get_mentions(event.level, &event.alert)?
            .iter()
            .map(|m| format!("<{}>", normalize_mention(m, MENTION_SIGIL)))
            .collect::<Vec<_>>()
            .join(", ");
        self.composer.compose(event, variant, mentions)
    }

    /// Builds the webhook payload with the effective channel and username.
    pub fn build_payload(&self, event: &AlertEvent) -> Result<SlackPayload, NotifyError> {
        let alert_override = event.alert.override_for(Self::NAME);
        let channel = effective("channel", self.channel.clone(), alert_override)?;
        let username = effective("username", self.config.username.clone(), alert_override)?;

        Ok(SlackPayload {
            username,
            text: self.get_message(event)?,
            icon_emoji: icon_for(event.level),
            channel: make_channel_name(channel.as_deref()).filter(|c| !c.is_empty()),
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(skip(self, event), fields(handler = "slack", level = %event.level, alert = %event.alert.name))]
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        debug!("Handler ({}) {}", Self::NAME, event.level);
        let payload = self.build_payload(event)?;

        let response = self
            .client
            .post(&self.webhook)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request to Slack failed");
                NotifyError::transport(Step::Webhook, e)
            })?;

        let status = response.status();
        if !status.is_success() {
            error!(status = %status, "Failed to send Slack notification");
            return Err(NotifyError::transport(
                Step::Webhook,
                format!("webhook responded with status {}", status),
            ));
        }

        debug!("Slack notification sent.");
        Ok(())
    }
}
