//! Delivery of alert notifications to external channels.
//!
//! Every channel implements [`crate::core::Notifier`]. The Slack notifier
//! posts to an incoming webhook, the SMTP notifier drives a mail relay
//! handshake. The manager fans events out to all configured channels.
pub mod manager;
pub mod slack;
pub mod smtp;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use std::fmt;
use thiserror::Error;

/// A boxed error coming from a transport client.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The delivery step a transport failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Webhook,
    Connect,
    StartTls,
    Authenticate,
    Send,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Webhook => "webhook POST",
            Step::Connect => "SMTP connect",
            Step::StartTls => "SMTP STARTTLS",
            Step::Authenticate => "SMTP AUTH",
            Step::Send => "SMTP send",
        })
    }
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("no '{variant}' template for notification kind '{family}'")]
    MissingTemplate {
        family: String,
        variant: &'static str,
    },

    #[error("failed to render message: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("{step} failed: {source}")]
    Transport {
        step: Step,
        #[source]
        source: BoxError,
    },
}

impl NotifyError {
    pub fn transport(step: Step, source: impl Into<BoxError>) -> Self {
        NotifyError::Transport {
            step,
            source: source.into(),
        }
    }

    /// Configuration problems will fail the same way on every call.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            NotifyError::Config(_) | NotifyError::MissingTemplate { .. }
        )
    }

    /// The failed transport step, if this is a transport error.
    pub fn step(&self) -> Option<Step> {
        match self {
            NotifyError::Transport { step, .. } => Some(*step),
            _ => None,
        }
    }
}
