//! Core domain types and service traits for beacon-dispatch
//!
//! This module defines the data handed over by the alert evaluator on every
//! level transition, and the `Notifier` contract every delivery channel
//! implements.

use crate::notification::NotifyError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The severity level an alert has transitioned into.
///
/// Unrecognized tags deserialize to `Unknown` and the original tag is not
/// kept, so messages show `unknown` and Slack uses the `:warning:` icon.
/// `FromStr` rejects them instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Normal,
    Warning,
    Critical,
    /// Any level tag this crate does not know about.
    #[serde(other)]
    Unknown,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Normal => "normal",
            Level::Warning => "warning",
            Level::Critical => "critical",
            Level::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(Level::Normal),
            "warning" => Ok(Level::Warning),
            "critical" => Ok(Level::Critical),
            other => Err(format!("unknown alert level '{}'", other)),
        }
    }
}

/// A per-alert partial replacement of one channel's settings.
///
/// Keys mirror the channel's option names (`channel`, `username`,
/// `critical_mentions`, `to`, ...). Values are kept as raw JSON and decoded
/// to the setting's type on lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Override(Map<String, Value>);

impl Override {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, mostly useful for evaluators and tests.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Decodes the value stored under `key`, if any.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<Result<T, serde_json::Error>> {
        self.0
            .get(key)
            .map(|value| serde_json::from_value(value.clone()))
    }
}

/// The definition of an alert as known by the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Human readable alert name.
    pub name: String,
    /// The graphite target or URL the alert evaluates.
    pub query: String,
    /// The textual rules configured on the alert.
    #[serde(default)]
    pub rules: Vec<String>,
    /// Per-channel overrides, keyed by channel name.
    #[serde(default, rename = "override")]
    pub overrides: HashMap<String, Override>,
}

impl Alert {
    pub fn new(name: &str, query: &str) -> Self {
        Self {
            name: name.to_string(),
            query: query.to_string(),
            ..Default::default()
        }
    }

    pub fn with_rules(mut self, rules: &[&str]) -> Self {
        self.rules = rules.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn with_override(mut self, channel: &str, settings: Override) -> Self {
        self.overrides.insert(channel.to_string(), settings);
        self
    }

    /// Returns this alert's override entry for the named channel.
    pub fn override_for(&self, channel: &str) -> Option<&Override> {
        self.overrides.get(channel)
    }
}

/// One level transition, as handed over by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    pub level: Level,
    pub alert: Arc<Alert>,
    /// The measured value that triggered the transition.
    pub value: f64,
    /// The series the value was measured on, when known.
    pub target: Option<String>,
    /// Notification kind, selects the template family (`graphite`, `url`).
    pub ntype: String,
    /// The rule text that matched, when known.
    pub rule: Option<String>,
}

impl AlertEvent {
    pub fn new(level: Level, alert: Arc<Alert>, value: f64, ntype: &str) -> Self {
        Self {
            level,
            alert,
            value,
            target: None,
            ntype: ntype.to_string(),
            rule: None,
        }
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }

    pub fn with_rule(mut self, rule: &str) -> Self {
        self.rule = Some(rule.to_string());
        self
    }
}

/// Metadata about the evaluator ("reactor") exposed to message templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReactorInfo {
    /// The graphite instance queried by the evaluator.
    pub graphite_url: Option<String>,
    /// A user-facing graphite URL used for links in messages.
    pub public_graphite_url: Option<String>,
}

/// A delivery channel for alert notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// The channel name, also the key looked up in `Alert::overrides`.
    fn name(&self) -> &'static str;

    /// Delivers one notification for the given event.
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError>;
}

/// A shared handle to a notifier.
pub type SharedNotifier = Arc<dyn Notifier>;
