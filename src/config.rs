//! Configuration management for beacon-dispatch
//!
//! This module defines the main `Config` struct and the per-channel option
//! sets. It uses the `figment` crate to layer built-in defaults, a
//! `beacon.toml` file, environment variables and command-line arguments.

use crate::cli::Cli;
use crate::core::ReactorInfo;
use crate::mentions::LevelMentions;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, OneOrMany};
use std::path::PathBuf;

/// Config file read when none is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "beacon.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Capacity of the alert event channel feeding the notification manager.
    pub queue_capacity: usize,
    /// Evaluator metadata exposed to message templates.
    #[serde(default)]
    pub reactor: ReactorInfo,
    /// Slack incoming-webhook channel. Disabled when absent.
    pub slack: Option<SlackConfig>,
    /// SMTP mail channel. Disabled when absent.
    pub smtp: Option<SmtpConfig>,
}

/// Options of the Slack webhook channel.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SlackConfig {
    /// The Slack incoming webhook URL.
    #[serde(default)]
    pub webhook: Option<String>,
    /// Destination channel (`#name`, `@user`, or a bare name).
    #[serde(default)]
    pub channel: Option<String>,
    /// The name messages are posted as.
    #[serde(default = "default_slack_username")]
    pub username: String,
    /// Per-level mention lists.
    #[serde(flatten)]
    pub mentions: LevelMentions,
    /// HTTP client timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            webhook: None,
            channel: None,
            username: default_slack_username(),
            mentions: LevelMentions::default(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Options of the SMTP mail channel.
#[serde_as]
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SmtpConfig {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    /// Never serialized, so it stays out of template contexts.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Sender address.
    #[serde(default = "default_smtp_from")]
    pub from: String,
    /// Recipient addresses. A single address is accepted too.
    #[serde_as(as = "OneOrMany<_>")]
    #[serde(default)]
    pub to: Vec<String>,
    /// Upgrade the connection with STARTTLS.
    #[serde(default)]
    pub use_tls: bool,
    /// Attach an HTML alternative to the plain-text body.
    #[serde(default = "default_true")]
    pub html: bool,
    /// Graphite URL used for graph links in mail bodies.
    #[serde(default)]
    pub graphite_url: Option<String>,
    /// Network timeout for each SMTP command.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: None,
            password: None,
            from: default_smtp_from(),
            to: Vec::new(),
            use_tls: false,
            html: true,
            graphite_url: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl SmtpConfig {
    /// Username and password, when both are set and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some((username, password))
            }
            _ => None,
        }
    }
}

fn default_slack_username() -> String {
    "graphite-beacon".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    25
}

fn default_smtp_from() -> String {
    "beacon@graphite".to_string()
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Loads the configuration by layering defaults, the TOML file,
    /// environment variables and CLI arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = match &cli.config {
            Some(path) if !path.exists() => {
                bail!("Config file not found at specified path: {}", path.display())
            }
            Some(path) => path.clone(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            // e.g. BEACON_SLACK__WEBHOOK=https://hooks.slack.com/...
            .merge(Env::prefixed("BEACON_").split("__"))
            .merge(cli.clone())
            .extract()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            queue_capacity: 1024,
            reactor: ReactorInfo::default(),
            slack: None,
            smtp: None,
        }
    }
}
