//! Command-Line Interface (CLI) argument parsing.
//!
//! The CLI sends a single notification through the configured channels,
//! which is the quickest way to check a channel's configuration. Arguments
//! that mirror config keys are merged on top of the `beacon.toml` file and
//! environment variables.

use crate::core::Level;
use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Sends a graphite-beacon alert notification through the configured channels.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Only notify through this channel (`slack` or `smtp`).
    #[arg(long, value_name = "NAME")]
    pub handler: Option<String>,

    /// Severity level of the notification.
    #[arg(long, default_value = "critical")]
    pub level: Level,

    /// Name of the alert.
    #[arg(long, default_value = "beacon-dispatch test")]
    pub alert: String,

    /// Query of the alert.
    #[arg(long, default_value = "*")]
    pub query: String,

    /// Measured value.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub value: f64,

    /// Measured series.
    #[arg(long)]
    pub target: Option<String>,

    /// Notification kind, selects the template family.
    #[arg(long, default_value = "graphite")]
    pub ntype: String,

    /// Rule text that triggered the notification.
    #[arg(long)]
    pub rule: Option<String>,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
