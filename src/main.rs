//! beacon-dispatch - sends one alert notification through the configured
//! channels.

use anyhow::{bail, Result};
use beacon_dispatch::{
    cli::Cli,
    config::Config,
    core::{Alert, AlertEvent},
    notification::manager::dispatch,
    services::{build_notifiers, select_notifiers},
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        tracing_subscriber::fmt().init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!(
        "Slack: {}",
        if config.slack.is_some() { "Enabled" } else { "Disabled" }
    );
    info!(
        "SMTP: {}",
        if config.smtp.is_some() { "Enabled" } else { "Disabled" }
    );
    info!("-------------------------------------------------------");

    let notifiers = select_notifiers(build_notifiers(&config)?, cli.handler.as_deref())?;
    if notifiers.is_empty() {
        bail!("No notification channel is configured");
    }

    let alert = Alert::new(&cli.alert, &cli.query);
    let mut event = AlertEvent::new(cli.level, Arc::new(alert), cli.value, &cli.ntype);
    event.target = cli.target.clone();
    event.rule = cli.rule.clone();

    let failures = dispatch(&notifiers, &event).await;
    if !failures.is_empty() {
        for failure in &failures {
            error!("{} notification failed: {}", failure.handler, failure.error);
        }
        bail!("{} of {} notifications failed", failures.len(), notifiers.len());
    }

    info!("Notification sent through {} channel(s).", notifiers.len());
    Ok(())
}
