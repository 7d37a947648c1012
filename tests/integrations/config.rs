#[path = "../helpers/mod.rs"]
mod helpers;

use beacon_dispatch::cli::Cli;
use beacon_dispatch::config::Config;
use clap::Parser;
use helpers::{config_file, strings};
use serial_test::serial;
use std::path::PathBuf;

fn cli_for(path: &std::path::Path) -> Cli {
    Cli::try_parse_from(["beacon-dispatch", "--config", path.to_str().unwrap()]).unwrap()
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    let file = config_file(
        r#"
        log_level = "debug"
        queue_capacity = 64
        [reactor]
        public_graphite_url = "https://graphite.example.com"
        [slack]
        webhook = "https://hooks.slack.com/services/T000/B000/XXXX"
        channel = "ops"
        username = "beacon"
        warning_mentions = ["U1", "U2"]
        critical_mentions = ["!channel"]
        [smtp]
        host = "mail.example.com"
        port = 587
        username = "beacon"
        password = "s3cret"
        from = "beacon@example.com"
        to = ["ops@example.com", "dev@example.com"]
        use_tls = true
        html = false
    "#,
    );

    let config = Config::load(&cli_for(file.path())).unwrap();

    assert_eq!(config.log_level, "debug");
    assert_eq!(config.queue_capacity, 64);
    assert_eq!(
        config.reactor.public_graphite_url.as_deref(),
        Some("https://graphite.example.com")
    );

    let slack = config.slack.as_ref().unwrap();
    assert_eq!(
        slack.webhook.as_deref(),
        Some("https://hooks.slack.com/services/T000/B000/XXXX")
    );
    assert_eq!(slack.channel.as_deref(), Some("ops"));
    assert_eq!(slack.username, "beacon");
    assert_eq!(slack.mentions.warning_mentions, strings(&["U1", "U2"]));
    assert_eq!(slack.mentions.critical_mentions, strings(&["!channel"]));
    assert!(slack.mentions.normal_mentions.is_empty());

    let smtp = config.smtp.as_ref().unwrap();
    assert_eq!(smtp.host, "mail.example.com");
    assert_eq!(smtp.port, 587);
    assert_eq!(smtp.password.as_deref(), Some("s3cret"));
    assert_eq!(smtp.to, strings(&["ops@example.com", "dev@example.com"]));
    assert!(smtp.use_tls);
    assert!(!smtp.html);
}

#[test]
#[serial]
fn test_load_partial_config_uses_defaults() {
    let file = config_file(
        r#"
        [smtp]
        to = "ops@example.com"
    "#,
    );

    let config = Config::load(&cli_for(file.path())).unwrap();

    assert_eq!(config.log_level, "info");
    assert_eq!(config.queue_capacity, 1024);
    assert!(config.slack.is_none());
    let smtp = config.smtp.unwrap();
    assert_eq!(smtp.host, "localhost");
    assert_eq!(smtp.port, 25);
    assert_eq!(smtp.from, "beacon@graphite");
    assert_eq!(smtp.to, strings(&["ops@example.com"]));
    assert!(smtp.html);
}

#[test]
#[serial]
fn test_env_and_cli_override_file() {
    let file = config_file(
        r#"
        log_level = "warn"
        [slack]
        webhook = "https://hooks.example.com/from-file"
    "#,
    );
    std::env::set_var("BEACON_SLACK__WEBHOOK", "https://hooks.example.com/from-env");

    let cli = Cli::try_parse_from([
        "beacon-dispatch",
        "--config",
        file.path().to_str().unwrap(),
        "--log-level",
        "trace",
    ])
    .unwrap();
    let result = Config::load(&cli);
    std::env::remove_var("BEACON_SLACK__WEBHOOK");

    let config = result.unwrap();
    assert_eq!(config.log_level, "trace");
    assert_eq!(
        config.slack.unwrap().webhook.as_deref(),
        Some("https://hooks.example.com/from-env")
    );
}

#[test]
#[serial]
fn test_invalid_value_type() {
    let file = config_file(
        r#"
        [smtp]
        port = "twenty-five"
    "#,
    );

    let result = Config::load(&cli_for(file.path()));

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("port"));
}

#[test]
#[serial]
fn test_non_existent_config_file() {
    let path = PathBuf::from("/path/to/non/existent/beacon.toml");

    let result = Config::load(&cli_for(&path));

    assert!(result.is_err());
    assert!(result
        .unwrap_err()
        .to_string()
        .contains("Config file not found at specified path"));
}
