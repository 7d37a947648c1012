//! End-to-end tests of the `beacon-dispatch` binary.

#[path = "../helpers/mod.rs"]
mod helpers;

use assert_cmd::Command;
use helpers::config_file;
use predicates::prelude::*;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn beacon_dispatch(workdir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("beacon-dispatch").unwrap();
    cmd.current_dir(workdir).env_remove("RUST_LOG");
    cmd
}

#[tokio::test(flavor = "multi_thread")]
async fn test_sends_slack_notification() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let file = config_file(&format!(
        r#"
        [slack]
        webhook = "{}/hook"
        channel = "ops"
        "#,
        server.uri()
    ));
    let workdir = tempfile::tempdir().unwrap();
    let mut cmd = beacon_dispatch(workdir.path());
    cmd.args([
        "--config",
        file.path().to_str().unwrap(),
        "--level",
        "warning",
        "--alert",
        "Load",
        "--value",
        "7",
    ]);

    tokio::task::spawn_blocking(move || cmd.assert().success())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["channel"], "#ops");
    assert_eq!(body["icon_emoji"], ":warning:");
    assert_eq!(body["text"], "[BEACON] WARNING <Load> failed. Current value: 7.0");
}

#[test]
fn test_missing_config_file_fails() {
    let workdir = tempfile::tempdir().unwrap();
    beacon_dispatch(workdir.path())
        .args(["--config", "does-not-exist.toml"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Config file not found"));
}

#[test]
fn test_no_channel_configured_fails() {
    let workdir = tempfile::tempdir().unwrap();
    let file = config_file("log_level = \"warn\"\n");
    beacon_dispatch(workdir.path())
        .args(["--config", file.path().to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No notification channel is configured"));
}

#[test]
fn test_unknown_handler_fails() {
    let workdir = tempfile::tempdir().unwrap();
    let file = config_file(
        r#"
        [smtp]
        to = "ops@example.com"
        "#,
    );
    beacon_dispatch(workdir.path())
        .args(["--config", file.path().to_str().unwrap(), "--handler", "slack"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Handler 'slack' is not configured"));
}

#[test]
fn test_invalid_level_is_rejected() {
    let workdir = tempfile::tempdir().unwrap();
    beacon_dispatch(workdir.path())
        .args(["--level", "info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown alert level"));
}
