//! Integration tests for the SMTP delivery handshake.

#[path = "../helpers/mod.rs"]
mod helpers;

use beacon_dispatch::config::SmtpConfig;
use beacon_dispatch::core::{Alert, Level, Notifier, Override};
use beacon_dispatch::notification::smtp::SmtpNotifier;
use beacon_dispatch::notification::test_utils::{FakeMailConnector, MailCall};
use beacon_dispatch::notification::Step;
use helpers::{composer, graphite_event};
use std::sync::Arc;

fn smtp(config: SmtpConfig, relay: &FakeMailConnector) -> SmtpNotifier {
    SmtpNotifier::with_connector(config, composer(), Arc::new(relay.clone())).unwrap()
}

fn config() -> SmtpConfig {
    SmtpConfig {
        host: "mail.example.com".to_string(),
        port: 2525,
        to: vec!["ops@example.com".to_string(), "dev@example.com".to_string()],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_plain_relay_connects_and_sends() {
    let relay = FakeMailConnector::new();

    smtp(config(), &relay)
        .notify(&graphite_event(Level::Critical, Alert::new("Load", "*")))
        .await
        .unwrap();

    assert_eq!(relay.call_names(), vec!["connect", "send", "close"]);
    assert_eq!(
        relay.calls()[0],
        MailCall::Connect {
            host: "mail.example.com".to_string(),
            port: 2525
        }
    );
    match &relay.calls()[1] {
        MailCall::Send { recipients, .. } => {
            assert_eq!(recipients, &vec!["ops@example.com".to_string(), "dev@example.com".to_string()]);
        }
        other => panic!("expected a send, got {:?}", other),
    }
}

#[tokio::test]
async fn test_secure_authenticated_relay() {
    let relay = FakeMailConnector::new();
    let config = SmtpConfig {
        use_tls: true,
        username: Some("beacon".to_string()),
        password: Some("s3cret".to_string()),
        ..config()
    };

    smtp(config, &relay)
        .notify(&graphite_event(Level::Warning, Alert::new("Load", "*")))
        .await
        .unwrap();

    assert_eq!(
        relay.call_names(),
        vec!["connect", "starttls", "auth", "send", "close"]
    );
    assert!(relay.calls().contains(&MailCall::Authenticate {
        username: "beacon".to_string()
    }));
}

#[tokio::test]
async fn test_blank_credentials_skip_auth() {
    let relay = FakeMailConnector::new();
    let config = SmtpConfig {
        username: Some(String::new()),
        password: Some(String::new()),
        ..config()
    };

    smtp(config, &relay)
        .notify(&graphite_event(Level::Critical, Alert::new("Load", "*")))
        .await
        .unwrap();

    assert_eq!(relay.call_names(), vec!["connect", "send", "close"]);
}

#[tokio::test]
async fn test_failures_stop_the_handshake_and_close_once() {
    let cases = [
        ("starttls", Step::StartTls, vec!["connect", "starttls", "close"]),
        ("auth", Step::Authenticate, vec!["connect", "starttls", "auth", "close"]),
        ("send", Step::Send, vec!["connect", "starttls", "auth", "send", "close"]),
    ];

    for (failing, step, expected) in cases {
        let relay = FakeMailConnector::new();
        relay.fail_on(failing);
        let config = SmtpConfig {
            use_tls: true,
            username: Some("beacon".to_string()),
            password: Some("s3cret".to_string()),
            ..config()
        };

        let err = smtp(config, &relay)
            .notify(&graphite_event(Level::Critical, Alert::new("Load", "*")))
            .await
            .unwrap_err();

        assert_eq!(err.step(), Some(step), "failing at {}", failing);
        assert_eq!(relay.call_names(), expected, "failing at {}", failing);
        assert!(relay.sent().is_empty() || failing == "send");
    }
}

#[tokio::test]
async fn test_connect_failure_does_not_close() {
    let relay = FakeMailConnector::new();
    relay.fail_on("connect");

    let err = smtp(config(), &relay)
        .notify(&graphite_event(Level::Critical, Alert::new("Load", "*")))
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some(Step::Connect));
    assert_eq!(relay.call_names(), vec!["connect"]);
}

#[tokio::test]
async fn test_mail_content_uses_overrides_and_rule() {
    let relay = FakeMailConnector::new();
    let config = SmtpConfig {
        graphite_url: Some("http://graphite.example.com".to_string()),
        ..config()
    };
    let alert = Alert::new("Disk", "servers.*.disk").with_override(
        "smtp",
        Override::new()
            .with("from", "disk-beacon@example.com")
            .with("to", "storage@example.com"),
    );
    let event = graphite_event(Level::Critical, alert)
        .with_target("servers.db1.disk")
        .with_rule("critical: > 90");

    smtp(config, &relay).notify(&event).await.unwrap();

    let sent = relay.sent();
    assert_eq!(sent.len(), 1);
    let raw = &sent[0];
    assert!(raw.contains("From: disk-beacon@example.com"));
    assert!(raw.contains("To: storage@example.com"));
    assert!(raw.contains("Subject: [BEACON] CRITICAL <Disk> failed."));
    assert!(raw.contains("Rule: critical: > 90"));
    assert!(raw.contains("Target: servers.db1.disk"));
    assert!(raw.contains("http://graphite.example.com/render/?target=servers.*.disk"));
}

#[tokio::test]
async fn test_concurrent_notifications_use_separate_connections() {
    let relay = FakeMailConnector::new();
    let notifier = smtp(config(), &relay);
    let first = graphite_event(Level::Critical, Alert::new("Load", "*"));
    let second = graphite_event(Level::Normal, Alert::new("Disk", "*"));

    let (a, b) = tokio::join!(notifier.notify(&first), notifier.notify(&second));
    a.unwrap();
    b.unwrap();

    let names = relay.call_names();
    assert_eq!(names.iter().filter(|n| **n == "connect").count(), 2);
    assert_eq!(names.iter().filter(|n| **n == "close").count(), 2);
    assert_eq!(relay.sent().len(), 2);
}
