use crate::notification::smtp::{MailConnector, MailSession};
use crate::notification::BoxError;
use async_trait::async_trait;
use lettre::Message;
use std::sync::{Arc, Mutex};

/// A step of the SMTP handshake, as seen by the fake relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailCall {
    Connect { host: String, port: u16 },
    StartTls,
    Authenticate { username: String },
    Send { recipients: Vec<String>, raw: String },
    Close,
}

/// Fake mail relay for testing
///
/// Every call is recorded in order. A step can be set to fail, in which case
/// it is still recorded before the error is returned.
#[derive(Clone, Default)]
pub struct FakeMailConnector {
    calls: Arc<Mutex<Vec<MailCall>>>,
    fail_on: Arc<Mutex<Option<&'static str>>>,
}

impl FakeMailConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the named step (`connect`, `starttls`, `auth`, `send`) fail.
    pub fn fail_on(&self, step: &'static str) {
        *self.fail_on.lock().unwrap() = Some(step);
    }

    pub fn calls(&self) -> Vec<MailCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The recorded call names, e.g. `["connect", "send", "close"]`.
    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls()
            .iter()
            .map(|call| match call {
                MailCall::Connect { .. } => "connect",
                MailCall::StartTls => "starttls",
                MailCall::Authenticate { .. } => "auth",
                MailCall::Send { .. } => "send",
                MailCall::Close => "close",
            })
            .collect()
    }

    /// The raw messages submitted so far.
    pub fn sent(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MailCall::Send { raw, .. } => Some(raw),
                _ => None,
            })
            .collect()
    }

    fn record(&self, name: &'static str, call: MailCall) -> Result<(), BoxError> {
        self.calls.lock().unwrap().push(call);
        if *self.fail_on.lock().unwrap() == Some(name) {
            return Err(format!("fake relay rejected {}", name).into());
        }
        Ok(())
    }
}

#[async_trait]
impl MailConnector for FakeMailConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn MailSession>, BoxError> {
        self.record(
            "connect",
            MailCall::Connect {
                host: host.to_string(),
                port,
            },
        )?;
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl MailSession for FakeMailConnector {
    async fn starttls(&mut self) -> Result<(), BoxError> {
        self.record("starttls", MailCall::StartTls)
    }

    async fn authenticate(&mut self, username: &str, _password: &str) -> Result<(), BoxError> {
        self.record(
            "auth",
            MailCall::Authenticate {
                username: username.to_string(),
            },
        )
    }

    async fn send(&mut self, message: &Message) -> Result<(), BoxError> {
        let recipients = message
            .envelope()
            .to()
            .iter()
            .map(|address| address.to_string())
            .collect();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        self.record("send", MailCall::Send { recipients, raw })
    }

    async fn close(&mut self) {
        let _ = self.record("close", MailCall::Close);
    }
}
