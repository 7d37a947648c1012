//! A notifier delivering alert mails through an SMTP relay.
//!
//! Delivery is an ordered handshake: connect, STARTTLS when `use_tls` is
//! set, AUTH when both username and password are non-empty, then send. Once the
//! connection is open it is always closed exactly once, whichever step fails.

use crate::config::SmtpConfig;
use crate::core::{AlertEvent, Notifier};
use crate::formatting::{MessageComposer, Variant};
use crate::notification::{BoxError, NotifyError, Step};
use crate::overrides::effective;
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{AsyncSmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;
use serde::Deserialize;
use serde_with::{serde_as, OneOrMany};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// An open connection to a mail relay.
#[async_trait]
pub trait MailSession: Send {
    /// Upgrades the connection with STARTTLS.
    async fn starttls(&mut self) -> Result<(), BoxError>;

    /// Authenticates with the relay.
    async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), BoxError>;

    /// Submits the message to every envelope recipient.
    async fn send(&mut self, message: &Message) -> Result<(), BoxError>;

    /// Closes the connection.
    async fn close(&mut self);
}

/// Opens connections to a mail relay. One connection is opened per notify call.
#[async_trait]
pub trait MailConnector: Send + Sync {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn MailSession>, BoxError>;
}

/// The states a delivery goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    Connected,
    Secured,
    Authenticated,
    Sending,
    Closed,
}

/// One delivery attempt against the relay.
pub struct Handshake<'a> {
    config: &'a SmtpConfig,
    state: HandshakeState,
}

impl<'a> Handshake<'a> {
    pub fn new(config: &'a SmtpConfig) -> Self {
        Self {
            config,
            state: HandshakeState::Idle,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Runs the handshake to completion.
    ///
    /// A connect failure returns straight away, nothing is open yet. Any later
    /// failure closes the session first and is returned afterwards.
    pub async fn deliver(
        &mut self,
        connector: &dyn MailConnector,
        message: &Message,
    ) -> Result<(), NotifyError> {
        let mut session = connector
            .connect(&self.config.host, self.config.port)
            .await
            .map_err(|e| NotifyError::transport(Step::Connect, e))?;
        self.transition(HandshakeState::Connected);

        let outcome = self.drive(session.as_mut(), message).await;

        session.close().await;
        self.transition(HandshakeState::Closed);
        outcome
    }

    async fn drive(
        &mut self,
        session: &mut dyn MailSession,
        message: &Message,
    ) -> Result<(), NotifyError> {
        if self.config.use_tls {
            session
                .starttls()
                .await
                .map_err(|e| NotifyError::transport(Step::StartTls, e))?;
            self.transition(HandshakeState::Secured);
        }

        if let Some((username, password)) = self.config.credentials() {
            session
                .authenticate(username, password)
                .await
                .map_err(|e| NotifyError::transport(Step::Authenticate, e))?;
            self.transition(HandshakeState::Authenticated);
        }

        self.transition(HandshakeState::Sending);
        session
            .send(message)
            .await
            .map_err(|e| NotifyError::transport(Step::Send, e))
    }

    fn transition(&mut self, next: HandshakeState) {
        debug!(from = ?self.state, to = ?next, "SMTP handshake");
        self.state = next;
    }
}

/// `to` overrides may be a single address or a list.
#[serde_as]
#[derive(Deserialize)]
struct Recipients(#[serde_as(as = "OneOrMany<_>")] Vec<String>);

/// Delivers notifications as mails through an SMTP relay.
pub struct SmtpNotifier {
    config: SmtpConfig,
    composer: Arc<MessageComposer>,
    connector: Arc<dyn MailConnector>,
}

impl SmtpNotifier {
    pub const NAME: &'static str = "smtp";

    /// Creates an `SmtpNotifier` using lettre's SMTP client.
    pub fn new(config: SmtpConfig, composer: Arc<MessageComposer>) -> Result<Self, NotifyError> {
        let connector = Arc::new(LettreConnector::new(Duration::from_secs(
            config.timeout_seconds,
        )));
        Self::with_connector(config, composer, connector)
    }

    /// Creates an `SmtpNotifier` delivering through the given connector.
    pub fn with_connector(
        config: SmtpConfig,
        composer: Arc<MessageComposer>,
        connector: Arc<dyn MailConnector>,
    ) -> Result<Self, NotifyError> {
        if config.host.trim().is_empty() || config.port == 0 {
            return Err(NotifyError::Config(
                "SMTP host and port must be configured".to_string(),
            ));
        }
        if config.to.is_empty() {
            return Err(NotifyError::Config(
                "Recipients list is empty. SMTP disabled.".to_string(),
            ));
        }
        Ok(Self {
            config,
            composer,
            connector,
        })
    }

    /// Builds the mail for an event, with the effective sender and recipients.
    pub fn build_message(&self, event: &AlertEvent) -> Result<Message, NotifyError> {
        let alert_override = event.alert.override_for(Self::NAME);
        let sender = effective("from", self.config.from.clone(), alert_override)?;
        let Recipients(to) = effective("to", Recipients(self.config.to.clone()), alert_override)?;
        if to.is_empty() {
            return Err(NotifyError::Config(
                "Recipients list is empty after override".to_string(),
            ));
        }

        let options = serde_json::to_value(&self.config)
            .map_err(|e| NotifyError::Config(format!("unserializable SMTP options: {}", e)))?;
        let context = self
            .composer
            .context(event)
            .with_rule(event.rule.as_deref())
            .with_options(options);

        let subject = self.composer.render(&event.ntype, Variant::Short, &context)?;
        let text = self.composer.render(&event.ntype, Variant::Text, &context)?;
        let mut body = MultiPart::alternative().singlepart(SinglePart::plain(text));
        if self.config.html {
            let html = self.composer.render(&event.ntype, Variant::Html, &context)?;
            body = body.singlepart(SinglePart::html(html));
        }

        let mut builder = Message::builder()
            .from(parse_mailbox(&sender)?)
            .subject(subject);
        for recipient in &to {
            builder = builder.to(parse_mailbox(recipient)?);
        }
        builder
            .multipart(body)
            .map_err(|e| NotifyError::Config(format!("failed to build mail: {}", e)))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|e| NotifyError::Config(format!("invalid mail address '{}': {}", address, e)))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    #[instrument(skip(self, event), fields(handler = "smtp", level = %event.level, alert = %event.alert.name))]
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        debug!("Handler ({}) {}", Self::NAME, event.level);
        let message = self.build_message(event)?;
        debug!(
            recipients = message.envelope().to().len(),
            "Send message to relay {}:{}", self.config.host, self.config.port
        );

        let mut handshake = Handshake::new(&self.config);
        handshake
            .deliver(self.connector.as_ref(), &message)
            .await
            .inspect_err(|e| error!(error = %e, "Failed to send mail notification"))
    }
}

/// Connects to relays with lettre's async SMTP client.
pub struct LettreConnector {
    hello_name: ClientId,
    timeout: Duration,
}

impl LettreConnector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            hello_name: ClientId::default(),
            timeout,
        }
    }
}

#[async_trait]
impl MailConnector for LettreConnector {
    async fn connect(&self, host: &str, port: u16) -> Result<Box<dyn MailSession>, BoxError> {
        let connection = AsyncSmtpConnection::connect_tokio1(
            (host, port),
            Some(self.timeout),
            &self.hello_name,
            None,
            None,
        )
        .await?;
        Ok(Box::new(LettreSession {
            connection,
            host: host.to_string(),
            hello_name: self.hello_name.clone(),
        }))
    }
}

struct LettreSession {
    connection: AsyncSmtpConnection,
    host: String,
    hello_name: ClientId,
}

#[async_trait]
impl MailSession for LettreSession {
    async fn starttls(&mut self) -> Result<(), BoxError> {
        let parameters = TlsParameters::new(self.host.clone())?;
        self.connection
            .starttls(parameters, &self.hello_name)
            .await?;
        Ok(())
    }

    async fn authenticate(&mut self, username: &str, password: &str) -> Result<(), BoxError> {
        let credentials = Credentials::new(username.to_string(), password.to_string());
        self.connection
            .auth(&[Mechanism::Plain, Mechanism::Login], &credentials)
            .await?;
        Ok(())
    }

    async fn send(&mut self, message: &Message) -> Result<(), BoxError> {
        self.connection
            .send(message.envelope(), &message.formatted())
            .await?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(e) = self.connection.quit().await {
            warn!(error = %e, "SMTP QUIT failed, aborting connection");
            self.connection.abort().await;
        }
    }
}
