//! Notification delivery for alerts

use async_trait::async_trait;
use chrono::Local;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

use crate::config::EmailSettings;

use super::render::AlertMessage;

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// SMTP transport failure (connection, authentication, rejected recipient)
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Sender or recipient address could not be parsed
    #[error("Address error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The message could not be assembled
    #[error("Build error: {0}")]
    Build(String),
}

/// Something that can deliver a rendered alert
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one message
    async fn send(&self, message: &AlertMessage) -> Result<(), NotificationError>;
}

/// Outcome of dispatching a batch of messages
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Messages handed off successfully
    pub sent: usize,
    /// Subject and error of each message that failed
    pub failed: Vec<(String, NotificationError)>,
}

impl DispatchReport {
    /// Whether every message was delivered
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Send every message in order
///
/// A failed message is logged and recorded; the remaining ones are still sent.
pub async fn dispatch_all(notifier: &dyn Notifier, messages: &[AlertMessage]) -> DispatchReport {
    let mut report = DispatchReport::default();

    for message in messages {
        match notifier.send(message).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                error!(subject = %message.subject, error = %e, "Failed to send alert");
                report.failed.push((message.subject.clone(), e));
            }
        }
    }

    report
}

/// Sends alerts as HTML mail through an SMTP relay
pub struct SmtpNotifier {
    sender: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpNotifier {
    /// Create a notifier from the mail settings
    pub fn new(settings: &EmailSettings) -> Result<Self, NotificationError> {
        let sender: Mailbox = settings.sender_address.parse()?;

        let relay = if settings.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.server_address)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.server_address)
        };
        let mut builder = relay.port(settings.server_port);

        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            sender,
            transport: builder.build(),
        })
    }

    /// Assemble the MIME message for an alert
    pub fn build_message(&self, message: &AlertMessage) -> Result<Message, NotificationError> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(message.subject.clone())
            .header(ContentType::TEXT_HTML);

        for recipient in &message.recipients {
            builder = builder.to(recipient.parse()?);
        }

        builder
            .body(message.body_with_footer(&Local::now()))
            .map_err(|e| NotificationError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: &AlertMessage) -> Result<(), NotificationError> {
        let email = self.build_message(message)?;
        self.transport.send(email).await?;

        info!(
            recipients = ?message.recipients,
            subject = %message.subject,
            "Alert email sent"
        );
        Ok(())
    }
}

/// Logs alerts instead of sending them (`--no-emails`)
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &AlertMessage) -> Result<(), NotificationError> {
        info!(
            to = %message.recipients.join(", "),
            subject = %message.subject,
            body = %message.body_with_footer(&Local::now()),
            "Skipping sending this email"
        );
        Ok(())
    }
}
