//! Send emails to users for credential updates.

use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Mail;

#[derive(thiserror::Error, Debug)]
pub enum MailError {
    #[error("invalid mailbox address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to assemble message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error(transparent)]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// SMTP relay manager.
#[derive(Clone, Default)]
pub struct MailManager {
    from: Option<Mailbox>,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl MailManager {
    /// Create a new [`MailManager`].
    pub fn new(config: &Mail) -> Result<Self, MailError> {
        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(
                &config.address,
            )?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        if let Some(port) = config.port {
            builder = builder.port(port);
        }

        tracing::info!(address = %config.address, "smtp relay configured");

        Ok(Self {
            from: Some(config.from.parse()?),
            transport: Some(builder.build()),
        })
    }

    /// Deliver a plain-text message.
    ///
    /// Without a configured transport the call logs the skip and reports
    /// success.
    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError> {
        let (Some(from), Some(transport)) = (&self.from, &self.transport)
        else {
            tracing::debug!(%to, "mail transport not configured, delivery skipped");
            return Ok(());
        };

        let message = Message::builder()
            .from(from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())?;

        transport.send(message).await?;

        tracing::trace!(%to, "mail delivered");

        Ok(())
    }
}
