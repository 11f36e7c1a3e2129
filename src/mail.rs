use async_trait::async_trait;
use log::info;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("no sender address configured")]
    MissingSender,

    #[error("{0}")]
    Delivery(String),
}

/// Outbound email delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Writes outgoing mail to the log instead of a mail server.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: &str) -> Self {
        LogMailer {
            from: from.trim().to_string(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        if self.from.is_empty() {
            return Err(MailError::MissingSender);
        }
        info!(
            "Outgoing email from {} to {} [{}]\n{}",
            self.from, message.to, message.subject, message.body
        );
        Ok(())
    }
}
