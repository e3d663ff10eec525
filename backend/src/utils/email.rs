use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

/// A fully composed message handed to a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub plain_text: String,
    pub html: String,
}

/// Outbound mail collaborator. One delivery attempt per call.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

pub const PASSWORD_RESET_SUBJECT: &str = "Reset your password";

pub fn password_reset_email(to: &str, reset_url: &str) -> OutgoingEmail {
    let plain_text = format!(
        "To reset your password, please visit the following link: {}\n\n\
         The link can be used once and expires soon. If you did not ask for a reset, you can ignore this email.",
        reset_url
    );
    let escaped = escape_html(reset_url);
    let html = format!(
        "<p>To reset your password, please visit the following link: \
         <a href=\"{0}\">{0}</a></p>\
         <p>The link can be used once and expires soon. If you did not ask for a reset, you can ignore this email.</p>",
        escaped
    );

    OutgoingEmail {
        to: to.to_string(),
        subject: PASSWORD_RESET_SUBJECT.to_string(),
        plain_text,
        html,
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: Mailbox,
    skip_send: bool,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from_address: Mailbox = config
            .from_address
            .parse()
            .with_context(|| format!("Invalid SMTP_FROM_ADDRESS: {}", config.from_address))?;

        let mailer = if config.username.is_empty() {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
                .port(config.port)
                .build()
        } else {
            let creds = Credentials::new(config.username.clone(), config.password.clone());
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
                .port(config.port)
                .credentials(creds)
                .build()
        };

        Ok(Self {
            mailer,
            from_address,
            skip_send: config.skip_send,
        })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message> {
        let message = Message::builder()
            .from(self.from_address.clone())
            .to(email.to.parse().context("invalid recipient address")?)
            .subject(email.subject.as_str())
            .multipart(MultiPart::alternative_plain_html(
                email.plain_text.clone(),
                email.html.clone(),
            ))?;
        Ok(message)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let message = self.build_message(&email)?;
        if self.skip_send {
            tracing::info!(subject = %email.subject, "SMTP_SKIP_SEND set, not delivering email");
            return Ok(());
        }
        self.mailer.send(message).await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    //! Mailer doubles.

    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// Records every message instead of delivering it.
    #[derive(Clone, Default)]
    pub struct RecordingMailer {
        sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<OutgoingEmail> {
            self.sent
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone()
        }

        /// Waits until at least `count` messages were recorded or the timeout
        /// elapses, then returns what was recorded.
        pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<OutgoingEmail> {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                let sent = self.sent();
                if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: OutgoingEmail) -> Result<()> {
            self.sent
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(email);
            Ok(())
        }
    }

    /// Fails every delivery.
    #[derive(Clone, Default)]
    pub struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _email: OutgoingEmail) -> Result<()> {
            Err(anyhow::anyhow!("smtp unavailable"))
        }
    }
}
