//! Outgoing mail
//!
//! [`EmailService`] turns an HTML notification into a MIME message and
//! hands it to the SMTP relay configured at startup.

mod encoding;
mod smtp;

pub use smtp::{Envelope, Relay};

use crate::config::SmtpConfig;
use chrono::Utc;
use encoding::header_value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP not configured")]
    NotConfigured,

    #[error("no notification recipients configured")]
    NoRecipients,

    #[error("smtp io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("smtp protocol error: {0}")]
    Protocol(String),

    #[error("{step} rejected: {code} {message}")]
    Rejected {
        step: &'static str,
        code: u16,
        message: String,
    },

    #[error("refusing to send credentials over an unencrypted connection")]
    InsecureAuth,

    #[error("smtp session timed out")]
    Timeout,
}

/// Sends HTML notifications to a fixed list of recipients
#[derive(Debug, Clone)]
pub struct EmailService {
    relay: Option<Relay>,
    from: String,
    recipients: Vec<String>,
}

impl EmailService {
    pub fn new(config: &SmtpConfig) -> Self {
        let relay = config.host().map(|host| Relay {
            host: host.to_string(),
            port: config.port,
            credentials: config
                .user()
                .zip(config.password())
                .map(|(u, p)| (u.to_string(), p.to_string())),
        });

        Self {
            relay,
            from: config.from().to_string(),
            recipients: config.recipients(),
        }
    }

    /// Whether an SMTP host is set
    pub fn is_configured(&self) -> bool {
        self.relay.is_some()
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub async fn send_notification(&self, subject: &str, html: &str) -> Result<(), MailError> {
        let relay = self.relay.as_ref().ok_or(MailError::NotConfigured)?;
        if self.recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let envelope = Envelope {
            from: self.from.clone(),
            recipients: self.recipients.clone(),
            content: self.compose(subject, html),
        };
        smtp::send(relay, &envelope).await?;

        tracing::info!(
            recipients = self.recipients.len(),
            host = %relay.host,
            "notification email sent"
        );
        Ok(())
    }

    fn compose(&self, subject: &str, html: &str) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nDate: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/html; charset=UTF-8\r\n\r\n{}",
            header_value(&self.from),
            header_value(&self.recipients.join(", ")),
            header_value(subject),
            Utc::now().to_rfc2822(),
            html
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config(host: Option<&str>, port: u16, recipients: Option<&str>) -> SmtpConfig {
        SmtpConfig {
            host: host.map(str::to_string),
            port,
            notification_emails: recipients.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_configured_only_with_host() {
        assert!(!EmailService::new(&SmtpConfig::default()).is_configured());
        assert!(EmailService::new(&smtp_config(Some("mailhog"), 1025, None)).is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_errors() {
        let service = EmailService::new(&SmtpConfig::default());
        let err = service.send_notification("s", "<p>x</p>").await.unwrap_err();
        assert!(matches!(err, MailError::NotConfigured));
    }

    #[tokio::test]
    async fn test_no_recipients_errors() {
        let service = EmailService::new(&smtp_config(Some("mailhog"), 1025, None));
        let err = service.send_notification("s", "<p>x</p>").await.unwrap_err();
        assert!(matches!(err, MailError::NoRecipients));
    }

    #[test]
    fn test_compose_headers() {
        let service = EmailService::new(&smtp_config(
            Some("mailhog"),
            1025,
            Some("a@example.org,b@example.org"),
        ));
        let message = service.compose("Hallo Jürgen", "<p>hi</p>");

        assert!(message.starts_with("From: noreply@cc-lippstadt.com\r\n"));
        assert!(message.contains("To: a@example.org, b@example.org\r\n"));
        assert!(message.contains("Subject: =?UTF-8?B?"));
        assert!(message.contains("MIME-Version: 1.0\r\n"));
        assert!(message.contains("Content-Type: text/html; charset=UTF-8\r\n\r\n<p>hi</p>"));
    }

    fn service_on(port: u16) -> EmailService {
        EmailService::new(&SmtpConfig {
            host: Some("127.0.0.1".to_string()),
            port,
            notification_emails: Some("team@example.org".to_string()),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_delivers_message() {
        let (port, server) = smtp::tests::fake_relay(&[]).await;
        service_on(port).send_notification("Test", "<p>hello</p>").await.unwrap();

        let seen = server.await.unwrap();
        assert!(seen.iter().any(|l| l == "RCPT TO:<team@example.org>"));
        assert!(seen.iter().any(|l| l == "<p>hello</p>"));
    }

    #[tokio::test]
    async fn test_upgrades_when_starttls_advertised() {
        // The fake relay does not implement STARTTLS and answers 500
        let (port, server) = smtp::tests::fake_relay(&["STARTTLS"]).await;
        let err = service_on(port).send_notification("Test", "<p>hello</p>").await.unwrap_err();

        assert!(matches!(err, MailError::Rejected { step: "STARTTLS", code: 500, .. }));
        let seen = server.await.unwrap();
        assert_eq!(seen.last().map(String::as_str), Some("STARTTLS"));
    }
}
