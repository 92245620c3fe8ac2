//! SMTP transport using lettre

use super::{Delivery, Transport};
use crate::mime::build_mime;
use crate::models::Message;
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use lettre::{
    transport::smtp::authentication::Credentials, AsyncSmtpTransport, AsyncTransport,
    Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// How the connection to the relay is secured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS (usually port 465)
    Tls,
    /// Upgrade with STARTTLS (usually port 587)
    #[default]
    StartTls,
    /// Plain text, for local relays like Mailpit/Mailhog
    None,
}

/// SMTP connection options
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpOptions {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub security: SmtpSecurity,
    pub timeout_secs: Option<u64>,
}

impl Default for SmtpOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: None,
            password: None,
            security: SmtpSecurity::StartTls,
            timeout_secs: None,
        }
    }
}

impl SmtpOptions {
    /// Options for Mailhog/Mailpit: localhost:1025 without auth or TLS.
    pub fn mailhog() -> Self {
        Self {
            port: 1025,
            security: SmtpSecurity::None,
            ..Self::default()
        }
    }
}

/// SMTP transport
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpTransport {
    /// Create a new SMTP transport. No connection is made until the first
    /// send or verify.
    pub fn new(options: SmtpOptions) -> Result<Self> {
        let mut builder = match options.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&options.host)
                .wrap_err("Failed to create SMTP relay")?,
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&options.host)
                    .wrap_err("Failed to create SMTP STARTTLS relay")?
            }
            SmtpSecurity::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&options.host),
        }
        .port(options.port);

        if let Some(username) = options.username.filter(|u| !u.is_empty()) {
            let creds = Credentials::new(username, options.password.unwrap_or_default());
            builder = builder.credentials(creds);
        }
        if let Some(secs) = options.timeout_secs {
            builder = builder.timeout(Some(Duration::from_secs(secs)));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, message: &Message) -> Result<Delivery> {
        let mime = build_mime(message).await?;

        let response = self
            .transport
            .send(mime.message)
            .await
            .wrap_err("Failed to send email via SMTP")?;

        let reply: Vec<&str> = response.message().collect();
        let response = format!("{} {}", response.code(), reply.join(" "));

        info!(
            message_id = %mime.message_id,
            to = ?message.to,
            response = %response,
            "Email accepted by SMTP relay"
        );

        Ok(Delivery {
            message_id: mime.message_id,
            envelope: message.envelope(),
            response,
        })
    }

    async fn verify(&self) -> Result<()> {
        let reachable = self
            .transport
            .test_connection()
            .await
            .wrap_err("SMTP verify failed")?;
        if reachable {
            Ok(())
        } else {
            Err(eyre!("SMTP server did not accept the connection test"))
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options: SmtpOptions = serde_json::from_str(r#"{"host":"relay.example.com"}"#).unwrap();
        assert_eq!(options.host, "relay.example.com");
        assert_eq!(options.port, 587);
        assert_eq!(options.security, SmtpSecurity::StartTls);
        assert!(options.username.is_none());
    }

    #[test]
    fn test_mailhog_options() {
        let options = SmtpOptions::mailhog();
        assert_eq!(options.port, 1025);
        assert_eq!(options.security, SmtpSecurity::None);
        assert!(SmtpTransport::new(options).is_ok());
    }

    #[tokio::test]
    async fn test_send_to_closed_port_fails() {
        let transport = SmtpTransport::new(SmtpOptions {
            host: "127.0.0.1".to_string(),
            port: 1,
            security: SmtpSecurity::None,
            timeout_secs: Some(2),
            ..SmtpOptions::default()
        })
        .unwrap();

        let message = Message::new()
            .from_address("sender@example.com")
            .to("rcpt@example.com")
            .with_text("hello");
        assert!(transport.send(&message).await.is_err());
        assert!(transport.verify().await.is_err());
    }
}
