//! SendGrid transport
//!
//! Sends messages through the SendGrid v3 HTTP API.

use super::{Delivery, Transport};
use crate::models::{bare_address, Message};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use eyre::{eyre, Result, WrapErr};
use lettre::message::Mailbox;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// SendGrid API endpoint
const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// SendGrid transport options
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SendGridOptions {
    /// API key; falls back to `SENDGRID_API_KEY`
    pub api_key: Option<String>,
    /// Endpoint override, for tests and proxies
    pub api_url: Option<String>,
}

/// SendGrid transport
pub struct SendGridTransport {
    api_key: String,
    api_url: String,
    client: Client,
}

impl SendGridTransport {
    pub fn new(options: SendGridOptions) -> Result<Self> {
        let api_key = options
            .api_key
            .or_else(|| std::env::var("SENDGRID_API_KEY").ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| eyre!("SendGrid API key not configured"))?;

        Ok(Self {
            api_key,
            api_url: options
                .api_url
                .unwrap_or_else(|| SENDGRID_API_URL.to_string()),
            client: Client::new(),
        })
    }
}

/// SendGrid API request payload
#[derive(Debug, Serialize)]
struct SendGridRequest {
    personalizations: Vec<Personalization>,
    from: EmailAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<EmailAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    content: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<SendGridAttachment>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    headers: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct Personalization {
    to: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<EmailAddress>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<EmailAddress>,
}

#[derive(Debug, Serialize)]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl EmailAddress {
    fn parse(raw: &str) -> Self {
        match raw.parse::<Mailbox>() {
            Ok(mailbox) => Self {
                email: mailbox.email.to_string(),
                name: mailbox.name,
            },
            Err(_) => Self {
                email: bare_address(raw),
                name: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct SendGridAttachment {
    content: String,
    filename: String,
    #[serde(rename = "type")]
    content_type: String,
    disposition: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_id: Option<String>,
}

async fn build_request(message: &Message) -> Result<SendGridRequest> {
    let from = message
        .from
        .as_deref()
        .map(EmailAddress::parse)
        .ok_or_else(|| eyre!("Message has no \"from\" address"))?;

    // SendGrid wants text/plain before text/html
    let mut content = Vec::new();
    if let Some(text) = &message.text {
        content.push(Content {
            content_type: "text/plain".to_string(),
            value: text.clone(),
        });
    }
    if let Some(html) = &message.html {
        content.push(Content {
            content_type: "text/html".to_string(),
            value: html.clone(),
        });
    }

    let mut attachments = Vec::new();
    for attachment in message.attachments.iter().flatten() {
        let bytes = attachment
            .load()
            .await
            .wrap_err_with(|| format!("Failed to load attachment {}", attachment.filename))?;
        attachments.push(SendGridAttachment {
            content: STANDARD.encode(bytes),
            filename: attachment.filename.clone(),
            content_type: attachment.content_type_or_default().to_string(),
            disposition: if attachment.cid.is_some() {
                "inline"
            } else {
                "attachment"
            },
            content_id: attachment.cid.clone(),
        });
    }

    let addresses = |list: &[String]| -> Vec<EmailAddress> {
        list.iter().map(|a| EmailAddress::parse(a)).collect()
    };

    Ok(SendGridRequest {
        personalizations: vec![Personalization {
            to: addresses(&message.to),
            cc: addresses(&message.cc),
            bcc: addresses(&message.bcc),
        }],
        from,
        reply_to: message.reply_to.as_deref().map(EmailAddress::parse),
        subject: message.subject.clone(),
        content,
        attachments,
        headers: message.headers.clone(),
    })
}

#[async_trait]
impl Transport for SendGridTransport {
    async fn send(&self, message: &Message) -> Result<Delivery> {
        let request = build_request(message).await?;

        debug!(to = ?message.to, subject = ?message.subject, "Sending email via SendGrid");

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| eyre!("SendGrid request failed: {}", e))?;

        let status = response.status();
        let message_id = response
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, error = %body, "SendGrid API error");
            return match status.as_u16() {
                429 => Err(eyre!("rate limit exceeded")),
                400 => Err(eyre!("invalid request: {}", body)),
                401 | 403 => Err(eyre!("authentication failed")),
                _ => Err(eyre!("SendGrid error ({}): {}", status, body)),
            };
        }

        let message_id = message_id.unwrap_or_else(|| format!("<{}@sendgrid>", uuid::Uuid::new_v4()));
        debug!(message_id = %message_id, "Email sent successfully");

        Ok(Delivery {
            message_id,
            envelope: message.envelope(),
            response: format!("{} {}", status, body).trim().to_string(),
        })
    }

    async fn verify(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(eyre!("SendGrid API key not configured"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "sendgrid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Attachment;

    #[test]
    fn test_email_address_parses_display_name() {
        let addr = EmailAddress::parse("Test User <test@example.com>");
        assert_eq!(addr.email, "test@example.com");
        assert_eq!(addr.name.as_deref(), Some("Test User"));

        let json = serde_json::to_string(&EmailAddress::parse("plain@example.com")).unwrap();
        assert_eq!(json, r#"{"email":"plain@example.com"}"#);
    }

    #[tokio::test]
    async fn test_request_payload_shape() {
        let message = Message::new()
            .from_address("Team <team@example.com>")
            .to("a@example.com")
            .bcc("audit@example.com")
            .with_subject("Hi")
            .with_text("plain")
            .with_html("<p>rich</p>")
            .with_attachment(Attachment::from_bytes("a.txt", b"hello".to_vec()).inline("a"));

        let payload = serde_json::to_value(build_request(&message).await.unwrap()).unwrap();

        assert_eq!(payload["from"]["name"], "Team");
        assert_eq!(payload["personalizations"][0]["bcc"][0]["email"], "audit@example.com");
        assert!(payload["personalizations"][0].get("cc").is_none());
        assert_eq!(payload["content"][0]["type"], "text/plain");
        assert_eq!(payload["content"][1]["type"], "text/html");
        assert_eq!(payload["attachments"][0]["content"], "aGVsbG8=");
        assert_eq!(payload["attachments"][0]["disposition"], "inline");
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        temp_env::with_var_unset("SENDGRID_API_KEY", || {
            assert!(SendGridTransport::new(SendGridOptions::default()).is_err());
        });
    }
}
