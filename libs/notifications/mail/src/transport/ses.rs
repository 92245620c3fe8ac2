//! AWS SES (Simple Email Service) transport
//!
//! Messages are built as raw MIME (so attachments and inline images work)
//! and submitted through the SES v2 `SendEmail` API.
//!
//! Credentials come from the standard AWS SDK chain:
//! - Environment variables: `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`
//! - IAM roles (EKS IRSA, EC2 instance profile)
//! - Shared credentials file

use super::{Delivery, Transport};
use crate::mime::build_mime;
use crate::models::Message;
use async_trait::async_trait;
use aws_sdk_sesv2::primitives::Blob;
use aws_sdk_sesv2::types::{Destination, EmailContent, RawMessage};
use aws_sdk_sesv2::Client;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// SES transport options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SesOptions {
    /// Region override; falls back to `AWS_SES_REGION` then the SDK default
    pub region: Option<String>,
    /// Custom endpoint (LocalStack and friends)
    pub endpoint_url: Option<String>,
    /// SES configuration set used for event publishing
    pub configuration_set: Option<String>,
}

/// AWS SES transport
pub struct SesTransport {
    client: Client,
    configuration_set: Option<String>,
}

impl SesTransport {
    /// Create a transport around an existing SES client
    pub fn new(client: Client, configuration_set: Option<String>) -> Self {
        Self {
            client,
            configuration_set,
        }
    }

    /// Load AWS configuration from the environment, applying overrides.
    pub async fn from_options(options: SesOptions) -> Self {
        let region = options
            .region
            .or_else(|| std::env::var("AWS_SES_REGION").ok());

        let mut config_loader = aws_config::from_env();
        if let Some(region) = region {
            config_loader = config_loader.region(aws_config::Region::new(region));
        }
        if let Some(endpoint) = options.endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint);
        }

        let config = config_loader.load().await;
        Self::new(Client::new(&config), options.configuration_set)
    }
}

#[async_trait]
impl Transport for SesTransport {
    async fn send(&self, message: &Message) -> Result<Delivery> {
        let mime = build_mime(message).await?;
        let envelope = message.envelope();

        let raw = RawMessage::builder()
            .data(Blob::new(mime.formatted()))
            .build()?;
        let content = EmailContent::builder().raw(raw).build();
        let destination = Destination::builder()
            .set_to_addresses(Some(envelope.to.clone()))
            .build();

        let mut request = self
            .client
            .send_email()
            .destination(destination)
            .content(content);
        if let Some(from) = &message.from {
            request = request.from_email_address(from);
        }
        if let Some(set) = &self.configuration_set {
            request = request.configuration_set_name(set);
        }

        debug!(to = ?envelope.to, subject = ?message.subject, "Sending email via AWS SES");

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "AWS SES send failed");
            eyre!("SES error: {}", e)
        })?;

        let message_id = response
            .message_id()
            .map(|id| id.to_string())
            .unwrap_or(mime.message_id);

        debug!(message_id = %message_id, "Email sent successfully via AWS SES");

        Ok(Delivery {
            response: format!("SES accepted {}", message_id),
            message_id,
            envelope,
        })
    }

    async fn verify(&self) -> Result<()> {
        // GetAccount is a lightweight call that confirms credentials and access
        self.client
            .get_account()
            .send()
            .await
            .map_err(|e| eyre!("AWS SES verify failed: {}", e))?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ses"
    }
}
