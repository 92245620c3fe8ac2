//! Mail transports
//!
//! A transport takes a fully assembled [`Message`] and delivers it (or
//! pretends to). Which one is active is decided once, from a
//! [`TransportConfig`], when the transport is installed.

pub mod json;
pub mod mock;
pub mod sendgrid;
pub mod ses;
pub mod smtp;

pub use json::JsonTransport;
pub use mock::MockTransport;
pub use sendgrid::{SendGridOptions, SendGridTransport};
pub use ses::{SesOptions, SesTransport};
pub use smtp::{SmtpOptions, SmtpSecurity, SmtpTransport};

use crate::error::{MailError, MailResult};
use crate::models::{Envelope, Message};
use async_trait::async_trait;
use eyre::Result;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// What a transport reports back after accepting a message
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message_id: String,
    pub envelope: Envelope,
    /// Raw response (SMTP reply, API body, JSON rendition)
    pub response: String,
}

/// Trait for mail transports
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a message
    async fn send(&self, message: &Message) -> Result<Delivery>;

    /// Check that the transport can reach its backend.
    ///
    /// Transports without a native check succeed.
    async fn verify(&self) -> Result<()> {
        Ok(())
    }

    /// Transport name, for logs
    fn name(&self) -> &'static str;
}

/// Outcome of a connectivity check
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Verification {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Verification {
    pub fn success() -> Self {
        Self {
            verified: true,
            error: None,
        }
    }

    pub fn failure(error: impl fmt::Display) -> Self {
        Self {
            verified: false,
            error: Some(error.to_string()),
        }
    }
}

/// Which transport to install
#[derive(Clone)]
pub enum TransportConfig {
    /// Caller supplied transport, used as-is
    Custom(Arc<dyn Transport>),
    /// SMTP relay, optionally verified while being installed
    Smtp { options: SmtpOptions, verify: bool },
    /// AWS SES v2 API
    Ses(SesOptions),
    /// SendGrid v3 API
    SendGrid(SendGridOptions),
    /// Serialize messages to JSON instead of delivering them
    Json,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(transport) => write!(f, "Custom({})", transport.name()),
            Self::Smtp { options, verify } => f
                .debug_struct("Smtp")
                .field("host", &options.host)
                .field("port", &options.port)
                .field("verify", verify)
                .finish(),
            Self::Ses(options) => f.debug_tuple("Ses").field(&options.region).finish(),
            Self::SendGrid(_) => f.write_str("SendGrid"),
            Self::Json => f.write_str("Json"),
        }
    }
}

/// Serialized transport description, discriminated by `type`.
///
/// `options` is interpreted according to `type`; validation happens in
/// [`TransportConfig::from_descriptor`] so an unknown type can be reported
/// by name.
#[derive(Debug, Clone, Deserialize, serde::Serialize, PartialEq)]
pub struct TransportDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub options: serde_json::Value,
    #[serde(default)]
    pub verify: bool,
}

impl TransportDescriptor {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: serde_json::Value::Null,
            verify: false,
        }
    }
}

fn options<T: serde::de::DeserializeOwned + Default>(value: &serde_json::Value) -> MailResult<T> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone())
        .map_err(|e| MailError::Configuration(format!("Invalid transport options: {e}")))
}

impl TransportConfig {
    /// Turn a serialized descriptor into a transport configuration.
    pub fn from_descriptor(descriptor: &TransportDescriptor) -> MailResult<Self> {
        match descriptor.kind.to_ascii_lowercase().as_str() {
            "smtp" => Ok(Self::Smtp {
                options: options(&descriptor.options)?,
                verify: descriptor.verify,
            }),
            "ses" => Ok(Self::Ses(options(&descriptor.options)?)),
            "sendgrid" => Ok(Self::SendGrid(options(&descriptor.options)?)),
            "json" => Ok(Self::Json),
            "custom" | "transporter" => Err(MailError::Configuration(
                "Custom transports must be installed programmatically".to_string(),
            )),
            _ => Err(MailError::Configuration(format!(
                "Unknown mail transport type \"{}\"",
                descriptor.kind
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Custom(_) => "custom",
            Self::Smtp { .. } => "smtp",
            Self::Ses(_) => "ses",
            Self::SendGrid(_) => "sendgrid",
            Self::Json => "json",
        }
    }

    /// Construct the transport. SMTP verification, when requested, is
    /// attempted and logged but never fails construction.
    pub async fn build(self) -> MailResult<(Arc<dyn Transport>, Option<Verification>)> {
        match self {
            Self::Custom(transport) => {
                info!(transport = transport.name(), "Using custom transport");
                Ok((transport, None))
            }
            Self::Smtp { options, verify } => {
                info!(host = %options.host, port = options.port, "Using SMTP transport");
                let transport = SmtpTransport::new(options)
                    .map_err(|e| MailError::Configuration(format!("{e:#}")))?;
                let verification = if verify {
                    Some(match transport.verify().await {
                        Ok(()) => {
                            info!("SMTP verify call success");
                            Verification::success()
                        }
                        Err(e) => {
                            error!(error = %e, "SMTP verify call failed");
                            Verification::failure(e)
                        }
                    })
                } else {
                    None
                };
                Ok((Arc::new(transport), verification))
            }
            Self::Ses(options) => {
                info!(region = ?options.region, "Using AWS SES transport");
                Ok((Arc::new(SesTransport::from_options(options).await), None))
            }
            Self::SendGrid(options) => {
                info!("Using SendGrid transport");
                let transport = SendGridTransport::new(options)
                    .map_err(|e| MailError::Configuration(format!("{e:#}")))?;
                Ok((Arc::new(transport), None))
            }
            Self::Json => {
                info!("Using JSON debug transport");
                Ok((Arc::new(JsonTransport::new()), None))
            }
        }
    }
}
