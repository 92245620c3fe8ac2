//! Mail service
//!
//! [`Mailer`] owns the configuration, the template renderer and a swappable
//! transport. It applies the service wide policies (default locals, forced
//! recipients, send logging) on top of [`EmailClient`].

use crate::client::EmailClient;
use crate::config::MailConfig;
use crate::error::{MailError, MailResult};
use crate::models::{Message, SendResult};
use crate::templates::{TemplateRenderer, DEFAULT_CACHE_CAPACITY};
use crate::transport::{TransportConfig, Verification};
use core_config::Environment;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// One send call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendRequest {
    /// Template name (relative to the root) or absolute template path
    pub template: String,
    #[serde(default)]
    pub message: Message,
    /// Shallow-merged over the configured locals
    #[serde(default)]
    pub locals: Map<String, Value>,
}

impl SendRequest {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.message = message;
        self
    }

    pub fn with_local(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.locals.insert(key.into(), value.into());
        self
    }
}

/// Outcome of installing a transport
#[derive(Debug, Clone, Serialize)]
pub struct TransportSetup {
    /// Name of the transport actually installed
    pub name: &'static str,
    /// Result of verify-on-setup, when it was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<Verification>,
}

/// Templated mail service
pub struct Mailer {
    config: MailConfig,
    environment: Environment,
    renderer: Arc<TemplateRenderer>,
    client: RwLock<Option<Arc<EmailClient>>>,
}

impl Mailer {
    /// Create the service. No transport is installed until [`Mailer::init`]
    /// or [`Mailer::use_transport`] is called.
    pub fn new(config: MailConfig, environment: Environment) -> MailResult<Self> {
        let root = config.templates.root()?;

        let mut renderer = TemplateRenderer::new(root);
        if config.templates.cache && environment.allows_caching() {
            renderer = renderer.with_cache(DEFAULT_CACHE_CAPACITY);
        }

        Ok(Self {
            config,
            environment,
            renderer: Arc::new(renderer),
            client: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn renderer(&self) -> &Arc<TemplateRenderer> {
        &self.renderer
    }

    /// Log the active settings and install the configured transport, if any.
    pub async fn init(&self) -> MailResult<Option<TransportSetup>> {
        if let Some(to) = self.config.forced_recipients() {
            info!(to = ?to, "Mail force to");
        }
        info!(
            preview = self.config.preview,
            send = self.config.send,
            log = %self.config.log.describe(),
            template_root = %self.renderer.root().display(),
            template_cache = self.renderer.cache_enabled(),
            environment = ?self.environment,
            "Mail setup"
        );

        let setup = match &self.config.transport {
            Some(descriptor) => {
                let transport = TransportConfig::from_descriptor(descriptor)?;
                Some(self.use_transport(transport).await?)
            }
            None => {
                debug!("No mail transport configured during init");
                None
            }
        };
        Ok(setup)
    }

    /// Install a transport, replacing the previous one.
    ///
    /// When sending is disabled the JSON transport is installed instead.
    pub async fn use_transport(&self, transport: TransportConfig) -> MailResult<TransportSetup> {
        let transport = if self.config.send {
            transport
        } else {
            if !matches!(transport, TransportConfig::Json) {
                info!(requested = transport.kind(), "Mail send disabled; forcing JSON transport");
            }
            TransportConfig::Json
        };

        let (transport, verification) = transport.build().await?;
        let name = transport.name();

        let client = EmailClient::new(transport, self.renderer.clone())
            .with_defaults(self.config.message.clone())
            .with_subject_prefix(self.config.active_subject_prefix().map(String::from))
            .with_preview(self.config.preview);
        *self.client.write().await = Some(Arc::new(client));

        debug!(transport = name, "Mail transport configured");
        Ok(TransportSetup { name, verification })
    }

    /// Name of the installed transport
    pub async fn transport_name(&self) -> Option<&'static str> {
        self.client
            .read()
            .await
            .as_ref()
            .map(|client| client.transport().name())
    }

    /// Check that the installed transport can reach its backend.
    pub async fn verify(&self) -> Verification {
        let Some(client) = self.client.read().await.clone() else {
            return Verification::failure(MailError::Operation("Unconfigured transport.".into()));
        };
        match client.transport().verify().await {
            Ok(()) => Verification::success(),
            Err(e) => Verification::failure(format!("{e:#}")),
        }
    }

    /// Render and send a templated message.
    ///
    /// Returns `None` when no transport is installed.
    pub async fn send(&self, request: SendRequest) -> MailResult<Option<SendResult>> {
        let Some(client) = self.client.read().await.clone() else {
            warn!(template = %request.template, "No mail transport configured; message dropped");
            return Ok(None);
        };

        let mut locals = self.config.locals.clone();
        locals.extend(request.locals);

        let mut message = request.message;
        if let Some(to) = self.config.forced_recipients() {
            message.to = to.to_vec();
        }

        let result = client
            .send(&request.template, &Value::Object(locals), message)
            .await?;

        debug!(
            message_id = %result.message_id,
            from = ?result.envelope.from,
            to = ?result.envelope.to,
            subject = ?result.original_message.subject,
            "sent"
        );
        if self.config.log.any() {
            info!("{}", describe_sent(&result, &self.config));
        }

        Ok(Some(result))
    }
}

/// Multi-line summary of a sent message, limited to the enabled log parts.
fn describe_sent(result: &SendResult, config: &MailConfig) -> String {
    let message = &result.original_message;
    let mut out = String::from("sent email:\n");
    if config.log.headers {
        let _ = writeln!(out, "From: {}", message.from.as_deref().unwrap_or_default());
        let _ = writeln!(out, "To: {}", message.to.join(", "));
        let _ = writeln!(out, "Subject: {}", message.subject.as_deref().unwrap_or_default());
        let _ = writeln!(out, "Message-ID: {}", result.message_id);
    }
    if config.log.text {
        out.push('\n');
        out.push_str(message.text.as_deref().unwrap_or_default());
    }
    if config.log.html {
        out.push('\n');
        out.push_str(message.html.as_deref().unwrap_or_default());
    }
    out
}
