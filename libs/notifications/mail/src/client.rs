//! Email client
//!
//! Turns a template name, locals and a partial message into a complete
//! [`Message`] and hands it to a transport.

use crate::error::{MailError, MailResult};
use crate::models::{Component, Message, SendResult};
use crate::preview::write_preview;
use crate::templates::TemplateRenderer;
use crate::text::html_to_text;
use crate::transport::Transport;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Renders templates into messages and sends them through one transport
pub struct EmailClient {
    transport: Arc<dyn Transport>,
    renderer: Arc<TemplateRenderer>,
    defaults: Message,
    subject_prefix: Option<String>,
    preview: bool,
}

impl EmailClient {
    pub fn new(transport: Arc<dyn Transport>, renderer: Arc<TemplateRenderer>) -> Self {
        Self {
            transport,
            renderer,
            defaults: Message::default(),
            subject_prefix: None,
            preview: false,
        }
    }

    /// Fields applied under every message
    pub fn with_defaults(mut self, defaults: Message) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_subject_prefix(mut self, prefix: Option<String>) -> Self {
        self.subject_prefix = prefix;
        self
    }

    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Render `template` into `message`.
    ///
    /// Components already set on `message` are kept as given and not
    /// rendered; everything else comes from the template files that exist.
    pub async fn render_message(
        &self,
        template: &str,
        locals: &Value,
        message: Message,
    ) -> MailResult<Message> {
        let provided = provided_components(&message);
        self.assemble(template, locals, message, &provided).await
    }

    async fn assemble(
        &self,
        template: &str,
        locals: &Value,
        mut message: Message,
        skip: &[Component],
    ) -> MailResult<Message> {
        let rendered = self.renderer.render_all(template, locals, skip).await?;
        for (component, value) in rendered.produced() {
            message.set_component(component, value);
        }

        message.subject = message
            .subject
            .take()
            .filter(|subject| !subject.trim().is_empty())
            .map(|subject| match &self.subject_prefix {
                Some(prefix) => format!("{prefix}{subject}").trim().to_string(),
                None => subject.trim().to_string(),
            });

        if message.text.as_deref().is_none_or(|text| text.trim().is_empty()) {
            if let Some(html) = message.html.as_deref().filter(|h| !h.trim().is_empty()) {
                message.text = Some(html_to_text(html)).filter(|text| !text.is_empty());
            }
        }

        if message.is_empty() {
            let err = MailError::Data {
                template: template.to_string(),
            };
            error!(template, error = %err, "Refusing to send empty email");
            return Err(err);
        }

        Ok(message)
    }

    /// Assemble a message from defaults, the call and the template, then send it.
    pub async fn send(
        &self,
        template: &str,
        locals: &Value,
        message: Message,
    ) -> MailResult<SendResult> {
        // Rendered output replaces default components but not the call's own
        let provided = provided_components(&message);
        let merged = message.merged_over(&self.defaults);
        let message = self.assemble(template, locals, merged, &provided).await?;

        if self.preview {
            if let Err(e) = write_preview(&message).await {
                warn!(template, error = %e, "Could not write email preview");
            }
        }

        debug!(template, transport = self.transport.name(), "Dispatching email");
        let delivery = self.transport.send(&message).await.map_err(|e| {
            error!(template, transport = self.transport.name(), error = %e, "Email send failed");
            MailError::Transport(e)
        })?;

        Ok(SendResult {
            message_id: delivery.message_id,
            envelope: delivery.envelope,
            response: delivery.response,
            original_message: message,
        })
    }
}

fn provided_components(message: &Message) -> Vec<Component> {
    Component::ALL
        .into_iter()
        .filter(|c| message.component(*c).is_some())
        .collect()
}
