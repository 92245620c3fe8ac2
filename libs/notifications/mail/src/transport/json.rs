//! JSON debug transport: nothing leaves the process

use super::{Delivery, Transport};
use crate::models::{bare_address, Message};
use async_trait::async_trait;
use eyre::{Result, WrapErr};
use tracing::debug;
use uuid::Uuid;

/// Serializes messages to JSON instead of delivering them.
///
/// Used whenever sending is disabled, so development and test runs never
/// reach the network.
#[derive(Debug, Default)]
pub struct JsonTransport;

impl JsonTransport {
    pub fn new() -> Self {
        Self
    }
}

fn message_id_for(message: &Message) -> String {
    let domain = message
        .from
        .as_deref()
        .map(bare_address)
        .and_then(|addr| addr.split_once('@').map(|(_, d)| d.to_string()))
        .unwrap_or_else(|| "localhost".to_string());
    format!("<{}@{}>", Uuid::new_v4(), domain)
}

#[async_trait]
impl Transport for JsonTransport {
    async fn send(&self, message: &Message) -> Result<Delivery> {
        let response =
            serde_json::to_string(message).wrap_err("Failed to serialize message to JSON")?;
        let message_id = message_id_for(message);

        debug!(message_id = %message_id, bytes = response.len(), "Email captured as JSON");

        Ok(Delivery {
            message_id,
            envelope: message.envelope(),
            response,
        })
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_json_transport_serializes_message() {
        let message = Message::new()
            .from_address("Team <team@example.com>")
            .to("user@example.com")
            .with_subject("Hi")
            .with_text("Body");

        let delivery = JsonTransport::new().send(&message).await.unwrap();

        let echoed: Message = serde_json::from_str(&delivery.response).unwrap();
        assert_eq!(echoed, message);
        assert!(delivery.message_id.ends_with("@example.com>"));
        assert_eq!(delivery.envelope.to, vec!["user@example.com"]);
    }

    #[tokio::test]
    async fn test_json_transport_without_sender() {
        let message = Message::new().with_text("anonymous");
        let delivery = JsonTransport::new().send(&message).await.unwrap();
        assert!(delivery.message_id.ends_with("@localhost>"));
        assert!(delivery.envelope.from.is_none());
    }
}
