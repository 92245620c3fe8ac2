//! Capturing transport for tests

use super::{Delivery, Transport};
use crate::models::Message;
use async_trait::async_trait;
use eyre::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Transport that records every message it is handed
#[derive(Clone, Default)]
pub struct MockTransport {
    sent: Arc<Mutex<Vec<Message>>>,
    failure_message: Option<String>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose sends and verifies always fail
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failure_message: Some(message.into()),
        }
    }

    pub async fn sent_messages(&self) -> Vec<Message> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }

    /// Whether any captured message was addressed to `address`
    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent
            .lock()
            .await
            .iter()
            .any(|m| m.envelope().to.iter().any(|to| to == address))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: &Message) -> Result<Delivery> {
        if let Some(failure) = &self.failure_message {
            return Err(eyre::eyre!(failure.clone()));
        }

        let mut sent = self.sent.lock().await;
        sent.push(message.clone());

        Ok(Delivery {
            message_id: format!("<mock-{}@localhost>", sent.len()),
            envelope: message.envelope(),
            response: "250 captured".to_string(),
        })
    }

    async fn verify(&self) -> Result<()> {
        match &self.failure_message {
            Some(failure) => Err(eyre::eyre!("verify failed: {}", failure)),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_captures_messages() {
        let transport = MockTransport::new();
        let message = Message::new()
            .to("Ann <ann@example.com>")
            .with_subject("Test Subject")
            .with_text("Test body");

        let delivery = transport.send(&message).await.unwrap();
        assert_eq!(delivery.message_id, "<mock-1@localhost>");
        assert_eq!(transport.sent_count().await, 1);
        assert!(transport.was_sent_to("ann@example.com").await);
        assert!(!transport.was_sent_to("other@example.com").await);

        transport.clear().await;
        assert!(transport.sent_messages().await.is_empty());
    }

    #[tokio::test]
    async fn test_mock_transport_fails() {
        let transport = MockTransport::failing("Simulated failure");
        let message = Message::new().with_text("Body");

        let err = transport.send(&message).await.unwrap_err();
        assert!(err.to_string().contains("Simulated failure"));
        assert!(transport.verify().await.is_err());
        assert_eq!(transport.sent_count().await, 0);
    }
}
