use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// One independently rendered part of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Subject,
    Html,
    Text,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Subject, Component::Html, Component::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Subject => "subject",
            Component::Html => "html",
            Component::Text => "text",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File attached to a message.
///
/// Content is either carried in memory (base64 in JSON) or read from `path`
/// when the message is built for delivery. Setting `cid` makes the
/// attachment inline so html can reference it as `cid:<id>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_content"
    )]
    pub content: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl Attachment {
    pub const DEFAULT_CONTENT_TYPE: &'static str = "application/octet-stream";

    /// Attachment with in-memory content
    pub fn from_bytes(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: None,
            cid: None,
            content: Some(content.into()),
            path: None,
        }
    }

    /// Attachment read from disk at send time
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        Self {
            filename,
            content_type: None,
            cid: None,
            content: None,
            path: Some(path),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Mark the attachment inline under the given content id
    pub fn inline(mut self, cid: impl Into<String>) -> Self {
        self.cid = Some(cid.into());
        self
    }

    pub fn content_type_or_default(&self) -> &str {
        self.content_type
            .as_deref()
            .unwrap_or(Self::DEFAULT_CONTENT_TYPE)
    }

    /// Load the attachment bytes, reading `path` if no content is carried.
    pub async fn load(&self) -> std::io::Result<Vec<u8>> {
        match (&self.content, &self.path) {
            (Some(content), _) => Ok(content.clone()),
            (None, Some(path)) => tokio::fs::read(path).await,
            (None, None) => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("attachment \"{}\" has neither content nor path", self.filename),
            )),
        }
    }
}

mod base64_content {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_str(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(d)?;
        encoded
            .map(|e| STANDARD.decode(e).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Email message as handed to a transport.
///
/// `attachments` distinguishes "not set" (`None`) from "explicitly empty" so
/// layered defaults can tell which list wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    /// Extra transport specific headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_address(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to.push(to.into());
        self
    }

    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc.push(cc.into());
        self
    }

    pub fn bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.get_or_insert_with(Vec::new).push(attachment);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn component(&self, component: Component) -> Option<&str> {
        match component {
            Component::Subject => self.subject.as_deref(),
            Component::Html => self.html.as_deref(),
            Component::Text => self.text.as_deref(),
        }
    }

    pub fn set_component(&mut self, component: Component, value: String) {
        match component {
            Component::Subject => self.subject = Some(value),
            Component::Html => self.html = Some(value),
            Component::Text => self.text = Some(value),
        }
    }

    /// Layer `self` (more specific) over `defaults`.
    ///
    /// Scalar fields and recipient lists set on `self` win; headers are
    /// merged key by key. Attachments are never concatenated: the call list,
    /// else the default list, else empty.
    pub fn merged_over(self, defaults: &Message) -> Message {
        fn list(own: Vec<String>, default: &[String]) -> Vec<String> {
            if own.is_empty() {
                default.to_vec()
            } else {
                own
            }
        }

        let mut headers = defaults.headers.clone();
        headers.extend(self.headers);

        Message {
            from: self.from.or_else(|| defaults.from.clone()),
            to: list(self.to, &defaults.to),
            cc: list(self.cc, &defaults.cc),
            bcc: list(self.bcc, &defaults.bcc),
            reply_to: self.reply_to.or_else(|| defaults.reply_to.clone()),
            subject: self.subject.or_else(|| defaults.subject.clone()),
            html: self.html.or_else(|| defaults.html.clone()),
            text: self.text.or_else(|| defaults.text.clone()),
            attachments: Some(
                self.attachments
                    .or_else(|| defaults.attachments.clone())
                    .unwrap_or_default(),
            ),
            headers,
        }
    }

    pub fn has_attachments(&self) -> bool {
        self.attachments.as_ref().is_some_and(|a| !a.is_empty())
    }

    /// True when there is nothing worth delivering.
    pub fn is_empty(&self) -> bool {
        fn blank(value: &Option<String>) -> bool {
            value.as_deref().is_none_or(|v| v.trim().is_empty())
        }
        blank(&self.subject) && blank(&self.html) && blank(&self.text) && !self.has_attachments()
    }

    /// SMTP envelope derived from the header fields.
    pub fn envelope(&self) -> Envelope {
        Envelope {
            from: self.from.as_deref().map(bare_address),
            to: self
                .to
                .iter()
                .chain(&self.cc)
                .chain(&self.bcc)
                .map(|a| bare_address(a))
                .collect(),
        }
    }
}

/// Extract `user@host` from `Display Name <user@host>`.
pub fn bare_address(mailbox: &str) -> String {
    match mailbox.parse::<lettre::message::Mailbox>() {
        Ok(parsed) => parsed.email.to_string(),
        Err(_) => mailbox.trim().to_string(),
    }
}

/// Sender and recipients as used on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub from: Option<String>,
    pub to: Vec<String>,
}

/// Result of a successful send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    /// Message-ID header of the delivered message
    pub message_id: String,
    pub envelope: Envelope,
    /// Raw transport response (SMTP reply, API body, JSON rendition, ...)
    pub response: String,
    /// The fully assembled message that was submitted
    pub original_message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_call_fields_win() {
        let defaults = Message::new()
            .from_address("Team <team@example.com>")
            .with_subject("default subject")
            .with_header("X-Env", "staging");
        let call = Message::new()
            .to("user@example.com")
            .with_subject("call subject")
            .with_header("X-Trace", "abc");

        let merged = call.merged_over(&defaults);
        assert_eq!(merged.from.as_deref(), Some("Team <team@example.com>"));
        assert_eq!(merged.subject.as_deref(), Some("call subject"));
        assert_eq!(merged.to, vec!["user@example.com"]);
        assert_eq!(merged.headers.len(), 2);
    }

    #[test]
    fn test_merge_attachments_most_specific_list_wins() {
        let defaults = Message::new()
            .with_attachment(Attachment::from_bytes("logo.png", b"png".to_vec()));

        let merged = Message::new().merged_over(&defaults);
        assert_eq!(merged.attachments.as_ref().map(Vec::len), Some(1));

        let call = Message::new()
            .with_attachment(Attachment::from_bytes("a.txt", b"a".to_vec()))
            .with_attachment(Attachment::from_bytes("b.txt", b"b".to_vec()));
        let merged = call.merged_over(&defaults);
        let names: Vec<_> = merged
            .attachments
            .unwrap()
            .into_iter()
            .map(|a| a.filename)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);

        let merged = Message::new().merged_over(&Message::new());
        assert_eq!(merged.attachments, Some(Vec::new()));
    }

    #[test]
    fn test_empty_message_detection() {
        assert!(Message::new().to("a@example.com").is_empty());
        assert!(Message::new().with_subject("").is_empty());
        assert!(!Message::new().with_text("hi").is_empty());
        assert!(!Message::new()
            .with_attachment(Attachment::from_bytes("a.bin", vec![1]))
            .is_empty());
    }

    #[test]
    fn test_envelope_uses_bare_addresses() {
        let message = Message::new()
            .from_address("Sender <sender@example.com>")
            .to("Alice <alice@example.com>")
            .cc("bob@example.com")
            .bcc("Carol <carol@example.com>");

        let envelope = message.envelope();
        assert_eq!(envelope.from.as_deref(), Some("sender@example.com"));
        assert_eq!(
            envelope.to,
            vec!["alice@example.com", "bob@example.com", "carol@example.com"]
        );
    }

    #[test]
    fn test_attachment_content_serializes_as_base64() {
        let attachment = Attachment::from_bytes("hello.txt", b"hello".to_vec()).inline("hello");
        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["content"], "aGVsbG8=");
        assert_eq!(json["cid"], "hello");

        let back: Attachment = serde_json::from_value(json).unwrap();
        assert_eq!(back.content.as_deref(), Some(&b"hello"[..]));
    }

    #[tokio::test]
    async fn test_attachment_without_source_fails_to_load() {
        let attachment = Attachment {
            filename: "ghost.bin".to_string(),
            content_type: None,
            cid: None,
            content: None,
            path: None,
        };
        assert!(attachment.load().await.is_err());
    }
}
