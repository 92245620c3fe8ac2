//! MIME assembly with lettre, shared by SMTP, SES and preview.

use crate::models::{Attachment, Message};
use eyre::{eyre, Result, WrapErr};
use lettre::message::{
    header::ContentType, Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart,
};
use uuid::Uuid;

/// A built MIME message plus the Message-ID it was stamped with
pub struct MimeMessage {
    pub message: lettre::Message,
    pub message_id: String,
}

impl MimeMessage {
    /// Raw RFC 5322 bytes
    pub fn formatted(&self) -> Vec<u8> {
        self.message.formatted()
    }
}

enum Part {
    Single(SinglePart),
    Multi(MultiPart),
}

fn parse_mailbox(raw: &str, field: &str) -> Result<Mailbox> {
    raw.parse()
        .wrap_err_with(|| format!("Invalid {} address: {}", field, raw))
}

async fn attachment_part(attachment: &Attachment) -> Result<SinglePart> {
    let content = attachment
        .load()
        .await
        .wrap_err_with(|| format!("Failed to load attachment {}", attachment.filename))?;
    let content_type = ContentType::parse(attachment.content_type_or_default())
        .wrap_err_with(|| format!("Invalid content type for attachment {}", attachment.filename))?;

    let part = match &attachment.cid {
        Some(cid) => MimeAttachment::new_inline(cid.clone()),
        None => MimeAttachment::new(attachment.filename.clone()),
    };
    Ok(part.body(content, content_type))
}

fn body_part(message: &Message) -> Option<Part> {
    match (&message.text, &message.html) {
        (Some(text), Some(html)) => Some(Part::Multi(MultiPart::alternative_plain_html(
            text.clone(),
            html.clone(),
        ))),
        (Some(text), None) => Some(Part::Single(SinglePart::plain(text.clone()))),
        (None, Some(html)) => Some(Part::Single(SinglePart::html(html.clone()))),
        (None, None) => None,
    }
}

fn mixed(parts: Vec<Part>) -> Option<MultiPart> {
    let mut parts = parts.into_iter();
    let mut mixed = match parts.next()? {
        Part::Single(single) => MultiPart::mixed().singlepart(single),
        Part::Multi(multi) => MultiPart::mixed().multipart(multi),
    };
    for part in parts {
        mixed = match part {
            Part::Single(single) => mixed.singlepart(single),
            Part::Multi(multi) => mixed.multipart(multi),
        };
    }
    Some(mixed)
}

/// Build a MIME message from an assembled [`Message`].
///
/// Text and html become multipart/alternative; attachments wrap the body in
/// multipart/mixed, inline ones carrying a Content-ID. A message with only a
/// subject gets an empty text/plain body.
pub async fn build_mime(message: &Message) -> Result<MimeMessage> {
    let from_raw = message
        .from
        .as_deref()
        .ok_or_else(|| eyre!("Message has no \"from\" address"))?;
    let from = parse_mailbox(from_raw, "from")?;
    let message_id = format!("<{}@{}>", Uuid::new_v4(), from.email.domain());

    let mut builder = lettre::Message::builder()
        .from(from)
        .message_id(Some(message_id.clone()));

    for to in &message.to {
        builder = builder.to(parse_mailbox(to, "to")?);
    }
    for cc in &message.cc {
        builder = builder.cc(parse_mailbox(cc, "cc")?);
    }
    for bcc in &message.bcc {
        builder = builder.bcc(parse_mailbox(bcc, "bcc")?);
    }
    if let Some(reply_to) = &message.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to, "reply-to")?);
    }
    if let Some(subject) = &message.subject {
        builder = builder.subject(subject.clone());
    }

    let mut parts: Vec<Part> = body_part(message).into_iter().collect();
    for attachment in message.attachments.iter().flatten() {
        parts.push(Part::Single(attachment_part(attachment).await?));
    }

    let built = if parts.len() > 1 {
        match mixed(parts) {
            Some(multi) => builder.multipart(multi),
            None => builder.singlepart(SinglePart::plain(String::new())),
        }
    } else {
        match parts.pop() {
            Some(Part::Single(single)) => builder.singlepart(single),
            Some(Part::Multi(multi)) => builder.multipart(multi),
            None => builder.singlepart(SinglePart::plain(String::new())),
        }
    };

    let message = built.wrap_err("Failed to build MIME message")?;
    Ok(MimeMessage {
        message,
        message_id,
    })
}
