//! Local previews of outgoing mail
//!
//! Each message is rendered into a standalone HTML page in the OS temp
//! directory. The page is not opened automatically: its `file://` URL is
//! logged at info level for the operator to open. Previewing never blocks
//! a send; failures are reported to the caller who logs them.

use crate::error::{MailError, MailResult};
use crate::mime::build_mime;
use crate::models::Message;
use base64::{engine::general_purpose::STANDARD, Engine};
use handlebars::Handlebars;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

const PREVIEW_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{subject}}</title>
<style>
body { font-family: sans-serif; margin: 0; background: #f4f4f4; }
header { background: #222; color: #eee; padding: 1em; }
header dt { font-weight: bold; float: left; width: 7em; }
section { background: #fff; margin: 1em; padding: 1em; }
pre { white-space: pre-wrap; }
</style>
</head>
<body>
<header>
<dl>
{{#each headers}}<dt>{{this.name}}</dt><dd>{{this.value}}</dd>
{{/each}}
</dl>
{{#if raw}}<a download="{{id}}.eml" href="data:message/rfc822;base64,{{raw}}">Download .eml</a>{{/if}}
</header>
{{#if html}}<section class="html">{{{html}}}</section>{{/if}}
{{#if text}}<section class="text"><pre>{{text}}</pre></section>{{/if}}
</body>
</html>
"#;

/// A written preview
#[derive(Debug, Clone)]
pub struct Preview {
    pub path: PathBuf,
}

impl Preview {
    pub fn url(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// Render the preview page for a message.
pub async fn render_preview(message: &Message, id: &str) -> MailResult<String> {
    // Messages without a sender cannot be serialized to MIME; the page is still useful
    let raw = match build_mime(message).await {
        Ok(mime) => Some(STANDARD.encode(mime.formatted())),
        Err(_) => None,
    };

    let list = |addresses: &[String]| (!addresses.is_empty()).then(|| addresses.join(", "));
    let headers: Vec<_> = [
        ("From", message.from.clone()),
        ("To", list(&message.to)),
        ("Cc", list(&message.cc)),
        ("Bcc", list(&message.bcc)),
        ("Reply-To", message.reply_to.clone()),
        ("Subject", message.subject.clone()),
        ("Date", Some(chrono::Utc::now().to_rfc2822())),
    ]
    .into_iter()
    .filter_map(|(name, value)| value.map(|value| json!({ "name": name, "value": value })))
    .collect();

    let registry = Handlebars::new();
    registry
        .render_template(
            PREVIEW_TEMPLATE,
            &json!({
                "id": id,
                "subject": message.subject,
                "headers": headers,
                "html": message.html,
                "text": message.text,
                "raw": raw,
            }),
        )
        .map_err(|e| MailError::Operation(format!("Could not render preview: {e}")))
}

/// Write a preview page into `dir`.
pub async fn write_preview_in(dir: &Path, message: &Message) -> MailResult<Preview> {
    let id = uuid::Uuid::new_v4().to_string();
    let page = render_preview(message, &id).await?;
    let path = dir.join(format!("{id}.html"));
    tokio::fs::write(&path, page).await?;

    let preview = Preview { path };
    info!(url = %preview.url(), "Email preview written");
    Ok(preview)
}

/// Write a preview page into the OS temp directory.
pub async fn write_preview(message: &Message) -> MailResult<Preview> {
    write_preview_in(&std::env::temp_dir(), message).await
}
