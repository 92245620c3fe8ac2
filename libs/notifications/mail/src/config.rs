//! Mail configuration
//!
//! Loaded either from a JSON document ([`MailConfig::from_file`]) or from
//! flat environment variables ([`FromEnv`]):
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `MAIL_SEND` | deliver for real (`true/t/1`); otherwise JSON transport |
//! | `MAIL_PREVIEW` | write an html preview of every message |
//! | `MAIL_TO` | comma separated forced recipients |
//! | `MAIL_FROM` | default `from` |
//! | `MAIL_SUBJECT_PREFIX` | prepended to every subject |
//! | `MAIL_TEMPLATE_PATHS` | template root (exactly one) |
//! | `MAIL_TEMPLATE_CACHE` | cache compiled templates |
//! | `MAIL_LOG_HEADERS` / `MAIL_LOG_TEXT` / `MAIL_LOG_HTML` | log sent mail |
//! | `MAIL_TRANSPORT` | `smtp`, `ses`, `sendgrid` or `json` |
//! | `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_SECURITY`, `SMTP_VERIFY` | SMTP |

use crate::error::{MailError, MailResult};
use crate::models::Message;
use crate::transport::{SmtpSecurity, TransportDescriptor};
use core_config::{env_flag, env_list, env_optional, env_parse, ConfigError, FromEnv};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Directory searched for templates when none is configured
pub const DEFAULT_TEMPLATE_DIR: &str = "emails";

/// Which parts of a sent message are logged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailLogConfig {
    pub headers: bool,
    pub text: bool,
    pub html: bool,
}

impl MailLogConfig {
    pub fn all(enabled: bool) -> Self {
        Self {
            headers: enabled,
            text: enabled,
            html: enabled,
        }
    }

    pub fn any(&self) -> bool {
        self.headers || self.text || self.html
    }

    /// Names of the enabled parts, for the setup log line
    pub fn describe(&self) -> String {
        let parts: Vec<&str> = [
            (self.headers, "headers"),
            (self.text, "text"),
            (self.html, "html"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();
        parts.join(", ")
    }
}

/// Template lookup settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Search roots; only a single root is supported
    pub paths: Vec<PathBuf>,
    /// Cache compiled templates (still off in development and test)
    pub cache: bool,
}

impl TemplatesConfig {
    /// The one template root, or the default `./emails`.
    pub fn root(&self) -> MailResult<PathBuf> {
        match self.paths.as_slice() {
            [] => Ok(std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(DEFAULT_TEMPLATE_DIR)),
            [root] => Ok(root.clone()),
            many => Err(MailError::Configuration(format!(
                "Only one templates path currently supported; got {:?}",
                many
            ))),
        }
    }
}

/// Complete mail configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Transport to install during init; none leaves mail unconfigured
    pub transport: Option<TransportDescriptor>,
    pub templates: TemplatesConfig,
    /// Defaults applied under every message
    pub message: Message,
    /// Locals available to every template, under the call's own locals
    pub locals: Map<String, Value>,
    /// Prepended to every subject; empty disables
    pub subject_prefix: Option<String>,
    /// Deliver for real; when false the JSON transport is forced
    pub send: bool,
    /// Write an html preview of every message
    pub preview: bool,
    /// Redirect every message to these recipients
    pub to: Option<Vec<String>>,
    pub log: MailLogConfig,
}

impl MailConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> MailResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Subject prefix if one is set and non-empty
    pub fn active_subject_prefix(&self) -> Option<&str> {
        self.subject_prefix.as_deref().filter(|p| !p.is_empty())
    }

    /// Forced recipients if any are set
    pub fn forced_recipients(&self) -> Option<&[String]> {
        self.to.as_deref().filter(|to| !to.is_empty())
    }
}

fn smtp_descriptor() -> Result<TransportDescriptor, ConfigError> {
    let security = match env_optional("SMTP_SECURITY") {
        None => SmtpSecurity::default(),
        Some(raw) => serde_json::from_value(Value::String(raw.to_ascii_lowercase())).map_err(
            |_| ConfigError::ParseError {
                key: "SMTP_SECURITY".to_string(),
                details: format!("expected tls, starttls or none, got '{}'", raw),
            },
        )?,
    };

    let mut options = Map::new();
    options.insert(
        "host".into(),
        Value::String(env_optional("SMTP_HOST").unwrap_or_else(|| "localhost".to_string())),
    );
    options.insert("port".into(), Value::from(env_parse::<u16>("SMTP_PORT", 587)?));
    if let Some(username) = env_optional("SMTP_USERNAME") {
        options.insert("username".into(), Value::String(username));
    }
    if let Some(password) = env_optional("SMTP_PASSWORD") {
        options.insert("password".into(), Value::String(password));
    }
    options.insert(
        "security".into(),
        serde_json::to_value(security).unwrap_or(Value::Null),
    );

    Ok(TransportDescriptor {
        kind: "smtp".to_string(),
        options: Value::Object(options),
        verify: env_flag("SMTP_VERIFY")?.unwrap_or(false),
    })
}

impl FromEnv for MailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let transport = match env_optional("MAIL_TRANSPORT") {
            None => None,
            Some(kind) if kind.eq_ignore_ascii_case("smtp") => Some(smtp_descriptor()?),
            Some(kind) => Some(TransportDescriptor::new(kind)),
        };

        let log_all = env_flag("MAIL_LOG")?;
        let log = MailLogConfig {
            headers: env_flag("MAIL_LOG_HEADERS")?.or(log_all).unwrap_or(false),
            text: env_flag("MAIL_LOG_TEXT")?.or(log_all).unwrap_or(false),
            html: env_flag("MAIL_LOG_HTML")?.unwrap_or(false),
        };

        let forced = env_list("MAIL_TO");

        Ok(Self {
            transport,
            templates: TemplatesConfig {
                paths: env_list("MAIL_TEMPLATE_PATHS")
                    .into_iter()
                    .map(PathBuf::from)
                    .collect(),
                cache: env_flag("MAIL_TEMPLATE_CACHE")?.unwrap_or(false),
            },
            message: Message {
                from: env_optional("MAIL_FROM"),
                ..Message::default()
            },
            locals: Map::new(),
            subject_prefix: env_optional("MAIL_SUBJECT_PREFIX"),
            send: env_flag("MAIL_SEND")?.unwrap_or(false),
            preview: env_flag("MAIL_PREVIEW")?.unwrap_or(false),
            to: (!forced.is_empty()).then_some(forced),
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_template_root() {
        let templates = TemplatesConfig {
            paths: vec![PathBuf::from("/srv/emails")],
            cache: true,
        };
        assert_eq!(templates.root().unwrap(), PathBuf::from("/srv/emails"));
    }

    #[test]
    fn test_default_template_root() {
        let root = TemplatesConfig::default().root().unwrap();
        assert!(root.ends_with(DEFAULT_TEMPLATE_DIR));
    }

    #[test]
    fn test_multiple_template_roots_rejected() {
        let config = MailConfig {
            templates: TemplatesConfig {
                paths: vec![PathBuf::from("/a"), PathBuf::from("/b")],
                cache: false,
            },
            ..MailConfig::default()
        };
        let err = config.templates.root().unwrap_err();
        assert!(matches!(err, MailError::Configuration(_)));
        assert!(err.to_string().contains("/a"));
        assert!(err.to_string().contains("/b"));
    }

    #[test]
    fn test_deserialize_full_document() {
        let config: MailConfig = serde_json::from_value(json!({
            "send": true,
            "subject_prefix": "[TEST] ",
            "message": { "from": "Bedrock Mail Test <test@example.com>" },
            "locals": { "product": "Acme" },
            "transport": { "type": "smtp", "options": { "host": "localhost", "port": 25 } },
            "templates": { "paths": ["/srv/emails"], "cache": true },
            "log": { "headers": true }
        }))
        .unwrap();

        assert!(config.send);
        assert!(!config.preview);
        assert_eq!(config.active_subject_prefix(), Some("[TEST] "));
        assert_eq!(config.transport.unwrap().kind, "smtp");
        assert_eq!(config.locals["product"], "Acme");
        assert_eq!(config.log.describe(), "headers");
    }

    #[test]
    fn test_empty_prefix_and_recipients_are_inactive() {
        let config = MailConfig {
            subject_prefix: Some(String::new()),
            to: Some(Vec::new()),
            ..MailConfig::default()
        };
        assert!(config.active_subject_prefix().is_none());
        assert!(config.forced_recipients().is_none());
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            [
                ("MAIL_SEND", Some("t")),
                ("MAIL_TO", Some("qa@example.com, ops@example.com")),
                ("MAIL_TRANSPORT", Some("smtp")),
                ("SMTP_HOST", Some("relay.internal")),
                ("SMTP_PORT", Some("2525")),
                ("SMTP_SECURITY", Some("NONE")),
                ("SMTP_VERIFY", Some("1")),
                ("MAIL_LOG", Some("true")),
                ("MAIL_TEMPLATE_PATHS", Some("/srv/emails")),
            ],
            || {
                let config = MailConfig::from_env().unwrap();
                assert!(config.send);
                assert_eq!(
                    config.forced_recipients().unwrap(),
                    ["qa@example.com", "ops@example.com"]
                );
                let transport = config.transport.unwrap();
                assert!(transport.verify);
                assert_eq!(transport.options["host"], "relay.internal");
                assert_eq!(transport.options["port"], 2525);
                assert_eq!(transport.options["security"], "none");
                assert_eq!(config.log.describe(), "headers, text");
                assert_eq!(config.templates.paths, vec![PathBuf::from("/srv/emails")]);
            },
        );
    }

    #[test]
    fn test_from_env_rejects_bad_flag() {
        temp_env::with_var("MAIL_SEND", Some("sometimes"), || {
            assert!(MailConfig::from_env().is_err());
        });
    }
}
