//! Command line definition and operator overrides

use clap::{Parser, Subcommand};
use core_config::{parse_flag, FromEnv};
use eyre::{Result, WrapErr};
use mail::{MailConfig, Message, SendRequest};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Parser)]
#[command(name = "mailer")]
#[command(about = "Render and send templated email")]
pub struct Cli {
    /// JSON mail configuration file; the environment is used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Render a template and send it
    Send {
        /// Template name, relative to the template root, or an absolute path
        #[arg(short, long)]
        template: String,

        /// Recipients
        #[arg(long, value_delimiter = ',')]
        to: Vec<String>,

        /// Sender, overriding the configured default
        #[arg(long)]
        from: Option<String>,

        /// Subject, skipping the subject template
        #[arg(long)]
        subject: Option<String>,

        /// Template locals as a JSON object
        #[arg(long, default_value = "{}")]
        locals: String,
    },

    /// Check that the configured transport can reach its backend
    Verify,
}

/// Tri-state switch: on, off, or leave the configured value alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switch {
    On,
    Off,
    Default,
}

impl Switch {
    fn apply(self, target: &mut bool) {
        match self {
            Self::On => *target = true,
            Self::Off => *target = false,
            Self::Default => {}
        }
    }
}

impl FromStr for Switch {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("default") {
            return Ok(Self::Default);
        }
        match parse_flag(value) {
            Some(true) => Ok(Self::On),
            Some(false) => Ok(Self::Off),
            None => Err(format!(
                "expected true, t, 1, false, f, 0 or default, got '{value}'"
            )),
        }
    }
}

/// Operator overrides applied on top of the loaded configuration
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// Send every message to these recipients instead
    #[arg(long, global = true, value_delimiter = ',')]
    pub mail_to: Vec<String>,

    /// Write an html preview of every message
    #[arg(long, global = true, value_name = "MODE")]
    pub mail_preview: Option<Switch>,

    /// Deliver through the configured transport instead of JSON
    #[arg(long, global = true, value_name = "MODE")]
    pub mail_send: Option<Switch>,

    /// Log headers and text of every sent message
    #[arg(long, global = true, value_name = "MODE")]
    pub mail_log: Option<Switch>,
}

impl Overrides {
    pub fn apply(&self, config: &mut MailConfig) {
        if !self.mail_to.is_empty() {
            config.to = Some(self.mail_to.clone());
        }
        if let Some(preview) = self.mail_preview {
            preview.apply(&mut config.preview);
        }
        if let Some(send) = self.mail_send {
            send.apply(&mut config.send);
        }
        if let Some(log) = self.mail_log {
            log.apply(&mut config.log.headers);
            log.apply(&mut config.log.text);
        }
    }
}

impl Cli {
    /// Load the mail configuration and apply command line overrides.
    pub fn mail_config(&self) -> Result<MailConfig> {
        let mut config = match &self.config {
            Some(path) => MailConfig::from_file(path)
                .wrap_err_with(|| format!("Failed to load {}", path.display()))?,
            None => MailConfig::from_env()?,
        };
        self.overrides.apply(&mut config);
        Ok(config)
    }
}

/// Build a send request from `send` subcommand arguments.
pub fn send_request(
    template: String,
    to: Vec<String>,
    from: Option<String>,
    subject: Option<String>,
    locals: &str,
) -> Result<SendRequest> {
    let locals: Map<String, Value> =
        serde_json::from_str(locals).wrap_err("--locals must be a JSON object")?;

    let message = Message {
        from,
        to,
        subject,
        ..Message::default()
    };

    Ok(SendRequest {
        template,
        message,
        locals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switch_values() {
        assert_eq!("t".parse::<Switch>().unwrap(), Switch::On);
        assert_eq!("1".parse::<Switch>().unwrap(), Switch::On);
        assert_eq!("FALSE".parse::<Switch>().unwrap(), Switch::Off);
        assert_eq!("default".parse::<Switch>().unwrap(), Switch::Default);
        assert!("maybe".parse::<Switch>().is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let mut config = MailConfig {
            send: true,
            preview: true,
            ..MailConfig::default()
        };
        Overrides {
            mail_to: vec!["qa@example.com".to_string()],
            mail_preview: Some(Switch::Default),
            mail_send: Some(Switch::Off),
            mail_log: Some(Switch::On),
        }
        .apply(&mut config);

        assert_eq!(config.to, Some(vec!["qa@example.com".to_string()]));
        assert!(config.preview);
        assert!(!config.send);
        assert!(config.log.headers);
        assert!(config.log.text);
        assert!(!config.log.html);
    }

    #[test]
    fn test_parse_send_command() {
        let cli = Cli::parse_from([
            "mailer",
            "--mail-send",
            "false",
            "send",
            "--template",
            "welcome",
            "--to",
            "a@example.com,b@example.com",
            "--locals",
            r#"{"name":"Ann"}"#,
        ]);
        assert_eq!(cli.overrides.mail_send, Some(Switch::Off));

        let Commands::Send {
            template,
            to,
            from,
            subject,
            locals,
        } = cli.command
        else {
            panic!("expected send command");
        };
        let request = send_request(template, to, from, subject, &locals).unwrap();
        assert_eq!(request.template, "welcome");
        assert_eq!(request.message.to, vec!["a@example.com", "b@example.com"]);
        assert_eq!(request.locals["name"], "Ann");
    }

    #[test]
    fn test_locals_must_be_object() {
        assert!(send_request("x".into(), vec![], None, None, "[1, 2]").is_err());
    }

    #[test]
    fn test_config_from_env_with_overrides() {
        temp_env::with_vars(
            [("MAIL_SEND", Some("true")), ("MAIL_TO", None::<&str>)],
            || {
                let cli = Cli::parse_from(["mailer", "--mail-to", "ops@example.com", "verify"]);
                let config = cli.mail_config().unwrap();
                assert!(config.send);
                assert_eq!(config.to, Some(vec!["ops@example.com".to_string()]));
            },
        );
    }
}
