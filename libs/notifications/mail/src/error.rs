//! Error types for the mail library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for mail operations.
pub type MailResult<T> = Result<T, MailError>;

/// Errors that can occur while rendering or sending mail.
#[derive(Debug, Error)]
pub enum MailError {
    /// Invalid or unsupported configuration (unknown transport type,
    /// more than one template root, ...)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Template source could not be read or parsed
    #[error("Could not compile email template \"{}\": {message}", path.display())]
    Compile {
        path: PathBuf,
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Compiled template failed while rendering with the supplied locals
    #[error("Could not render email template \"{}\": {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: Box<handlebars::RenderError>,
    },

    /// Assembled message has no content at all
    #[error(
        "No message content detected for template \"{template}\"; \
         (no \"subject\", \"html\", \"text\", nor \"attachments\")."
    )]
    Data { template: String },

    /// Operation not possible in the current state
    #[error("Operation error: {0}")]
    Operation(String),

    /// Transport failed to build or deliver the message
    #[error("Transport error: {0}")]
    Transport(#[from] eyre::Report),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MailError {
    /// Short kind name, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "ConfigurationError",
            Self::Compile { .. } => "CompileError",
            Self::Render { .. } => "RenderError",
            Self::Data { .. } => "DataError",
            Self::Operation(_) => "OperationError",
            Self::Transport(_) => "TransportError",
            Self::Serialization(_) => "SerializationError",
            Self::Io(_) => "IoError",
        }
    }
}

impl From<core_config::ConfigError> for MailError {
    fn from(err: core_config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}
