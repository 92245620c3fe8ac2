//! Templated email library
//!
//! Renders Handlebars templates into messages and delivers them through a
//! pluggable transport.
//!
//! ## Components
//!
//! - **Templates**: `TemplateRenderer` resolves `<root>/<name>/<component>.hbs`
//!   files and renders `subject`, `html` and `text` concurrently, with an
//!   optional LRU cache of compiled templates
//! - **Client**: `EmailClient` layers defaults, call fields and rendered
//!   output, applies the subject prefix and derives plain text from html
//! - **Transports**: SMTP (lettre), AWS SES, SendGrid, JSON (no delivery) and
//!   a capturing mock; custom transports implement [`Transport`]
//! - **Service**: `Mailer` owns the configuration and the active transport
//!
//! ## Usage
//!
//! ```ignore
//! use core_config::{Environment, FromEnv};
//! use mail::{MailConfig, Mailer, Message, SendRequest};
//!
//! let mailer = Mailer::new(MailConfig::from_env()?, Environment::from_env())?;
//! mailer.init().await?;
//!
//! let result = mailer
//!     .send(
//!         SendRequest::new("welcome")
//!             .with_message(Message::new().to("user@example.com"))
//!             .with_local("name", "Ann"),
//!     )
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod mime;
pub mod models;
pub mod preview;
pub mod service;
pub mod templates;
pub mod text;
pub mod transport;

pub use client::EmailClient;
pub use config::{MailConfig, MailLogConfig, TemplatesConfig};
pub use error::{MailError, MailResult};
pub use models::{Attachment, Component, Envelope, Message, SendResult};
pub use service::{Mailer, SendRequest, TransportSetup};
pub use templates::{TemplateRenderer, TEMPLATE_EXTENSION};
pub use transport::{
    Delivery, JsonTransport, MockTransport, SendGridOptions, SesOptions, SmtpOptions,
    SmtpSecurity, Transport, TransportConfig, TransportDescriptor, Verification,
};
