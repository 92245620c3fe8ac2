//! File based email templates rendered with Handlebars
//!
//! A template is a directory holding up to three sources, one per
//! [`Component`]:
//!
//! ```text
//! emails/
//!   welcome/
//!     subject.hbs
//!     html.hbs
//!     text.hbs      (optional, derived from html when missing)
//! ```
//!
//! Template names are resolved against the configured root unless they are
//! absolute paths. Only the `html` component is HTML-escaped.

mod cache;

pub use cache::{TemplateCache, DEFAULT_CACHE_CAPACITY};

use crate::error::{MailError, MailResult};
use crate::models::Component;
use handlebars::Handlebars;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Extension appended to every template file name
pub const TEMPLATE_EXTENSION: &str = ".hbs";

/// Output of rendering all components of one template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub subject: Option<String>,
    pub html: Option<String>,
    pub text: Option<String>,
}

impl RenderedTemplate {
    /// Iterate over the components that produced output.
    ///
    /// A template that renders to nothing but whitespace produced nothing.
    pub fn produced(self) -> impl Iterator<Item = (Component, String)> {
        [
            (Component::Subject, self.subject),
            (Component::Html, self.html),
            (Component::Text, self.text),
        ]
        .into_iter()
        .filter_map(|(component, value)| {
            value
                .filter(|v| !v.trim().is_empty())
                .map(|v| (component, v))
        })
    }
}

/// A template source compiled once and rendered many times
pub struct CompiledTemplate {
    registry: Handlebars<'static>,
}

impl CompiledTemplate {
    const NAME: &'static str = "template";

    pub fn compile(source: &str, component: Component) -> Result<Self, handlebars::TemplateError> {
        let mut registry = Handlebars::new();
        if component != Component::Html {
            registry.register_escape_fn(handlebars::no_escape);
        }
        registry.register_template_string(Self::NAME, source)?;
        Ok(Self { registry })
    }

    pub fn render(&self, locals: &Value) -> Result<String, handlebars::RenderError> {
        self.registry.render(Self::NAME, locals)
    }
}

/// Resolves template names to files and renders them.
pub struct TemplateRenderer {
    root: PathBuf,
    cache: Option<TemplateCache>,
    compilations: AtomicUsize,
}

impl TemplateRenderer {
    /// Renderer without a compiled-template cache
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: None,
            compilations: AtomicUsize::new(0),
        }
    }

    /// Enable the LRU compiled-template cache
    pub fn with_cache(mut self, capacity: usize) -> Self {
        self.cache = Some(TemplateCache::new(capacity));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Number of template sources compiled so far
    pub fn compile_count(&self) -> usize {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Map a template name to a file path.
    ///
    /// Absolute names search their own parent directory; relative names are
    /// joined onto the root. The extension is appended when missing.
    pub fn resolve_path(&self, template_name: &str) -> PathBuf {
        let name = Path::new(template_name);
        let path = match (name.is_absolute(), name.parent(), name.file_name()) {
            (true, Some(parent), Some(basename)) => parent.join(basename),
            (true, _, _) => name.to_path_buf(),
            (false, _, _) => self.root.join(name),
        };

        if path.to_string_lossy().ends_with(TEMPLATE_EXTENSION) {
            path
        } else {
            let mut raw = path.into_os_string();
            raw.push(TEMPLATE_EXTENSION);
            PathBuf::from(raw)
        }
    }

    /// Whether a template file exists. Missing is not an error; a path that
    /// exists but is not a regular file is.
    pub async fn template_exists(&self, path: &Path) -> MailResult<bool> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(true),
            Ok(_) => {
                let message = format!("Template \"{}\" is not a file.", path.display());
                error!(path = %path.display(), "{}", message);
                Err(MailError::Operation(message))
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                Ok(false)
            }
            Err(e) => Err(MailError::Io(e)),
        }
    }

    async fn compile(&self, path: &Path, component: Component) -> MailResult<CompiledTemplate> {
        let compiled = match tokio::fs::read_to_string(path).await {
            Ok(source) => CompiledTemplate::compile(&source, component).map_err(|e| {
                MailError::Compile {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                    source: Box::new(e),
                }
            }),
            Err(e) => Err(MailError::Compile {
                path: path.to_path_buf(),
                message: e.to_string(),
                source: Box::new(e),
            }),
        };

        match compiled {
            Ok(template) => {
                self.compilations.fetch_add(1, Ordering::Relaxed);
                debug!(path = %path.display(), "Compiled email template");
                Ok(template)
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "Could not compile email template");
                Err(err)
            }
        }
    }

    /// Render an existing template file, going through the cache if enabled.
    pub async fn render_file(
        &self,
        path: &Path,
        component: Component,
        locals: &Value,
    ) -> MailResult<String> {
        let template = match &self.cache {
            Some(cache) => {
                let key = tokio::fs::canonicalize(path).await?;
                match cache.get(&key).await {
                    Some(hit) => hit,
                    None => {
                        let compiled = Arc::new(self.compile(path, component).await?);
                        cache.insert(key, compiled.clone()).await;
                        compiled
                    }
                }
            }
            None => Arc::new(self.compile(path, component).await?),
        };

        template.render(locals).map_err(|e| {
            error!(path = %path.display(), error = %e, "Could not render email template");
            MailError::Render {
                path: path.to_path_buf(),
                source: Box::new(e),
            }
        })
    }

    /// Render one component of a template if its file exists.
    pub async fn render_component(
        &self,
        template: &str,
        component: Component,
        locals: &Value,
    ) -> MailResult<Option<String>> {
        let template_name = Path::new(template).join(component.as_str());
        let path = self.resolve_path(&template_name.to_string_lossy());
        if !self.template_exists(&path).await? {
            return Ok(None);
        }
        self.render_file(&path, component, locals).await.map(Some)
    }

    /// Render every component of a template concurrently.
    ///
    /// Components listed in `skip` are not rendered. Any failure fails the
    /// whole render.
    pub async fn render_all(
        &self,
        template: &str,
        locals: &Value,
        skip: &[Component],
    ) -> MailResult<RenderedTemplate> {
        let render = |component: Component| async move {
            if skip.contains(&component) {
                return Ok(None);
            }
            self.render_component(template, component, locals).await
        };

        let (subject, html, text) = tokio::try_join!(
            render(Component::Subject),
            render(Component::Html),
            render(Component::Text),
        )?;

        Ok(RenderedTemplate {
            subject,
            html,
            text,
        })
    }
}
