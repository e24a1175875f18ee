use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;

/// Parameter map handed to engines and compiled pages.
pub type Vars = Map<String, Value>;

/// Frozen pipeline configuration.
///
/// Built once from settings at startup and passed into the pipeline
/// constructor; nothing mutates it afterwards, so in-flight requests never
/// observe a configuration change.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Site root directory; views and public offsets are joined under it.
    pub root: PathBuf,
    pub views_dir: String,
    pub public_dir: String,
    /// Registry name of the first-pass engine.
    pub markup_engine: String,
    /// Registry name of the second-pass engine.
    pub template_engine: String,
    /// Process-wide cache gate, derived once from the environment.
    pub cache_enabled: bool,
    /// Pipeline-wide template variables, overridden by per-call vars.
    pub default_vars: Vars,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            views_dir: "views".to_string(),
            public_dir: "public".to_string(),
            markup_engine: "markdown".to_string(),
            template_engine: "jinja".to_string(),
            cache_enabled: false,
            default_vars: Vars::new(),
        }
    }
}

impl From<&crate::config::SiteSettings> for PipelineConfig {
    fn from(site: &crate::config::SiteSettings) -> Self {
        Self {
            root: site.root.clone(),
            views_dir: site.views_dir.clone(),
            public_dir: site.public_dir.clone(),
            markup_engine: site.markup_engine.clone(),
            template_engine: site.template_engine.clone(),
            cache_enabled: site.cache_enabled(),
            default_vars: site.default_vars.clone(),
        }
    }
}

/// Options for read-through file access.
#[derive(Debug, Clone, Copy)]
pub struct FileOptions {
    /// Persist the computed representations.
    pub cache: bool,
    /// Produce and return the compressed representation.
    pub zip: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            cache: true,
            zip: false,
        }
    }
}

/// Options for first-pass rendering.
#[derive(Debug, Clone, Copy)]
pub struct MarkupOptions {
    /// Persist the rendered output under its resource identity.
    pub cache: bool,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        Self { cache: true }
    }
}

/// First-pass capability: template source to intermediate markup.
pub trait MarkupEngine: Send + Sync {
    /// Extension assumed for extensionless logical names.
    fn source_extension(&self) -> &'static str;

    fn render(&self, source: &str, params: &Vars) -> Result<String, EngineError>;
}

/// Second-pass capability: markup to a reusable page.
pub trait TemplateEngine: Send + Sync {
    fn compile(&self, markup: &str) -> Result<Arc<dyn CompiledTemplate>, EngineError>;
}

/// A compiled page, rendered per request with runtime locals. The output of
/// a render is never cached by the pipeline.
pub trait CompiledTemplate: Send + Sync {
    fn render(&self, locals: &Vars) -> Result<String, EngineError>;
}

/// Structured errors surfaced by engines. Message-only so they stay
/// clonable across shared in-flight futures.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("markup rendering failed: {message}")]
    Markup { message: String },
    #[error("template parsing failed: {message}")]
    Parse { message: String },
    #[error("template rendering failed: {message}")]
    Render { message: String },
}

impl EngineError {
    pub fn markup(message: impl Into<String>) -> Self {
        Self::Markup {
            message: message.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Self::Render {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the pipeline. Terminal for the triggering call: no
/// retry, no fallback representation, and nothing is cached on failure.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("failed to read `{path}`: {detail}")]
    Read {
        path: String,
        kind: ErrorKind,
        detail: String,
    },
    #[error("failed to compress `{path}`: {detail}")]
    Compression { path: String, detail: String },
    #[error("render failed for `{name}`: {source}")]
    Render {
        name: String,
        #[source]
        source: EngineError,
    },
    #[error("template compile failed for `{name}`: {source}")]
    Compile {
        name: String,
        #[source]
        source: EngineError,
    },
    #[error("no engine registered under `{name}`")]
    UnknownEngine { name: String },
}

impl PipelineError {
    pub fn read(path: &std::path::Path, error: &std::io::Error) -> Self {
        Self::Read {
            path: path.display().to_string(),
            kind: error.kind(),
            detail: error.to_string(),
        }
    }

    /// Whether this failure maps to a missing resource rather than an
    /// internal fault.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Read {
                kind: ErrorKind::NotFound,
                ..
            }
        )
    }
}
