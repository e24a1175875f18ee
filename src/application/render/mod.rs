//! Two-pass render pipeline over the cache substrate.
//!
//! The first pass turns template source into markup (markdown → HTML by
//! default); the second pass compiles markup into a reusable page that
//! renders against per-request locals. Both passes, and plain file access,
//! memoize through [`crate::cache`].

mod jinja;
mod markdown;
mod pipeline;
mod registry;
mod types;

pub use jinja::JinjaEngine;
pub use markdown::MarkdownEngine;
pub use pipeline::RenderPipeline;
pub use registry::EngineRegistry;
pub use types::{
    CompiledTemplate, EngineError, FileOptions, MarkupEngine, MarkupOptions, PipelineConfig,
    PipelineError, TemplateEngine, Vars,
};
