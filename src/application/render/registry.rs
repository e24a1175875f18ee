use std::collections::HashMap;
use std::sync::Arc;

use super::jinja::JinjaEngine;
use super::markdown::MarkdownEngine;
use super::types::{MarkupEngine, PipelineError, TemplateEngine};

/// Named engine registry.
///
/// Engines are registered under stable names at startup and resolved once,
/// when the pipeline is constructed. An unknown name is a configuration
/// error, not a request-time failure.
#[derive(Default)]
pub struct EngineRegistry {
    markup: HashMap<String, Arc<dyn MarkupEngine>>,
    template: HashMap<String, Arc<dyn TemplateEngine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in engines: `markdown` for the
    /// first pass, `jinja` for the second.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_markup("markdown", Arc::new(MarkdownEngine::new()));
        registry.register_template("jinja", Arc::new(JinjaEngine::new()));
        registry
    }

    pub fn register_markup(&mut self, name: impl Into<String>, engine: Arc<dyn MarkupEngine>) {
        self.markup.insert(name.into(), engine);
    }

    pub fn register_template(&mut self, name: impl Into<String>, engine: Arc<dyn TemplateEngine>) {
        self.template.insert(name.into(), engine);
    }

    pub fn markup(&self, name: &str) -> Result<Arc<dyn MarkupEngine>, PipelineError> {
        self.markup
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownEngine {
                name: name.to_string(),
            })
    }

    pub fn template(&self, name: &str) -> Result<Arc<dyn TemplateEngine>, PipelineError> {
        self.template
            .get(name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownEngine {
                name: name.to_string(),
            })
    }
}
