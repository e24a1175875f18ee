use std::sync::Arc;

use minijinja::{Environment, Value};

use super::types::{CompiledTemplate, EngineError, TemplateEngine, Vars};

const INLINE_TEMPLATE_NAME: &str = "page";

/// Built-in second-pass engine: compiles markup with `{{ … }}` interpolation
/// into a reusable page via MiniJinja.
#[derive(Default)]
pub struct JinjaEngine;

impl JinjaEngine {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for JinjaEngine {
    fn compile(&self, markup: &str) -> Result<Arc<dyn CompiledTemplate>, EngineError> {
        let mut env = Environment::new();
        env.add_template_owned(INLINE_TEMPLATE_NAME.to_string(), markup.to_string())
            .map_err(|err| EngineError::parse(err.to_string()))?;

        Ok(Arc::new(JinjaPage { env }))
    }
}

/// One compiled page. The owned environment holds exactly the one template,
/// so rendering needs no further parsing.
struct JinjaPage {
    env: Environment<'static>,
}

impl CompiledTemplate for JinjaPage {
    fn render(&self, locals: &Vars) -> Result<String, EngineError> {
        let template = self
            .env
            .get_template(INLINE_TEMPLATE_NAME)
            .map_err(|err| EngineError::render(err.to_string()))?;

        template
            .render(Value::from_serialize(locals))
            .map_err(|err| EngineError::render(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn compiled_page_interpolates_locals() {
        let engine = JinjaEngine::new();
        let page = engine.compile("<b>{{name}}</b>").expect("compile");

        let mut locals = Vars::new();
        locals.insert("name".to_string(), json!("X"));

        assert_eq!(page.render(&locals).expect("render"), "<b>X</b>");
    }

    #[test]
    fn one_page_renders_many_times_with_different_locals() {
        let engine = JinjaEngine::new();
        let page = engine.compile("hello {{who}}").expect("compile");

        let mut first = Vars::new();
        first.insert("who".to_string(), json!("a"));
        let mut second = Vars::new();
        second.insert("who".to_string(), json!("b"));

        assert_eq!(page.render(&first).expect("render"), "hello a");
        assert_eq!(page.render(&second).expect("render"), "hello b");
    }

    #[test]
    fn syntax_errors_surface_at_compile_time() {
        let engine = JinjaEngine::new();
        let result = engine.compile("{% if unclosed %}");

        assert!(matches!(result, Err(EngineError::Parse { .. })));
    }
}
