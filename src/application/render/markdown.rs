use comrak::{Arena, Options, format_html, parse_document};

use super::types::{EngineError, MarkupEngine, Vars};

/// Built-in first-pass engine: CommonMark (plus the usual extensions) to
/// HTML via Comrak.
pub struct MarkdownEngine {
    options: Options<'static>,
}

impl MarkdownEngine {
    pub fn new() -> Self {
        let mut options = Options::default();
        options.extension.table = true;
        options.extension.strikethrough = true;
        options.extension.tasklist = true;
        options.extension.autolink = true;

        Self { options }
    }
}

impl Default for MarkdownEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkupEngine for MarkdownEngine {
    fn source_extension(&self) -> &'static str {
        "md"
    }

    fn render(&self, source: &str, _params: &Vars) -> Result<String, EngineError> {
        let arena = Arena::new();
        let root = parse_document(&arena, source, &self.options);

        let mut output = String::new();
        format_html(root, &self.options, &mut output)
            .map_err(|err| EngineError::markup(err.to_string()))?;

        Ok(output)
    }
}
