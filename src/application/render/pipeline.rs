use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use flate2::{Compression, write::GzEncoder};
use metrics::counter;
use serde_json::Value;
use tracing::debug;

use crate::application::locator::{self, BaseDir};
use crate::cache::flight::Flight;
use crate::cache::{FileStore, TemplateStore};

use super::registry::EngineRegistry;
use super::types::{
    CompiledTemplate, FileOptions, MarkupEngine, MarkupOptions, PipelineConfig, PipelineError,
    TemplateEngine, Vars,
};

/// Extensions that denote already-rendered markup: the second pass reads
/// these directly instead of running the first pass.
const FINAL_MARKUP_EXTENSIONS: [&str; 2] = ["html", "htm"];

/// The read-through render pipeline.
///
/// Cheap to clone: all state is shared. Configuration is frozen at
/// construction; the engines named in it are resolved through the registry
/// exactly once, here.
#[derive(Clone)]
pub struct RenderPipeline {
    config: Arc<PipelineConfig>,
    markup_engine: Arc<dyn MarkupEngine>,
    template_engine: Arc<dyn TemplateEngine>,
    files: Arc<FileStore>,
    templates: Arc<TemplateStore>,
    file_flight: Flight<Bytes>,
    markup_flight: Flight<String>,
    page_flight: Flight<Arc<dyn CompiledTemplate>>,
}

impl RenderPipeline {
    pub fn new(config: PipelineConfig, registry: &EngineRegistry) -> Result<Self, PipelineError> {
        let markup_engine = registry.markup(&config.markup_engine)?;
        let template_engine = registry.template(&config.template_engine)?;

        Ok(Self {
            config: Arc::new(config),
            markup_engine,
            template_engine,
            files: Arc::new(FileStore::new()),
            templates: Arc::new(TemplateStore::new()),
            file_flight: Flight::new(),
            markup_flight: Flight::new(),
            page_flight: Flight::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    /// Read-through file access. The cache key is `path` exactly as given.
    ///
    /// With `zip` set the compressed representation is returned, derived
    /// from an already-cached raw entry when possible. On a miss the file is
    /// read once, compressed when requested, and the computed representations
    /// are stored when the `cache` option and the global gate allow it.
    pub async fn fetch(&self, path: &str, options: FileOptions) -> Result<Bytes, PipelineError> {
        if self.config.cache_enabled {
            if options.zip {
                if let Some(bytes) = self.files.compressed(path) {
                    counter!("folia_cache_file_hit_total").increment(1);
                    return Ok(bytes);
                }
                if let Some(raw) = self.files.raw(path) {
                    counter!("folia_cache_file_hit_total").increment(1);
                    let compressed = compress(path, &raw)?;
                    self.files.attach_compressed(path, compressed.clone());
                    return Ok(compressed);
                }
            } else if let Some(bytes) = self.files.raw(path) {
                counter!("folia_cache_file_hit_total").increment(1);
                return Ok(bytes);
            }
        }

        counter!("folia_cache_file_miss_total").increment(1);

        let flight_key = if options.zip {
            format!("{path}#gzip")
        } else {
            path.to_string()
        };
        let files = Arc::clone(&self.files);
        let cache_enabled = self.config.cache_enabled;
        let path_task = path.to_string();

        self.file_flight
            .run(&flight_key, async move {
                let resolved = Path::new(&path_task);
                let raw = tokio::fs::read(resolved)
                    .await
                    .map(Bytes::from)
                    .map_err(|err| PipelineError::read(resolved, &err))?;

                let compressed = if options.zip {
                    Some(compress(&path_task, &raw)?)
                } else {
                    None
                };

                if options.cache && cache_enabled {
                    files.insert(&path_task, raw.clone(), compressed.clone());
                }

                match compressed {
                    Some(bytes) => Ok(bytes),
                    None => Ok(raw),
                }
            })
            .await
    }

    /// First pass: template source to rendered markup.
    ///
    /// The resource identity is the logical name with the engine's source
    /// extension applied. A cached rendered string is returned without
    /// touching disk; otherwise the source is read from the views directory,
    /// rendered with the merged parameter set, and stored when allowed.
    pub async fn render_markup(
        &self,
        name: &str,
        vars: &Vars,
        options: MarkupOptions,
    ) -> Result<String, PipelineError> {
        let identity =
            locator::with_default_extension(name, self.markup_engine.source_extension());

        if self.config.cache_enabled
            && let Some(html) = self.templates.markup(&identity)
        {
            counter!("folia_cache_markup_hit_total").increment(1);
            return Ok(html);
        }

        counter!("folia_cache_markup_miss_total").increment(1);

        let flight_key = format!("markup:{identity}");
        let config = Arc::clone(&self.config);
        let engine = Arc::clone(&self.markup_engine);
        let templates = Arc::clone(&self.templates);
        let vars_task = vars.clone();
        let identity_task = identity.clone();

        self.markup_flight
            .run(&flight_key, async move {
                let resolved = locator::resolve(&config, &identity_task, BaseDir::Views);
                let source = tokio::fs::read_to_string(&resolved)
                    .await
                    .map_err(|err| PipelineError::read(&resolved, &err))?;

                // Precedence: pipeline defaults, then caller vars, then the
                // injected filename the engine can use for diagnostics.
                let mut params = config.default_vars.clone();
                for (key, value) in vars_task {
                    params.insert(key, value);
                }
                params.insert(
                    "filename".to_string(),
                    Value::String(resolved.display().to_string()),
                );

                let html =
                    engine
                        .render(&source, &params)
                        .map_err(|source| PipelineError::Render {
                            name: identity_task.clone(),
                            source,
                        })?;

                if options.cache && config.cache_enabled {
                    templates.insert_markup(&identity_task, html.clone());
                }

                Ok(html)
            })
            .await
    }

    /// Second pass: logical name to a compiled page.
    ///
    /// Names resolving to final markup (`.html`, `.htm`) are read directly;
    /// anything else goes through the first pass, uncached under its own
    /// key, so only the compiled page is stored. The returned page is
    /// invoked later, per request, with runtime locals; that output is
    /// never cached.
    pub async fn compile_page(
        &self,
        name: &str,
        vars: &Vars,
    ) -> Result<Arc<dyn CompiledTemplate>, PipelineError> {
        let identity =
            locator::with_default_extension(name, self.markup_engine.source_extension());

        if self.config.cache_enabled
            && let Some(page) = self.templates.page(&identity)
        {
            counter!("folia_cache_page_hit_total").increment(1);
            return Ok(page);
        }

        counter!("folia_cache_page_miss_total").increment(1);

        let flight_key = format!("page:{identity}");
        let pipeline = self.clone();
        let name_task = name.to_string();
        let vars_task = vars.clone();
        let identity_task = identity.clone();

        self.page_flight
            .run(&flight_key, async move {
                let markup = if is_final_markup(&identity_task) {
                    let resolved =
                        locator::resolve(&pipeline.config, &identity_task, BaseDir::Views);
                    tokio::fs::read_to_string(&resolved)
                        .await
                        .map_err(|err| PipelineError::read(&resolved, &err))?
                } else {
                    pipeline
                        .render_markup(&name_task, &vars_task, MarkupOptions { cache: false })
                        .await?
                };

                let page = pipeline
                    .template_engine
                    .compile(&markup)
                    .map_err(|source| PipelineError::Compile {
                        name: identity_task.clone(),
                        source,
                    })?;

                if pipeline.config.cache_enabled {
                    pipeline
                        .templates
                        .insert_page(&identity_task, Arc::clone(&page));
                }

                debug!(
                    target = "folia::render",
                    identity = %identity_task,
                    "compiled page"
                );

                Ok(page)
            })
            .await
    }
}

fn is_final_markup(identity: &str) -> bool {
    Path::new(identity)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FINAL_MARKUP_EXTENSIONS.contains(&ext))
}

fn compress(path: &str, bytes: &[u8]) -> Result<Bytes, PipelineError> {
    counter!("folia_compress_total").increment(1);

    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2), Compression::default());
    encoder
        .write_all(bytes)
        .and_then(|()| encoder.finish())
        .map(Bytes::from)
        .map_err(|err| PipelineError::Compression {
            path: path.to_string(),
            detail: err.to_string(),
        })
}
