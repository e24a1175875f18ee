use tracing::{info, warn};

use crate::application::locator::{self, BaseDir};
use crate::application::render::{FileOptions, MarkupOptions, RenderPipeline};
use crate::config::{RouteSettings, RouteTarget};

/// Startup cache warmer.
///
/// Routes flagged `warm` get one eager pipeline call before the server
/// accepts traffic. A failing route is logged and skipped so a typo in the
/// route table cannot keep the process from starting.
pub struct CacheWarmer {
    pipeline: RenderPipeline,
}

impl CacheWarmer {
    pub fn new(pipeline: RenderPipeline) -> Self {
        Self { pipeline }
    }

    /// Warm every flagged route; returns how many were populated.
    pub async fn warm(&self, routes: &[RouteSettings]) -> usize {
        let mut warmed = 0;

        for route in routes.iter().filter(|route| route.warm) {
            match self.warm_route(route).await {
                Ok(()) => {
                    info!(
                        target = "folia::warmup",
                        path = %route.path,
                        resource = %route.resource,
                        "cache entry warmed"
                    );
                    warmed += 1;
                }
                Err(detail) => {
                    warn!(
                        target = "folia::warmup",
                        path = %route.path,
                        resource = %route.resource,
                        detail = %detail,
                        "skipping route that failed to warm"
                    );
                }
            }
        }

        warmed
    }

    async fn warm_route(&self, route: &RouteSettings) -> Result<(), String> {
        match route.target {
            RouteTarget::Asset => {
                let resolved =
                    locator::resolve(self.pipeline.config(), &route.resource, BaseDir::Public);
                self.pipeline
                    .fetch(
                        &resolved.display().to_string(),
                        FileOptions {
                            cache: route.cache,
                            zip: route.zip,
                        },
                    )
                    .await
                    .map(|_| ())
                    .map_err(|err| err.to_string())
            }
            RouteTarget::Markup => self
                .pipeline
                .render_markup(
                    &route.resource,
                    &route.vars,
                    MarkupOptions { cache: route.cache },
                )
                .await
                .map(|_| ())
                .map_err(|err| err.to_string()),
            RouteTarget::Page => self
                .pipeline
                .compile_page(&route.resource, &route.vars)
                .await
                .map(|_| ())
                .map_err(|err| err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use crate::application::render::{EngineRegistry, PipelineConfig, Vars};

    use super::*;

    fn route(target: RouteTarget, resource: &str, warm: bool) -> RouteSettings {
        RouteSettings {
            path: format!("/{resource}"),
            target,
            resource: resource.to_string(),
            cache: true,
            zip: false,
            warm,
            vars: Vars::new(),
        }
    }

    #[tokio::test]
    async fn warms_flagged_routes_and_skips_failures() {
        let root = TempDir::new().expect("tempdir");
        fs::create_dir_all(root.path().join("views")).expect("views");
        fs::create_dir_all(root.path().join("public")).expect("public");
        fs::write(root.path().join("views/app.md"), "# Warm\n").expect("view");

        let config = PipelineConfig {
            root: root.path().to_path_buf(),
            cache_enabled: true,
            ..PipelineConfig::default()
        };
        let pipeline = RenderPipeline::new(config, &EngineRegistry::builtin()).expect("pipeline");
        let warmer = CacheWarmer::new(pipeline.clone());

        let routes = vec![
            route(RouteTarget::Markup, "app", true),
            route(RouteTarget::Markup, "missing", true),
            route(RouteTarget::Page, "app", false),
        ];

        let warmed = warmer.warm(&routes).await;

        assert_eq!(warmed, 1);
        assert!(pipeline.templates().markup("app.md").is_some());
        // Unflagged routes stay cold.
        assert!(pipeline.templates().page("app.md").is_none());
    }
}
