//! End-to-end exercises of the router and pipeline over a throwaway site.

use std::fs;
use std::io::Read;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use folia::application::render::{EngineRegistry, PipelineConfig, RenderPipeline, Vars};
use folia::config::{RouteSettings, RouteTarget};
use folia::infra::http::{HttpState, build_router};
use folia::infra::warmup::CacheWarmer;
use http_body_util::BodyExt;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;

struct Site {
    root: TempDir,
}

impl Site {
    fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        fs::create_dir_all(root.path().join("views")).expect("views dir");
        fs::create_dir_all(root.path().join("public/css")).expect("public dir");
        Self { root }
    }

    fn write_view(&self, name: &str, contents: &str) {
        fs::write(self.root.path().join("views").join(name), contents).expect("write view");
    }

    fn write_public(&self, name: &str, contents: &str) {
        fs::write(self.root.path().join("public").join(name), contents).expect("write public");
    }

    fn pipeline(&self, cache_enabled: bool) -> RenderPipeline {
        let config = PipelineConfig {
            root: self.root.path().to_path_buf(),
            cache_enabled,
            ..PipelineConfig::default()
        };
        RenderPipeline::new(config, &EngineRegistry::builtin()).expect("pipeline")
    }

    fn router(&self, cache_enabled: bool, routes: Vec<RouteSettings>) -> Router {
        build_router(
            HttpState {
                pipeline: self.pipeline(cache_enabled),
            },
            &routes,
        )
    }
}

fn route(path: &str, target: RouteTarget, resource: &str) -> RouteSettings {
    RouteSettings {
        path: path.to_string(),
        target,
        resource: resource.to_string(),
        cache: true,
        zip: target == RouteTarget::Asset,
        warm: false,
        vars: Vars::new(),
    }
}

async fn get_response(router: Router, uri: &str, accept_encoding: Option<&str>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut request = Request::builder().uri(uri);
    if let Some(encoding) = accept_encoding {
        request = request.header(header::ACCEPT_ENCODING, encoding);
    }
    let response = router
        .oneshot(request.body(Body::empty()).expect("request"))
        .await
        .expect("response");

    let status = response.status();
    let headers = response.headers().clone();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec();
    (status, headers, body)
}

fn gunzip(bytes: &[u8]) -> Vec<u8> {
    let mut decoder = flate2::read::GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).expect("gunzip");
    out
}

#[tokio::test]
async fn page_route_renders_with_query_locals() {
    let site = Site::new();
    site.write_view("index.md", "hello {{name}}\n");
    let router = site.router(
        true,
        vec![route("/", RouteTarget::Page, "index")],
    );

    let (status, headers, body) = get_response(router, "/?name=X", None).await;

    assert_eq!(status, StatusCode::OK);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .expect("content type");
    assert!(content_type.starts_with("text/html"));
    assert!(String::from_utf8(body).expect("utf8").contains("hello X"));
}

#[tokio::test]
async fn page_route_vars_yield_to_query_parameters() {
    let site = Site::new();
    site.write_view("index.md", "hello {{name}}\n");

    let mut route_entry = route("/", RouteTarget::Page, "index");
    route_entry.vars.insert("name".to_string(), json!("configured"));
    let router = site.router(true, vec![route_entry.clone()]);

    let (_, _, body) = get_response(router, "/", None).await;
    assert!(String::from_utf8(body).expect("utf8").contains("hello configured"));

    let router = site.router(true, vec![route_entry]);
    let (_, _, body) = get_response(router, "/?name=override", None).await;
    assert!(String::from_utf8(body).expect("utf8").contains("hello override"));
}

#[tokio::test]
async fn markup_route_serves_rendered_markdown() {
    let site = Site::new();
    site.write_view("about.md", "# About\n");
    let router = site.router(
        true,
        vec![route("/about", RouteTarget::Markup, "about")],
    );

    let (status, _, body) = get_response(router, "/about", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).expect("utf8").contains("<h1>About</h1>"));
}

#[tokio::test]
async fn asset_route_negotiates_gzip() {
    let site = Site::new();
    site.write_public("css/site.css", "body{margin:0}");
    let route_entry = route("/css/site.css", RouteTarget::Asset, "css/site.css");

    let router = site.router(true, vec![route_entry.clone()]);
    let (status, headers, body) = get_response(router, "/css/site.css", Some("gzip, deflate")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers
            .get(header::CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok()),
        Some("gzip")
    );
    assert_eq!(
        headers
            .get(header::VARY)
            .and_then(|value| value.to_str().ok()),
        Some("accept-encoding")
    );
    assert_eq!(gunzip(&body), b"body{margin:0}");

    // Without the capability the raw representation is served.
    let router = site.router(true, vec![route_entry]);
    let (status, headers, body) = get_response(router, "/css/site.css", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::CONTENT_ENCODING).is_none());
    assert_eq!(body, b"body{margin:0}");
}

#[tokio::test]
async fn static_fallback_serves_public_files() {
    let site = Site::new();
    site.write_public("css/site.css", "body{}");
    let router = site.router(true, vec![]);

    let (status, headers, body) = get_response(router, "/static/css/site.css", None).await;

    assert_eq!(status, StatusCode::OK);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .expect("content type");
    assert!(content_type.starts_with("text/css"));
    assert_eq!(body, b"body{}");
}

#[tokio::test]
async fn missing_resources_map_to_not_found() {
    let site = Site::new();
    let router = site.router(
        true,
        vec![route("/", RouteTarget::Page, "index")],
    );
    let (status, _, _) = get_response(router, "/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let router = site.router(true, vec![]);
    let (status, _, _) = get_response(router, "/static/missing.css", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let router = site.router(true, vec![]);
    let (status, _, _) = get_response(router, "/static/.hidden", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn warmed_routes_survive_source_removal() {
    let site = Site::new();
    site.write_view("index.md", "warm {{name}}\n");

    let mut route_entry = route("/", RouteTarget::Page, "index");
    route_entry.warm = true;
    let pipeline = site.pipeline(true);

    let warmed = CacheWarmer::new(pipeline.clone()).warm(std::slice::from_ref(&route_entry)).await;
    assert_eq!(warmed, 1);

    fs::remove_file(site.root.path().join("views/index.md")).expect("remove source");

    let router = build_router(HttpState { pipeline }, &[route_entry]);
    let (status, _, body) = get_response(router, "/?name=X", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).expect("utf8").contains("warm X"));
}

#[tokio::test]
async fn health_endpoint_responds() {
    let site = Site::new();
    let router = site.router(false, vec![]);

    let (status, _, body) = get_response(router, "/_health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}
