use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{MethodRouter, get},
};
use bytes::Bytes;
use serde_json::Value;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::locator::{self, BaseDir};
use crate::application::render::{FileOptions, MarkupOptions, PipelineError, Vars};
use crate::config::{RouteSettings, RouteTarget};

use super::HttpState;

/// Adapt one configured route into an axum handler.
pub(super) fn route_handler(route: &RouteSettings) -> MethodRouter<HttpState> {
    let route = route.clone();
    match route.target {
        RouteTarget::Asset => get(move |state: State<HttpState>, headers: HeaderMap| {
            serve_asset(state, route.clone(), headers)
        }),
        RouteTarget::Markup => {
            get(move |state: State<HttpState>| serve_markup(state, route.clone()))
        }
        RouteTarget::Page => get(
            move |state: State<HttpState>, query: Query<HashMap<String, String>>| {
                serve_page(state, route.clone(), query)
            },
        ),
    }
}

/// Serve a public file through the read-through cache, negotiating gzip
/// against the request's declared encoding capability.
async fn serve_asset(
    State(state): State<HttpState>,
    route: RouteSettings,
    headers: HeaderMap,
) -> Response {
    let resolved = locator::resolve(state.pipeline.config(), &route.resource, BaseDir::Public);
    let path = resolved.display().to_string();
    let gzip = route.zip && accepts_gzip(&headers);

    match state
        .pipeline
        .fetch(
            &path,
            FileOptions {
                cache: route.cache,
                zip: gzip,
            },
        )
        .await
    {
        Ok(bytes) => asset_response(&state, &path, bytes, gzip, route.zip),
        Err(err) => HttpError::from(err).into_response(),
    }
}

async fn serve_markup(State(state): State<HttpState>, route: RouteSettings) -> Response {
    match state
        .pipeline
        .render_markup(
            &route.resource,
            &route.vars,
            MarkupOptions { cache: route.cache },
        )
        .await
    {
        Ok(html) => Html(html).into_response(),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// Compile (or fetch the compiled) page, then render it with the configured
/// vars overlaid by the request's query parameters.
async fn serve_page(
    State(state): State<HttpState>,
    route: RouteSettings,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let page = match state.pipeline.compile_page(&route.resource, &route.vars).await {
        Ok(page) => page,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let mut locals = route.vars.clone();
    for (key, value) in query {
        locals.insert(key, Value::String(value));
    }

    match page.render(&locals) {
        Ok(html) => Html(html).into_response(),
        Err(source) => HttpError::from(PipelineError::Render {
            name: route.resource.clone(),
            source,
        })
        .into_response(),
    }
}

/// Catch-all asset route: any file under the public directory, cached and
/// gzip-negotiable.
pub(super) async fn serve_static(
    state: State<HttpState>,
    path: Option<Path<String>>,
    headers: HeaderMap,
) -> Response {
    let Some(resource) = sanitize_static_path(path.map(|Path(value)| value)) else {
        return not_found_response("infra::http::serve_static");
    };

    let route = RouteSettings {
        path: String::new(),
        target: RouteTarget::Asset,
        resource,
        cache: true,
        zip: true,
        warm: false,
        vars: Vars::new(),
    };
    serve_asset(state, route, headers).await
}

pub(super) async fn health() -> &'static str {
    "ok"
}

fn not_found_response(source: &'static str) -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

fn sanitize_static_path(path: Option<String>) -> Option<String> {
    let mut candidate = path.unwrap_or_default();
    if candidate.starts_with('/') {
        candidate = candidate.trim_start_matches('/').to_string();
    }

    // Avoid directory traversal and disallow directory listings.
    if candidate.is_empty()
        || candidate.ends_with('/')
        || candidate.starts_with('.')
        || candidate.contains("..")
    {
        return None;
    }

    Some(candidate)
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|encoding| encoding.trim().split(';').next() == Some("gzip"))
}

fn asset_response(
    state: &HttpState,
    path: &str,
    bytes: Bytes,
    gzip: bool,
    negotiable: bool,
) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let len = bytes.len();

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    if gzip {
        headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    }
    if negotiable {
        headers.insert(header::VARY, HeaderValue::from_static("accept-encoding"));
    }
    let cache_control = if state.pipeline.config().cache_enabled {
        "public, max-age=3600"
    } else {
        "no-cache"
    };
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );

    response
}
