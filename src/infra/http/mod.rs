//! HTTP boundary: route construction and handler adapters.

mod middleware;
mod public;

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::application::render::RenderPipeline;
use crate::config::RouteSettings;

pub use middleware::log_responses;

#[derive(Clone)]
pub struct HttpState {
    pub pipeline: RenderPipeline,
}

/// Build the public router from the configured route table.
///
/// Every deployment also gets `/static/{*path}` (read-through asset serving
/// with gzip negotiation) and `/_health`.
pub fn build_router(state: HttpState, routes: &[RouteSettings]) -> Router {
    let mut router = Router::new();

    for route in routes {
        router = router.route(&route.path, public::route_handler(route));
    }

    router
        .route("/static/{*path}", get(public::serve_static))
        .route("/_health", get(public::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
}
