//! Axum router construction.
//!
//! Builds the application router with the clip routes, the legacy plugin
//! aliases, and the middleware layers.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    // The share UI is injected into a media server page on another origin.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // `get` also answers HEAD.
    let clip_routes = Router::new()
        .route("/clip", post(routes::clips::create_clip))
        .route("/clip/{token}", get(routes::clips::get_clip))
        .route("/clip/{token}/info", get(routes::clips::clip_info));

    // Paths called by the media-server plugin's injected script.
    let legacy_routes = Router::new()
        .route("/ClipShare/Create", post(routes::clips::create_clip))
        .route("/ClipShare/video/{token}", get(routes::clips::get_clip));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(clip_routes)
        .merge(legacy_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
