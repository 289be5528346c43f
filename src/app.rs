// Router assembly for the session API

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{any, get},
};
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::session::SessionManagerState;

/// CORS policy for the browser UI: any origin, JSON bodies
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([CONTENT_TYPE])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
}

/// Build the application router.
///
/// API routes accept any method. Everything else is served from `static_dir`,
/// with `/` mapped to its `index.html`.
pub fn build_router(state: SessionManagerState, static_dir: impl AsRef<Path>) -> Router {
    let static_dir = static_dir.as_ref();

    let api = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/create", any(handlers::session::create_session))
        .route("/api/request/:id", any(handlers::session::record_request))
        .route("/api/session/:id", any(handlers::session::get_history))
        .route("/api/extend/:id", any(handlers::session::extend_session))
        .route("/api/clear/:id", any(handlers::session::clear_session))
        .route("/api/delete/:id", any(handlers::session::delete_session))
        .route("/api/info/:id", any(handlers::session::session_info))
        .with_state(state);

    Router::new()
        .merge(api)
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .fallback_service(ServeDir::new(static_dir))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}
