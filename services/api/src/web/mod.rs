pub mod export;
pub mod form;
pub mod response;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

pub use rest::{
    export_activity_handler, generate_activity_handler, get_activity_handler,
    list_providers_handler, validate_key_handler, ApiDoc,
};
pub use state::AppState;

/// Room left for the text fields of a multipart form next to its files.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Builds the `/api` router with CORS, request tracing and a body limit sized
/// for the configured uploads.
pub fn router(app_state: Arc<AppState>) -> Router {
    let config = &app_state.config;
    let body_limit = config
        .max_pdf_bytes
        .saturating_mul(config.max_pdf_files)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);
    match config.cors_allowed_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => warn!(
            origin = %config.cors_allowed_origin,
            "Ignoring invalid CORS origin"
        ),
    }

    Router::new()
        .route("/api/generate-activity", post(generate_activity_handler))
        .route("/api/validate-key", post(validate_key_handler))
        .route("/api/activities/{id}", get(get_activity_handler))
        .route("/api/activities/{id}/export", get(export_activity_handler))
        .route("/api/providers", get(list_providers_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
