pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use middleware::log_requests;
pub use rest::ApiDoc;
pub use state::AppState;

/// Uploads up to 10 MB plus multipart framing.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Builds the API router (without Swagger UI) over the shared state.
pub fn router(app_state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/{kind}/status", get(rest::status_handler))
        .route("/{kind}/analyze", post(rest::analyze_handler))
        .route("/{kind}/current", get(rest::current_handler))
        .route(
            "/{kind}/history",
            get(rest::list_history_handler).delete(rest::clear_history_handler),
        )
        .route(
            "/{kind}/history/{id}",
            get(rest::view_history_handler).delete(rest::delete_history_item_handler),
        )
        .route(
            "/settings",
            get(rest::get_settings_handler)
                .put(rest::put_settings_handler)
                .delete(rest::delete_settings_handler),
        )
        .route("/models", get(rest::list_models_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(axum_middleware::from_fn(log_requests))
        .layer(cors)
        .with_state(app_state)
}
