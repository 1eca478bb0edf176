use axum::{Router, routing::{get, post}};
use std::sync::Arc;
use tower_http::cors::{CorsLayer, AllowOrigin};
use axum::http::Method;
use crate::AppState;
use crate::api::handlers;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any()) // The kiosk UI is served from a different origin
        .allow_methods(vec![Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(vec![axum::http::header::CONTENT_TYPE, axum::http::header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/stats", get(handlers::stats))
        .route("/stats/reset", post(handlers::reset_stats))
        .route("/identities", get(handlers::list_identities).post(handlers::register_identity))
        .route("/identities/:id", get(handlers::get_identity).delete(handlers::delete_identity))
        .route("/capture", post(handlers::capture_face))
        .route("/recognize", post(handlers::recognize))
        .route("/export", get(handlers::export_database).post(handlers::save_export))
        // Registration bodies carry several base64 images
        .layer(axum::extract::DefaultBodyLimit::max(32 * 1024 * 1024))
        .layer(cors)
        .with_state(state)
}
