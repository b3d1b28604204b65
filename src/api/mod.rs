//! The thin axum surface spec §1 keeps in scope: health, RAG ask,
//! search, and webhook ingress for Teams/GitHub. Authentication/SSO,
//! HTML templates, admin pages, and all CRUD views are out of scope
//! (spec §1) and are not wired here — a real deployment hangs them off
//! [`handlers::ApiState`] separately.

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use handlers::ApiState;

pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .route("/ask", post(handlers::ask))
        .route("/search", post(handlers::search))
        .route("/files", post(handlers::upload_file))
        .route("/webhooks/github", post(handlers::github_webhook))
        .route("/webhooks/graph", post(handlers::graph_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
