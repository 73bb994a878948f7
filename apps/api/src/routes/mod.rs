pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;
use crate::suggestions::handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Text-level suggestion API
        .route("/api/v1/suggestions/scan", post(handlers::handle_scan))
        .route("/api/v1/suggestions/generate", post(handlers::handle_generate))
        .route("/api/v1/suggestions/group", post(handlers::handle_group))
        .route(
            "/api/v1/suggestions/prioritize",
            post(handlers::handle_prioritize),
        )
        .route("/api/v1/suggestions/apply", post(handlers::handle_apply))
        .route("/api/v1/suggestions/upload", post(handlers::handle_upload))
        // Stored resume profiles
        .route(
            "/api/v1/resumes/:id/profile",
            get(handlers::handle_get_profile).put(handlers::handle_put_profile),
        )
        .route("/api/v1/resumes/:id/scan", post(handlers::handle_scan_profile))
        .route(
            "/api/v1/resumes/:id/suggestions",
            get(handlers::handle_list_suggestions),
        )
        .route("/api/v1/resumes/:id/score", get(handlers::handle_score))
        .route(
            "/api/v1/resumes/:id/suggestions/:sid/review",
            post(handlers::handle_review),
        )
        .route(
            "/api/v1/resumes/:id/suggestions/apply-all",
            post(handlers::handle_apply_all),
        )
        .with_state(state)
}
