pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::enhancement::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Stateless enhancement
        .route("/api/v1/enhance", post(handlers::handle_enhance))
        // Stored resumes
        .route(
            "/api/v1/resumes/:id",
            get(handlers::handle_get_resume).put(handlers::handle_put_resume),
        )
        .route(
            "/api/v1/resumes/:id/enhance",
            post(handlers::handle_enhance_stored),
        )
        .with_state(state)
}
