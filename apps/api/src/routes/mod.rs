pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::resumes::handlers;
use crate::state::AppState;

pub const API_PREFIX: &str = "/api/v1";

/// Room for multipart boundaries and the job description field on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_size + MULTIPART_OVERHEAD;

    let api = Router::new()
        .route("/health", get(health::health_handler))
        .route("/resumes/upload", post(handlers::handle_upload))
        .route("/resumes", get(handlers::handle_list))
        .route(
            "/resumes/:id",
            get(handlers::handle_get)
                .put(handlers::handle_update)
                .delete(handlers::handle_delete),
        )
        .route("/resumes/:id/optimize", post(handlers::handle_optimize))
        .route("/resumes/:id/file", get(handlers::handle_download))
        .route("/resumes/:id/sections", get(handlers::handle_sections))
        .route(
            "/resumes/:id/sections/optimize",
            post(handlers::handle_optimize_sections),
        );

    Router::new()
        .route("/health", get(health::health_handler))
        .nest(API_PREFIX, api)
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
