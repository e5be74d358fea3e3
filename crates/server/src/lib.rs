pub mod config;
pub mod error;
pub mod handlers;
pub mod job_registry;
pub mod state;
pub mod ws_subscriber;

#[cfg(test)]
mod test_support;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes();
    Router::new()
        .route("/process-video", post(handlers::video::process_video))
        .route("/live/{job_id}", get(handlers::live::live))
        .route("/jobs/{job_id}", get(handlers::jobs::job_status))
        .route("/health", get(handlers::health::health))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
