//! Route table and middleware stack.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    sample::sample_csv,
    system::{dataset_status, home},
    train::{compare, train_biased, train_mitigated},
    upload::upload,
};
use crate::sse::sse_handler;
use crate::state::{AppState, SharedState};

/// Build and return the full Axum router.
pub fn build_router(state: AppState) -> Router {
    let max_upload = state.config.server.max_upload_bytes;
    let shared: SharedState = Arc::new(state);

    Router::new()
        .route("/",                get(home))
        .route("/upload",          post(upload))
        .route("/train/biased",    post(train_biased))
        .route("/train/mitigated", post(train_mitigated))
        .route("/compare",         post(compare))
        .route("/sample.csv",      get(sample_csv))

        // SSE streaming
        .route("/api/events",  get(sse_handler))
        .route("/api/dataset", get(dataset_status))

        // Middleware
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
