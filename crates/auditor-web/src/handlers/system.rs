//! Liveness and active-dataset status.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::SharedState;

/// GET /: readiness check used by the frontend.
pub async fn home() -> Json<Value> {
    Json(json!({ "message": "Backend Ready" }))
}

/// GET /api/dataset: summary of the uploaded dataset, if any.
pub async fn dataset_status(State(state): State<SharedState>) -> Json<Value> {
    let Some(uploaded) = state.dataset().await else {
        return Json(json!({ "loaded": false }));
    };
    let ds = &uploaded.dataset;

    Json(json!({
        "loaded": true,
        "dataset_id": uploaded.id,
        "filename": uploaded.filename,
        "uploaded_at": uploaded.uploaded_at,
        "rows": ds.raw_rows,
        "usable_rows": ds.n_rows(),
        "sensitive_col": ds.sensitive_column,
        "target_col": ds.target_column,
        "features": ds.feature_names,
        "groups": ds.group_names(),
    }))
}
