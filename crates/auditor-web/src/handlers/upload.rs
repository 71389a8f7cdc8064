//! CSV upload: parse, infer columns, and make it the active dataset.

use axum::{
    extract::{Multipart, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use auditor_common::error::ApiError;
use auditor_data::{prepare, Table};

use crate::state::{AppEvent, SharedState, UploadedDataset};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    /// Rows in the file, before rows with missing values are dropped
    pub rows: usize,
    pub sensitive_col: String,
    pub dataset_id: Uuid,
}

/// POST /upload: multipart form with a `file` field holding CSV.
pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::unprocessable(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::unprocessable(format!("Failed to read upload: {e}")))?;
        file = Some((filename, bytes));
        break;
    }
    let (filename, bytes) =
        file.ok_or_else(|| ApiError::unprocessable("Missing multipart field `file`"))?;

    let data_config = state.config.data.clone();
    let dataset = tokio::task::spawn_blocking(move || {
        let table = Table::from_csv_bytes(&bytes)?;
        prepare(&table, &data_config)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Upload task failed: {e}")))??;

    let uploaded = state
        .replace_dataset(UploadedDataset {
            id: Uuid::new_v4(),
            filename,
            uploaded_at: Utc::now(),
            dataset,
        })
        .await;
    let ds = &uploaded.dataset;

    tracing::info!(
        dataset_id = %uploaded.id,
        filename = uploaded.filename.as_deref().unwrap_or("-"),
        rows = ds.raw_rows,
        usable_rows = ds.n_rows(),
        sensitive = %ds.sensitive_column,
        target = %ds.target_column,
        "dataset uploaded"
    );
    state.publish(AppEvent::DatasetUploaded {
        dataset_id: uploaded.id,
        rows: ds.raw_rows,
        sensitive_col: ds.sensitive_column.clone(),
    });

    Ok(Json(UploadResponse {
        message: "File processed",
        rows: ds.raw_rows,
        sensitive_col: ds.sensitive_column.clone(),
        dataset_id: uploaded.id,
    }))
}
