//! Downloadable example dataset.

use axum::{http::header, response::IntoResponse};
use serde::Deserialize;

use auditor_common::error::ApiError;
use auditor_data::synthetic::generate_sample_csv;

use crate::extract::ApiQuery;

const DEFAULT_ROWS: usize = 500;
const DEFAULT_SEED: u64 = 42;
const MAX_ROWS: usize = 100_000;

#[derive(Debug, Deserialize)]
pub struct SampleQuery {
    pub n: Option<usize>,
    pub seed: Option<u64>,
}

/// GET /sample.csv?n=&seed=
pub async fn sample_csv(
    ApiQuery(query): ApiQuery<SampleQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let n = query.n.unwrap_or(DEFAULT_ROWS);
    if n == 0 || n > MAX_ROWS {
        return Err(ApiError::bad_request(format!("n must be between 1 and {MAX_ROWS}")));
    }
    let csv = generate_sample_csv(n, query.seed.unwrap_or(DEFAULT_SEED))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"sample_data.csv\""),
        ],
        csv,
    ))
}
