//! Training endpoints: baseline, mitigated, and both side by side.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use auditor_common::error::ApiError;
use auditor_common::{MitigationConfig, TrainingConfig};
use auditor_data::synthetic::generate_biased_dataset;
use auditor_data::PreparedDataset;
use auditor_fair::{train_and_evaluate, Comparison, FairnessReport, ModelKind};

use crate::extract::ApiJson;
use crate::state::{AppEvent, SharedState, UploadedDataset};

#[derive(Debug, Default, Deserialize)]
pub struct TrainRequest {
    #[serde(default)]
    pub n_samples: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub baseline: FairnessReport,
    pub mitigated: FairnessReport,
    pub comparison: Comparison,
}

/// Where a run's rows come from.
enum Source {
    Uploaded(Arc<UploadedDataset>),
    Synthetic(PreparedDataset),
}

impl Source {
    fn resolve(
        uploaded: Option<Arc<UploadedDataset>>,
        n_samples: usize,
        seed: Option<u64>,
    ) -> auditor_common::Result<Self> {
        Ok(match uploaded {
            Some(up) => Source::Uploaded(up),
            None => Source::Synthetic(generate_biased_dataset(n_samples, seed)?),
        })
    }

    fn dataset(&self) -> &PreparedDataset {
        match self {
            Source::Uploaded(up) => &up.dataset,
            Source::Synthetic(ds) => ds,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Source::Uploaded(_) => "uploaded",
            Source::Synthetic(_) => "synthetic",
        }
    }

    fn run(
        &self,
        n_samples: usize,
        kind: ModelKind,
        training: &TrainingConfig,
        mitigation: &MitigationConfig,
    ) -> auditor_common::Result<FairnessReport> {
        train_and_evaluate(self.dataset(), n_samples, kind, training, mitigation)
            .map(|report| report.with_source(self.label()))
    }
}

/// Run `kinds` on one resolved dataset off the async runtime.
async fn run_models(
    state: &SharedState,
    n_samples: usize,
    kinds: Vec<ModelKind>,
) -> Result<Vec<FairnessReport>, ApiError> {
    let uploaded = state.dataset().await;
    let training = state.config.training.clone();
    let mitigation = state.config.mitigation.clone();
    let seed = state.config.synthetic.seed;

    let reports = tokio::task::spawn_blocking(move || {
        let source = Source::resolve(uploaded, n_samples, seed)?;
        kinds
            .into_iter()
            .map(|kind| source.run(n_samples, kind, &training, &mitigation))
            .collect::<auditor_common::Result<Vec<_>>>()
    })
    .await
    .map_err(|e| ApiError::internal(format!("Training task failed: {e}")))??;

    for report in &reports {
        state.publish(AppEvent::ModelTrained {
            model: report.model,
            accuracy: report.accuracy,
            bias_gap: report.bias_gap,
            source: report.source.clone(),
        });
    }
    Ok(reports)
}

/// Requested sample count, defaulted and checked against `training.max_n_samples`.
fn requested_samples(state: &SharedState, req: &TrainRequest) -> Result<usize, ApiError> {
    let training = &state.config.training;
    let n_samples = req.n_samples.unwrap_or(training.default_n_samples);
    if n_samples > training.max_n_samples {
        return Err(ApiError::unprocessable(format!(
            "n_samples must be at most {}, got {n_samples}",
            training.max_n_samples
        )));
    }
    Ok(n_samples)
}

async fn train_one(
    state: SharedState,
    req: TrainRequest,
    kind: ModelKind,
) -> Result<Json<FairnessReport>, ApiError> {
    let n_samples = requested_samples(&state, &req)?;
    let report = run_models(&state, n_samples, vec![kind])
        .await?
        .pop()
        .ok_or_else(|| ApiError::internal("Training produced no report"))?;
    Ok(Json(report))
}

/// POST /train/biased: unconstrained decision tree.
pub async fn train_biased(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<TrainRequest>,
) -> Result<Json<FairnessReport>, ApiError> {
    train_one(state, req, ModelKind::Baseline).await
}

/// POST /train/mitigated: decision trees under demographic parity.
pub async fn train_mitigated(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<TrainRequest>,
) -> Result<Json<FairnessReport>, ApiError> {
    train_one(state, req, ModelKind::Mitigated).await
}

/// POST /compare: both models on the same rows.
pub async fn compare(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<TrainRequest>,
) -> Result<Json<CompareResponse>, ApiError> {
    let n_samples = requested_samples(&state, &req)?;
    let mut reports =
        run_models(&state, n_samples, vec![ModelKind::Baseline, ModelKind::Mitigated]).await?;

    let (Some(mitigated), Some(baseline)) = (reports.pop(), reports.pop()) else {
        return Err(ApiError::internal("Comparison produced too few reports"));
    };
    let comparison = Comparison::between(&baseline, &mitigated);
    tracing::info!(
        accuracy_change = comparison.accuracy_change,
        bias_gap_reduction = comparison.bias_gap_reduction,
        "models compared"
    );

    Ok(Json(CompareResponse { baseline, mitigated, comparison }))
}
