//! Shared application state for the web server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use auditor_common::AuditorConfig;
use auditor_data::PreparedDataset;
use auditor_fair::ModelKind;

/// Events pushed to connected clients via SSE.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// A CSV was uploaded and replaced the active dataset
    DatasetUploaded { dataset_id: Uuid, rows: usize, sensitive_col: String },
    /// A training run finished
    ModelTrained { model: ModelKind, accuracy: f64, bias_gap: f64, source: String },
}

impl AppEvent {
    /// SSE `event:` name, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::DatasetUploaded { .. } => "dataset_uploaded",
            AppEvent::ModelTrained { .. } => "model_trained",
        }
    }
}

/// The most recent upload, prepared for training.
#[derive(Debug)]
pub struct UploadedDataset {
    pub id: Uuid,
    pub filename: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub dataset: PreparedDataset,
}

/// Shared state injected into every Axum handler.
pub struct AppState {
    pub config: AuditorConfig,
    /// Replaced wholesale on every successful upload
    dataset: RwLock<Option<Arc<UploadedDataset>>>,
    /// Broadcast channel for SSE push events
    pub event_tx: broadcast::Sender<AppEvent>,
}

impl AppState {
    pub fn new(config: AuditorConfig) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { config, dataset: RwLock::new(None), event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    /// Broadcast to SSE subscribers; no subscribers is not an error.
    pub fn publish(&self, event: AppEvent) {
        let _ = self.event_tx.send(event);
    }

    pub async fn dataset(&self) -> Option<Arc<UploadedDataset>> {
        self.dataset.read().await.clone()
    }

    pub async fn replace_dataset(&self, uploaded: UploadedDataset) -> Arc<UploadedDataset> {
        let uploaded = Arc::new(uploaded);
        *self.dataset.write().await = Some(Arc::clone(&uploaded));
        uploaded
    }
}

pub type SharedState = Arc<AppState>;
