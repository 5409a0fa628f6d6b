//! Upload event broadcaster: the completed/error hooks of the upload workflow.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::upload::model::{FacturaSummary, UploadJob, UploadStatus};

/// What happened to the tracked upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UploadEventKind {
    Submitted,
    StatusChanged,
    Completed,
    Failed,
}

impl std::fmt::Display for UploadEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadEventKind::Submitted => write!(f, "Submitted"),
            UploadEventKind::StatusChanged => write!(f, "Status changed"),
            UploadEventKind::Completed => write!(f, "Completed"),
            UploadEventKind::Failed => write!(f, "Failed"),
        }
    }
}

/// Event emitted by an upload coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    /// Backend-assigned upload id.
    pub job_id: String,
    /// Original filename.
    pub filename: String,
    pub kind: UploadEventKind,
    /// Job status at the time of the event.
    pub status: UploadStatus,
    /// Human-readable message for the presentation layer.
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Invoice summary (set on completion).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<FacturaSummary>,
    /// Backend error message (set on failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadEvent {
    fn from_job(job: &UploadJob, kind: UploadEventKind, message: String) -> Self {
        Self {
            job_id: job.id.clone(),
            filename: job.filename.clone(),
            kind,
            status: job.status.clone(),
            message,
            timestamp: Utc::now(),
            result: None,
            error: None,
        }
    }

    pub fn submitted(job: &UploadJob) -> Self {
        Self::from_job(
            job,
            UploadEventKind::Submitted,
            "Procesando factura...".to_string(),
        )
    }

    pub fn status_changed(job: &UploadJob) -> Self {
        Self::from_job(
            job,
            UploadEventKind::StatusChanged,
            format!("Estado: {}", job.status),
        )
    }

    pub fn completed(job: &UploadJob) -> Self {
        let mut event = Self::from_job(
            job,
            UploadEventKind::Completed,
            "Factura procesada correctamente".to_string(),
        );
        event.result = job.result.clone();
        event
    }

    pub fn failed(job: &UploadJob) -> Self {
        let error = job.error_message.clone().unwrap_or_default();
        let mut event = Self::from_job(
            job,
            UploadEventKind::Failed,
            format!("La factura no pudo procesarse: {}", error),
        );
        event.error = Some(error);
        event
    }
}

/// Broadcasts upload events to any number of subscribers.
#[derive(Clone)]
pub struct UploadEventBroadcaster {
    sender: Arc<broadcast::Sender<UploadEvent>>,
}

impl UploadEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: UploadEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UploadEvent> {
        self.sender.subscribe()
    }
}

impl Default for UploadEventBroadcaster {
    fn default() -> Self {
        Self::new(64)
    }
}
