//! Wire types for the `/api/v1` REST contract.
//!
//! These mirror the backend's JSON bodies field for field. They carry no
//! behaviour beyond parsing; the store decides what each one means for the
//! local job state.

use crate::config::RenderConfig;
use serde::{Deserialize, Serialize};

/// Body of `POST /process/{job_id}`.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRequest<'a> {
    pub config: &'a RenderConfig,
}

/// Answer to `POST /upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub job_id: String,
    pub status: String,
    pub filename: String,
    /// Page count of the uploaded PDF; 0 when the backend could not read it.
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub message: Option<String>,
}

/// Acknowledgement of `POST /process/{job_id}`. Rendering continues
/// asynchronously on the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub job_id: String,
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// Answer to `GET /status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub job_id: String,
    pub status: String,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub current_stage: String,
    #[serde(default)]
    pub num_pages: u32,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl StatusResponse {
    pub fn remote_status(&self) -> RemoteStatus {
        RemoteStatus::parse(&self.status)
    }
}

/// Job status as transmitted by the backend.
///
/// Only `Completed` and `Failed` are terminal; everything else, including
/// values this client does not know, means "still processing".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
    Other,
}

impl RemoteStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "uploaded" => RemoteStatus::Uploaded,
            "processing" => RemoteStatus::Processing,
            "completed" => RemoteStatus::Completed,
            "failed" => RemoteStatus::Failed,
            _ => RemoteStatus::Other,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RemoteStatus::Completed | RemoteStatus::Failed)
    }
}

/// One row of `GET /jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub filename: String,
    pub status: String,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub num_pages: u32,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub current_stage: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
}

/// Answer to `GET /jobs` (most recent 50).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobList {
    pub jobs: Vec<JobSummary>,
    pub total: usize,
}

/// FastAPI-style error body: `{"detail": "..."}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// `detail` is a string for `HTTPException`, a list of objects for
    /// request-validation errors.
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
