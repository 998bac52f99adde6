//! Error types for the handwriting-client library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`UploadRejection`]: the file was refused **before** any network call
//!   (wrong type, too large, empty). The store records it as a transient
//!   notice and the upload status does not move.
//!
//! * [`ClientError`]: everything else: a failed HTTP call, a job the backend
//!   reported as failed, a command issued in the wrong lifecycle state.
//!   Returned as `Err(ClientError)` from controller and gateway calls.
//!
//! Nothing here is fatal to the process. Every variant leaves the controller
//! in a state from which the caller can retry the upload, retry the
//! conversion, or start over.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the handwriting-client library.
#[derive(Debug, Error)]
pub enum ClientError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file was refused by the upload checks; nothing was sent.
    #[error("Upload rejected: {0}")]
    Rejected(#[from] UploadRejection),

    // ── Backend errors ────────────────────────────────────────────────────
    /// The backend answered with a non-2xx status.
    #[error("Backend returned HTTP {status}: {detail}")]
    Api { status: u16, detail: String },

    /// The request never got an HTTP answer (DNS, refused connection, reset).
    #[error("Could not reach backend at '{url}': {reason}\nIs the service running?")]
    Transport { url: String, reason: String },

    /// The request exceeded the configured timeout.
    #[error("Request to '{url}' timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    /// A 2xx response whose body did not match the expected shape.
    #[error("Unexpected response from '{url}': {reason}")]
    InvalidResponse { url: String, reason: String },

    /// The backend finished the job with status `failed`.
    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    // ── Lifecycle errors ──────────────────────────────────────────────────
    /// A controller command was issued in a state that does not allow it.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The poll task was aborted by a reset or a newer run before finishing.
    #[error("Polling was cancelled before the job reached a terminal status")]
    PollCancelled,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write a downloaded file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Whether the failure happened on the wire rather than in the backend's
    /// own logic. The poll loop skips these and keeps going.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Transport { .. } | ClientError::Timeout { .. }
        )
    }
}

/// Why a file was refused before upload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRejection {
    /// Wrong extension or missing `%PDF` header.
    #[error("'{filename}' is not a PDF file")]
    NotAPdf { filename: String },

    /// File is larger than the upload limit.
    #[error("'{filename}' is {size} bytes; the limit is {limit} bytes")]
    TooLarge {
        filename: String,
        size: u64,
        limit: u64,
    },

    /// Zero-byte file.
    #[error("'{filename}' is empty")]
    Empty { filename: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let e = ClientError::Api {
            status: 404,
            detail: "Job not found".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("404"), "got: {msg}");
        assert!(msg.contains("Job not found"), "got: {msg}");
    }

    #[test]
    fn rejection_converts_into_client_error() {
        let e: ClientError = UploadRejection::NotAPdf {
            filename: "notes.docx".into(),
        }
        .into();
        assert!(matches!(e, ClientError::Rejected(_)));
        assert!(e.to_string().contains("notes.docx"));
    }

    #[test]
    fn too_large_display() {
        let e = UploadRejection::TooLarge {
            filename: "big.pdf".into(),
            size: 60,
            limit: 50,
        };
        assert!(e.to_string().contains("limit is 50"));
    }

    #[test]
    fn transient_classification() {
        assert!(ClientError::Transport {
            url: "http://x".into(),
            reason: "refused".into()
        }
        .is_transient());
        assert!(ClientError::Timeout {
            url: "http://x".into(),
            secs: 30
        }
        .is_transient());
        assert!(!ClientError::Api {
            status: 500,
            detail: "boom".into()
        }
        .is_transient());
    }

    #[test]
    fn job_failed_display() {
        let e = ClientError::JobFailed {
            job_id: "abc".into(),
            message: "font render error".into(),
        };
        assert_eq!(e.to_string(), "Job abc failed: font render error");
    }
}
