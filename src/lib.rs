//! # handwriting-client
//!
//! Client for a PDF-to-handwriting rendering service: upload a typed PDF,
//! choose a handwriting font, paper, ink and imperfection level, start the
//! server-side render, follow its progress, and fetch the result.
//!
//! All rendering happens on the backend. This crate owns the part around it:
//! the job lifecycle, the state that lifecycle produces, and the HTTP calls
//! that move it forward.
//!
//! ## Lifecycle Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Check    .pdf name, %PDF header, ≤ 50 MiB (nothing sent on failure)
//!  ├─ 2. Upload   POST /upload            → job id
//!  ├─ 3. Config   merge edits into RenderConfig (no state change)
//!  ├─ 4. Start    POST /process/{job_id}  → ack
//!  ├─ 5. Poll     GET  /status/{job_id}   every 1 s until completed | failed
//!  └─ 6. Result   GET  /download/{job_id}?format=…  /  GET /preview/{job_id}/{page}
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use handwriting_client::{convert, ClientConfig, HandwritingStyle, PaperType, RenderConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientConfig::builder()
//!         .base_url("http://localhost:8000")
//!         .build()?;
//!     let render = RenderConfig {
//!         handwriting_style: HandwritingStyle::IndieFlower,
//!         paper_type: PaperType::Graph,
//!         ..RenderConfig::default()
//!     };
//!     let job = convert("lecture.pdf", &render, &client, None).await?;
//!     println!("job {:?}: {} pages", job.job_id, job.num_pages());
//!     Ok(())
//! }
//! ```
//!
//! For step-by-step control (edit the config between runs, regenerate, start
//! over) drive a [`JobController`] directly.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `handwrite` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! handwriting-client = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod gateway;
pub mod progress;
pub mod response;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ClientConfig, ClientConfigBuilder, ExportFormat, HandwritingStyle, InkColor, PaperType,
    RenderConfig, RenderConfigPatch,
};
pub use controller::{check_upload, JobController};
pub use convert::{convert, convert_to_file, ConversionOutput};
pub use error::{ClientError, UploadRejection};
pub use gateway::{Gateway, HttpGateway};
pub use progress::{JobObserver, NoopObserver, SharedObserver};
pub use response::{
    JobList, JobSummary, ProcessResponse, RemoteStatus, StatusResponse, UploadResponse,
};
pub use store::{JobSnapshot, Notice, PollOutcome, ProcessingStatus, SelectedFile, Store, UploadStatus};
