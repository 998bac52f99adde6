//! One-shot entry points: upload, render and (optionally) download in a
//! single call.
//!
//! These wrap a fresh [`JobController`] around an [`HttpGateway`] and run the
//! whole lifecycle once. Use the controller directly when the caller needs to
//! edit settings between runs, regenerate, or start over.

use crate::config::{ClientConfig, ExportFormat, RenderConfig, RenderConfigPatch};
use crate::controller::JobController;
use crate::error::ClientError;
use crate::gateway::{Gateway, HttpGateway};
use crate::progress::SharedObserver;
use crate::store::JobSnapshot;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Result of [`convert_to_file`].
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Final job state (always `completed`).
    pub job: JobSnapshot,
    /// Where the rendered file was written.
    pub output_path: PathBuf,
    pub format: ExportFormat,
    pub bytes_written: u64,
    /// Wall-clock time from upload to finished download.
    pub total_duration_ms: u64,
}

/// Upload `input`, render it with `render`, and wait for the job to finish.
///
/// # Errors
/// - [`ClientError::Rejected`] if the file fails the pre-upload checks
/// - any gateway error from the upload or start call
/// - [`ClientError::JobFailed`] if the backend reports the job as failed
pub async fn convert(
    input: impl AsRef<Path>,
    render: &RenderConfig,
    config: &ClientConfig,
    observer: Option<SharedObserver>,
) -> Result<JobSnapshot, ClientError> {
    let gateway: Arc<dyn Gateway> = Arc::new(HttpGateway::new(config)?);
    run(gateway, input.as_ref(), render, config, observer).await
}

/// Like [`convert`], then download the result in `format` to `output_path`.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    format: ExportFormat,
    render: &RenderConfig,
    config: &ClientConfig,
    observer: Option<SharedObserver>,
) -> Result<ConversionOutput, ClientError> {
    let start = Instant::now();
    let http = Arc::new(HttpGateway::new(config)?);
    let gateway: Arc<dyn Gateway> = http.clone();

    let job = run(gateway, input.as_ref(), render, config, observer).await?;
    let job_id = job
        .job_id
        .clone()
        .ok_or_else(|| ClientError::Internal("completed job has no id".into()))?;

    let output_path = output_path.as_ref().to_path_buf();
    let bytes_written = http.download_to(&job_id, format, &output_path).await?;

    Ok(ConversionOutput {
        job,
        output_path,
        format,
        bytes_written,
        total_duration_ms: start.elapsed().as_millis() as u64,
    })
}

async fn run(
    gateway: Arc<dyn Gateway>,
    input: &Path,
    render: &RenderConfig,
    config: &ClientConfig,
    observer: Option<SharedObserver>,
) -> Result<JobSnapshot, ClientError> {
    info!("Starting conversion: {}", input.display());

    let mut controller = JobController::new(gateway, config);
    if let Some(observer) = observer {
        controller = controller.with_observer(observer);
    }

    controller.select_file(input).await?;
    controller
        .update_config(RenderConfigPatch::from(render.clone()))
        .await;
    controller.convert().await?;
    controller.wait().await?.into_result()
}

impl From<RenderConfig> for RenderConfigPatch {
    fn from(c: RenderConfig) -> Self {
        Self {
            handwriting_style: Some(c.handwriting_style),
            paper_type: Some(c.paper_type),
            imperfection_level: Some(c.imperfection_level),
            ink_color: Some(c.ink_color),
            line_spacing: Some(c.line_spacing),
            font_size: Some(c.font_size),
            enable_smudges: Some(c.enable_smudges),
            enable_coffee_stains: Some(c.enable_coffee_stains),
            enable_page_shadows: Some(c.enable_page_shadows),
            enable_annotations: Some(c.enable_annotations),
        }
    }
}
