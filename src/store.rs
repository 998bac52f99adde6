//! Client-side state for the one job this client tracks.
//!
//! [`Store`] is an explicit state object rather than a bag of setters: every
//! change goes through a command (`begin_upload`, `apply_poll_result`,
//! `apply_reset`, …) that updates all related fields at once. Clearing the job
//! id therefore always clears progress, page count and error text too.
//!
//! Commands that complete asynchronous work (upload, start, poll) take the
//! run *generation* returned when that work began. A reset or a newer run
//! bumps the generation, and results carrying an older one are dropped. This
//! keeps a late response for an abandoned job from landing in the state of
//! the next one.

use crate::config::{RenderConfig, RenderConfigPatch};
use crate::error::{ClientError, UploadRejection};
use crate::response::{RemoteStatus, StatusResponse, UploadResponse};
use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// How long a rejection notice stays visible.
pub const NOTICE_WINDOW: Duration = Duration::from_secs(2);

/// Error text used when the backend reports `failed` without a message.
pub const GENERIC_FAILURE: &str = "Processing failed";

/// Stage label shown between `start_processing` and the first poll.
pub const STARTING_STAGE: &str = "Starting...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingStatus {
    #[default]
    Idle,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

/// The file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedFile {
    pub filename: String,
    pub size: u64,
}

/// A short-lived message about a refused file.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub message: String,
    pub raised_at: Instant,
}

impl Notice {
    pub fn is_visible(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.raised_at) < NOTICE_WINDOW
    }
}

/// Read-only copy of the job state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: Option<String>,
    pub file: Option<SelectedFile>,
    /// Page count of the uploaded source PDF.
    pub source_pages: Option<u32>,
    pub upload_status: UploadStatus,
    pub processing_status: ProcessingStatus,
    /// 0–100; only meaningful while processing.
    pub progress: u8,
    pub current_stage: String,
    /// Page count of the rendered result, known after completion.
    pub num_pages: Option<u32>,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub notice: Option<Notice>,
}

impl JobSnapshot {
    /// Rendered page count, never less than 1 so pagination can divide by it.
    pub fn num_pages(&self) -> u32 {
        self.num_pages.unwrap_or(1).max(1)
    }

    /// `Err(JobFailed)` for a failed run, the snapshot otherwise.
    pub fn into_result(self) -> Result<JobSnapshot, ClientError> {
        if self.processing_status == ProcessingStatus::Failed {
            return Err(ClientError::JobFailed {
                job_id: self.job_id.clone().unwrap_or_default(),
                message: self
                    .error_message
                    .clone()
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string()),
            });
        }
        Ok(self)
    }
}

/// What a poll response did to the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Progress/stage updated; keep polling.
    Progress,
    /// Job finished; stop polling.
    Completed { num_pages: u32 },
    /// Job failed on the backend; stop polling.
    Failed { message: String },
    /// Response belongs to a run that is no longer current; ignored.
    Stale,
}

impl PollOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollOutcome::Progress)
    }
}

/// The single source of truth for the job and its render settings.
#[derive(Debug, Default)]
pub struct Store {
    job: JobSnapshot,
    config: RenderConfig,
    generation: u64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.job.clone()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job.job_id.as_deref()
    }

    /// The rejection notice, if it is still inside its display window.
    pub fn active_notice(&self, now: Instant) -> Option<&Notice> {
        self.job.notice.as_ref().filter(|n| n.is_visible(now))
    }

    // ── Upload ───────────────────────────────────────────────────────────

    /// Record a refused file. Upload status and job fields stay as they are.
    pub fn reject_file(&mut self, rejection: &UploadRejection, now: Instant) {
        self.job.notice = Some(Notice {
            message: rejection.to_string(),
            raised_at: now,
        });
    }

    /// Discard the previous job and mark an upload in flight.
    ///
    /// Returns the generation the upload result must be applied with.
    pub fn begin_upload(&mut self, file: SelectedFile) -> u64 {
        self.generation += 1;
        self.job = JobSnapshot {
            file: Some(file),
            upload_status: UploadStatus::Uploading,
            ..JobSnapshot::default()
        };
        self.generation
    }

    /// Returns `false` when the result was stale and ignored.
    pub fn apply_upload_success(&mut self, generation: u64, response: &UploadResponse) -> bool {
        if generation != self.generation {
            return false;
        }
        self.job.job_id = Some(response.job_id.clone());
        self.job.source_pages = Some(response.pages);
        self.job.upload_status = UploadStatus::Success;
        self.job.error_message = None;
        true
    }

    /// Returns `false` when the result was stale and ignored.
    pub fn apply_upload_failure(&mut self, generation: u64, message: impl Into<String>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.job.job_id = None;
        self.job.upload_status = UploadStatus::Error;
        self.job.error_message = Some(message.into());
        true
    }

    /// Track a job that was uploaded earlier (by this or another client).
    ///
    /// The job becomes ready to convert; no file details are known.
    pub fn attach(&mut self, job_id: impl Into<String>) -> u64 {
        self.generation += 1;
        self.job = JobSnapshot {
            job_id: Some(job_id.into()),
            upload_status: UploadStatus::Success,
            ..JobSnapshot::default()
        };
        self.generation
    }

    // ── Processing ───────────────────────────────────────────────────────

    /// Enter `processing` for the current job.
    ///
    /// Returns the generation the poller for this run is bound to.
    pub fn begin_processing(&mut self) -> u64 {
        self.generation += 1;
        self.job.processing_status = ProcessingStatus::Processing;
        self.job.progress = 0;
        self.job.current_stage = STARTING_STAGE.to_string();
        self.job.num_pages = None;
        self.job.error_message = None;
        self.generation
    }

    /// Returns `false` when the result was stale and ignored.
    pub fn apply_start_failure(&mut self, generation: u64, message: impl Into<String>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.job.processing_status = ProcessingStatus::Failed;
        self.job.error_message = Some(message.into());
        true
    }

    /// Fold one status response into the state.
    ///
    /// Progress and stage are copied on every current response, terminal or
    /// not. Responses for another generation, or arriving when no run is in
    /// progress, change nothing.
    pub fn apply_poll_result(&mut self, generation: u64, status: &StatusResponse) -> PollOutcome {
        if generation != self.generation
            || self.job.processing_status != ProcessingStatus::Processing
        {
            return PollOutcome::Stale;
        }

        self.job.progress = status.progress.min(100) as u8;
        self.job.current_stage = status.current_stage.clone();

        match status.remote_status() {
            RemoteStatus::Completed => {
                self.job.processing_status = ProcessingStatus::Completed;
                self.job.num_pages = Some(status.num_pages);
                PollOutcome::Completed {
                    num_pages: self.job.num_pages(),
                }
            }
            RemoteStatus::Failed => {
                let message = status
                    .error_message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string());
                self.job.processing_status = ProcessingStatus::Failed;
                self.job.error_message = Some(message.clone());
                PollOutcome::Failed { message }
            }
            _ => PollOutcome::Progress,
        }
    }

    // ── Config ───────────────────────────────────────────────────────────

    pub fn set_config(&mut self, patch: RenderConfigPatch) {
        self.config.merge(patch);
    }

    // ── Reset ────────────────────────────────────────────────────────────

    /// Restore job state and render config to their defaults.
    pub fn apply_reset(&mut self) {
        self.generation += 1;
        self.job = JobSnapshot::default();
        self.config = RenderConfig::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InkColor, PaperType};

    fn upload_ok(job_id: &str) -> UploadResponse {
        UploadResponse {
            job_id: job_id.into(),
            status: "uploaded".into(),
            filename: "notes.pdf".into(),
            pages: 3,
            message: None,
        }
    }

    fn status(s: &str, progress: u32, stage: &str) -> StatusResponse {
        StatusResponse {
            job_id: "job-1".into(),
            status: s.into(),
            progress,
            current_stage: stage.into(),
            num_pages: 0,
            error_message: None,
        }
    }

    fn file() -> SelectedFile {
        SelectedFile {
            filename: "notes.pdf".into(),
            size: 1024,
        }
    }

    fn uploaded_store() -> Store {
        let mut store = Store::new();
        let g = store.begin_upload(file());
        assert!(store.apply_upload_success(g, &upload_ok("job-1")));
        store
    }

    #[test]
    fn upload_success_records_job() {
        let store = uploaded_store();
        let snap = store.snapshot();
        assert_eq!(snap.job_id.as_deref(), Some("job-1"));
        assert_eq!(snap.upload_status, UploadStatus::Success);
        assert_eq!(snap.processing_status, ProcessingStatus::Idle);
        assert_eq!(snap.source_pages, Some(3));
    }

    #[test]
    fn upload_failure_records_error() {
        let mut store = Store::new();
        let g = store.begin_upload(file());
        assert_eq!(store.snapshot().upload_status, UploadStatus::Uploading);
        store.apply_upload_failure(g, "connection refused");
        let snap = store.snapshot();
        assert_eq!(snap.upload_status, UploadStatus::Error);
        assert_eq!(snap.error_message.as_deref(), Some("connection refused"));
        assert_eq!(snap.job_id, None);
    }

    #[test]
    fn new_upload_discards_previous_job() {
        let mut store = uploaded_store();
        let g = store.begin_processing();
        store.apply_poll_result(g, &status("processing", 40, "Rendering"));

        store.begin_upload(SelectedFile {
            filename: "other.pdf".into(),
            size: 10,
        });
        let snap = store.snapshot();
        assert_eq!(snap.job_id, None);
        assert_eq!(snap.progress, 0);
        assert_eq!(snap.current_stage, "");
        assert_eq!(snap.processing_status, ProcessingStatus::Idle);
        assert_eq!(snap.file.unwrap().filename, "other.pdf");
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_keeps_status_and_expires() {
        let mut store = Store::new();
        let now = Instant::now();
        store.reject_file(
            &UploadRejection::NotAPdf {
                filename: "a.txt".into(),
            },
            now,
        );
        assert_eq!(store.snapshot().upload_status, UploadStatus::Idle);
        assert!(store.active_notice(now).is_some());
        assert!(store
            .active_notice(now + Duration::from_millis(1999))
            .is_some());
        assert!(store.active_notice(now + NOTICE_WINDOW).is_none());
    }

    #[test]
    fn poll_copies_progress_and_stage() {
        let mut store = uploaded_store();
        let g = store.begin_processing();
        assert_eq!(store.snapshot().current_stage, STARTING_STAGE);

        let outcome = store.apply_poll_result(g, &status("processing", 45, "Drawing diagrams"));
        assert_eq!(outcome, PollOutcome::Progress);
        let snap = store.snapshot();
        assert_eq!(snap.progress, 45);
        assert_eq!(snap.current_stage, "Drawing diagrams");
        assert_eq!(snap.processing_status, ProcessingStatus::Processing);
    }

    #[test]
    fn completed_records_pages() {
        let mut store = uploaded_store();
        let g = store.begin_processing();
        let mut done = status("completed", 100, "Done");
        done.num_pages = 4;
        assert_eq!(
            store.apply_poll_result(g, &done),
            PollOutcome::Completed { num_pages: 4 }
        );
        let snap = store.snapshot();
        assert_eq!(snap.processing_status, ProcessingStatus::Completed);
        assert_eq!(snap.num_pages(), 4);
        assert_eq!(snap.progress, 100);
    }

    #[test]
    fn completed_with_zero_pages_reads_as_one() {
        let mut store = uploaded_store();
        let g = store.begin_processing();
        store.apply_poll_result(g, &status("completed", 100, "Done"));
        assert_eq!(store.snapshot().num_pages(), 1);
        assert_eq!(JobSnapshot::default().num_pages(), 1);
    }

    #[test]
    fn failed_uses_backend_message_or_fallback() {
        let mut store = uploaded_store();
        let g = store.begin_processing();
        let mut failed = status("failed", 30, "Rendering");
        failed.error_message = Some("font render error".into());
        store.apply_poll_result(g, &failed);
        assert_eq!(
            store.snapshot().error_message.as_deref(),
            Some("font render error")
        );

        let g = store.begin_processing();
        assert_eq!(store.snapshot().error_message, None);
        let outcome = store.apply_poll_result(g, &status("failed", 30, ""));
        assert_eq!(
            outcome,
            PollOutcome::Failed {
                message: GENERIC_FAILURE.into()
            }
        );
    }

    #[test]
    fn stale_generation_is_ignored() {
        let mut store = uploaded_store();
        let old = store.begin_processing();
        let new = store.begin_processing();
        assert_ne!(old, new);

        let outcome = store.apply_poll_result(old, &status("completed", 100, "Done"));
        assert_eq!(outcome, PollOutcome::Stale);
        assert_eq!(
            store.snapshot().processing_status,
            ProcessingStatus::Processing
        );
    }

    #[test]
    fn poll_after_reset_is_stale() {
        let mut store = uploaded_store();
        let g = store.begin_processing();
        store.apply_reset();
        assert_eq!(
            store.apply_poll_result(g, &status("processing", 50, "x")),
            PollOutcome::Stale
        );
        assert_eq!(store.snapshot(), JobSnapshot::default());
    }

    #[test]
    fn upload_result_after_reset_is_ignored() {
        let mut store = Store::new();
        let g = store.begin_upload(file());
        store.apply_reset();
        assert!(!store.apply_upload_success(g, &upload_ok("late")));
        assert_eq!(store.job_id(), None);
    }

    #[test]
    fn attach_makes_job_convertible_and_drops_old_run() {
        let mut store = uploaded_store();
        let old = store.begin_processing();
        store.attach("earlier-job");

        let snap = store.snapshot();
        assert_eq!(snap.job_id.as_deref(), Some("earlier-job"));
        assert_eq!(snap.upload_status, UploadStatus::Success);
        assert_eq!(snap.processing_status, ProcessingStatus::Idle);
        assert_eq!(snap.file, None);
        assert_eq!(
            store.apply_poll_result(old, &status("completed", 100, "Complete")),
            PollOutcome::Stale
        );
    }

    #[test]
    fn start_failure_marks_failed() {
        let mut store = uploaded_store();
        let g = store.begin_processing();
        store.apply_start_failure(g, "Backend returned HTTP 400: Job is already processing");
        let snap = store.snapshot();
        assert_eq!(snap.processing_status, ProcessingStatus::Failed);
        assert_eq!(snap.upload_status, UploadStatus::Success);
        assert!(snap.error_message.unwrap().contains("already processing"));
    }

    #[test]
    fn set_config_merges() {
        let mut store = Store::new();
        store.set_config(RenderConfigPatch {
            paper_type: Some(PaperType::Graph),
            ..Default::default()
        });
        store.set_config(RenderConfigPatch {
            ink_color: Some(InkColor::Black),
            ..Default::default()
        });
        assert_eq!(store.config().paper_type, PaperType::Graph);
        assert_eq!(store.config().ink_color, InkColor::Black);
        assert_eq!(store.config().font_size, RenderConfig::default().font_size);
    }

    #[test]
    fn reset_is_total_and_idempotent() {
        let mut store = uploaded_store();
        store.set_config(RenderConfigPatch {
            font_size: Some(30),
            ..Default::default()
        });
        let g = store.begin_processing();
        store.apply_poll_result(g, &status("processing", 70, "Compositing"));

        store.apply_reset();
        assert_eq!(store.snapshot(), JobSnapshot::default());
        assert_eq!(store.config(), &RenderConfig::default());

        store.apply_reset();
        assert_eq!(store.snapshot(), JobSnapshot::default());
        assert_eq!(store.config(), &RenderConfig::default());
    }

    #[test]
    fn failed_snapshot_into_result() {
        let snap = JobSnapshot {
            job_id: Some("j1".into()),
            processing_status: ProcessingStatus::Failed,
            error_message: Some("font render error".into()),
            ..JobSnapshot::default()
        };
        match snap.into_result() {
            Err(ClientError::JobFailed { job_id, message }) => {
                assert_eq!(job_id, "j1");
                assert_eq!(message, "font render error");
            }
            other => panic!("expected JobFailed, got {other:?}"),
        }

        let done = JobSnapshot {
            processing_status: ProcessingStatus::Completed,
            ..JobSnapshot::default()
        };
        assert!(done.into_result().is_ok());
    }
}
