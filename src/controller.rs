//! Job lifecycle controller: upload → configure → start → poll → terminal.
//!
//! ## State machine
//!
//! The controller moves the pair `(upload_status, processing_status)` through:
//!
//! ```text
//! (idle, idle) ──select_file──▶ (uploading, idle) ──ok──▶ (success, idle)
//!      ▲                               │                        │ convert
//!      │                              err                       ▼
//!      │                               ▼              (success, processing) ◀─┐
//!      │                        (error, idle)           │ poll every 1 s      │
//!      │                          retry: select_file    ▼                     │ regenerate
//!      └──────start_over────── (success, completed | failed) ─────────────────┘
//! ```
//!
//! ## Polling
//!
//! Each `convert` spawns one poll task bound to the job id and to the run
//! generation handed out by the store. The task sleeps the poll interval,
//! issues a single `get_status`, applies it, and repeats. Only one request is
//! ever in flight. A failed poll is logged and skipped. The first `completed`
//! or `failed` response ends the task. There is no timeout: a job that never
//! reaches a terminal status is polled until the caller resets.
//!
//! Starting a new run, uploading a new file, or calling `start_over` aborts
//! the current task. A response that was already in flight at that moment
//! carries the old generation and is dropped by the store.

use crate::config::{ClientConfig, RenderConfig, RenderConfigPatch};
use crate::error::{ClientError, UploadRejection};
use crate::gateway::Gateway;
use crate::progress::{NoopObserver, SharedObserver};
use crate::response::{ProcessResponse, UploadResponse};
use crate::store::{JobSnapshot, PollOutcome, SelectedFile, Store, UploadStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Drives one job at a time against a [`Gateway`].
pub struct JobController {
    gateway: Arc<dyn Gateway>,
    store: Arc<Mutex<Store>>,
    observer: SharedObserver,
    poll_interval: Duration,
    max_upload_bytes: u64,
    poll: Mutex<Option<PollTask>>,
}

/// The running poll task. `handle` is taken by [`JobController::wait`];
/// `abort` stays behind so the task can still be cancelled while awaited.
struct PollTask {
    job_id: String,
    generation: u64,
    handle: Option<JoinHandle<()>>,
    abort: AbortHandle,
}

impl JobController {
    pub fn new(gateway: Arc<dyn Gateway>, config: &ClientConfig) -> Self {
        Self {
            gateway,
            store: Arc::new(Mutex::new(Store::new())),
            observer: Arc::new(NoopObserver),
            poll_interval: config.poll_interval(),
            max_upload_bytes: config.max_upload_bytes,
            poll: Mutex::new(None),
        }
    }

    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub async fn snapshot(&self) -> JobSnapshot {
        self.store.lock().await.snapshot()
    }

    pub async fn config(&self) -> RenderConfig {
        self.store.lock().await.config().clone()
    }

    /// Text of the rejection notice, while its 2-second window lasts.
    pub async fn active_notice(&self) -> Option<String> {
        self.store
            .lock()
            .await
            .active_notice(Instant::now())
            .map(|n| n.message.clone())
    }

    // ── Upload ───────────────────────────────────────────────────────────

    /// Read a PDF from disk and upload it.
    ///
    /// Extension and size are checked from metadata before the file is read,
    /// so an oversized file is refused without loading it.
    pub async fn select_file(&self, path: impl AsRef<Path>) -> Result<UploadResponse, ClientError> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| map_read_error(path, e))?;
        if let Err(rejection) =
            check_upload(&filename, metadata.len(), None, self.max_upload_bytes)
        {
            return Err(self.reject(rejection).await);
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| map_read_error(path, e))?;
        self.upload_bytes(&filename, bytes).await
    }

    /// Upload an in-memory PDF, replacing whatever job was tracked before.
    pub async fn upload_bytes(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, ClientError> {
        let size = bytes.len() as u64;
        if let Err(rejection) = check_upload(filename, size, Some(&bytes), self.max_upload_bytes) {
            return Err(self.reject(rejection).await);
        }

        self.cancel_poll().await;
        let generation = self.store.lock().await.begin_upload(SelectedFile {
            filename: filename.to_string(),
            size,
        });
        self.observer.on_upload_start(filename, size);

        match self.gateway.upload(filename, bytes).await {
            Ok(response) => {
                let applied = self
                    .store
                    .lock()
                    .await
                    .apply_upload_success(generation, &response);
                if applied {
                    info!("Uploaded '{}' as job {}", filename, response.job_id);
                    self.observer
                        .on_upload_complete(&response.job_id, response.pages);
                }
                Ok(response)
            }
            Err(e) => {
                let message = e.to_string();
                if self
                    .store
                    .lock()
                    .await
                    .apply_upload_failure(generation, message.clone())
                {
                    warn!("Upload of '{}' failed: {}", filename, message);
                    self.observer.on_upload_error(&message);
                }
                Err(e)
            }
        }
    }

    /// Pick up a job already uploaded to the backend, so it can be converted
    /// again without re-sending the PDF.
    pub async fn attach(&self, job_id: &str) {
        self.cancel_poll().await;
        self.store.lock().await.attach(job_id);
        info!("Attached to job {}", job_id);
    }

    // ── Configure ────────────────────────────────────────────────────────

    /// Merge a partial edit into the render config. Does not change the
    /// lifecycle state.
    pub async fn update_config(&self, patch: RenderConfigPatch) {
        self.store.lock().await.set_config(patch);
    }

    // ── Process ──────────────────────────────────────────────────────────

    /// Start rendering the uploaded job with the current config and begin
    /// polling.
    ///
    /// If `start_over` runs while the start request is in flight, no poller
    /// is spawned and [`ClientError::PollCancelled`] is returned.
    pub async fn convert(&self) -> Result<ProcessResponse, ClientError> {
        self.cancel_poll().await;

        let (job_id, config, generation) = {
            let mut store = self.store.lock().await;
            let snapshot = store.snapshot();
            if snapshot.upload_status != UploadStatus::Success {
                return Err(ClientError::InvalidState(
                    "upload a PDF before converting".into(),
                ));
            }
            let job_id = snapshot.job_id.ok_or_else(|| {
                ClientError::InvalidState("no job id recorded for the upload".into())
            })?;
            let config = store.config().clone();
            let generation = store.begin_processing();
            (job_id, config, generation)
        };

        info!("Starting job {} ({:?})", job_id, config.handwriting_style);
        match self.gateway.start_processing(&job_id, &config).await {
            Ok(ack) => {
                // Held across the spawn so a concurrent start_over either
                // sees the new task or bumps the generation first.
                let store = self.store.lock().await;
                if store.generation() != generation {
                    debug!("Job {}: reset while starting, not polling", job_id);
                    return Err(ClientError::PollCancelled);
                }
                self.observer.on_processing_start(&job_id);
                self.spawn_poll(job_id, generation).await;
                drop(store);
                Ok(ack)
            }
            Err(e) => {
                let message = e.to_string();
                if self
                    .store
                    .lock()
                    .await
                    .apply_start_failure(generation, message.clone())
                {
                    warn!("Job {} failed to start: {}", job_id, message);
                    self.observer.on_failed(&job_id, &message);
                }
                Err(e)
            }
        }
    }

    /// Re-run a finished job (completed or failed) with the config as it is
    /// now, keeping the same job id.
    pub async fn regenerate(&self) -> Result<ProcessResponse, ClientError> {
        let status = self.store.lock().await.snapshot().processing_status;
        if !status.is_terminal() {
            return Err(ClientError::InvalidState(format!(
                "regenerate needs a completed or failed job, current status is {status:?}"
            )));
        }
        self.convert().await
    }

    /// Wait until the running poll task stops and return the final state.
    ///
    /// Returns [`ClientError::PollCancelled`] if the task is aborted by
    /// `start_over` or a newer run before it sees a terminal status. A run
    /// can be awaited by one caller only; a second `wait` while the first is
    /// pending returns [`ClientError::InvalidState`].
    pub async fn wait(&self) -> Result<JobSnapshot, ClientError> {
        let (handle, awaited_elsewhere) = {
            let mut poll = self.poll.lock().await;
            match poll.as_mut() {
                Some(task) => match task.handle.take() {
                    Some(handle) => (Some(handle), false),
                    None => (None, !task.abort.is_finished()),
                },
                None => (None, false),
            }
        };

        if awaited_elsewhere {
            return Err(ClientError::InvalidState(
                "this conversion is already being awaited by another caller".into(),
            ));
        }

        let Some(handle) = handle else {
            let snapshot = self.snapshot().await;
            if snapshot.processing_status.is_terminal() {
                return Ok(snapshot);
            }
            return Err(ClientError::InvalidState(
                "no conversion is being polled".into(),
            ));
        };

        match handle.await {
            Ok(()) => Ok(self.snapshot().await),
            Err(e) if e.is_cancelled() => Err(ClientError::PollCancelled),
            Err(e) => Err(ClientError::Internal(format!("poll task panicked: {e}"))),
        }
    }

    /// Whether a poll task is currently running.
    pub async fn is_polling(&self) -> bool {
        self.poll
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.abort.is_finished())
    }

    // ── Reset ────────────────────────────────────────────────────────────

    /// Forget the current job and restore default settings.
    ///
    /// Callers are expected to have confirmed this with the user. The job is
    /// not deleted on the backend.
    pub async fn start_over(&self) {
        self.store.lock().await.apply_reset();
        self.cancel_poll().await;
        info!("State reset");
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    async fn reject(&self, rejection: UploadRejection) -> ClientError {
        self.store
            .lock()
            .await
            .reject_file(&rejection, Instant::now());
        let message = rejection.to_string();
        debug!("Rejected file: {}", message);
        self.observer.on_notice(&message);
        ClientError::Rejected(rejection)
    }

    async fn spawn_poll(&self, job_id: String, generation: u64) {
        let handle = tokio::spawn(poll_until_terminal(
            Arc::clone(&self.gateway),
            Arc::clone(&self.store),
            Arc::clone(&self.observer),
            job_id.clone(),
            generation,
            self.poll_interval,
        ));
        let abort = handle.abort_handle();

        let previous = self.poll.lock().await.replace(PollTask {
            job_id,
            generation,
            handle: Some(handle),
            abort,
        });
        if let Some(previous) = previous {
            previous.abort.abort();
        }
    }

    async fn cancel_poll(&self) {
        if let Some(task) = self.poll.lock().await.take() {
            if !task.abort.is_finished() {
                debug!(
                    "Cancelling poll for job {} (run {})",
                    task.job_id, task.generation
                );
            }
            task.abort.abort();
        }
    }
}

/// The poll loop for one run. Exits on the first terminal or stale result.
async fn poll_until_terminal(
    gateway: Arc<dyn Gateway>,
    store: Arc<Mutex<Store>>,
    observer: SharedObserver,
    job_id: String,
    generation: u64,
    interval: Duration,
) {
    let mut attempt: u64 = 0;
    loop {
        tokio::time::sleep(interval).await;
        attempt += 1;

        let status = match gateway.get_status(&job_id).await {
            Ok(status) => status,
            Err(e) if e.is_transient() => {
                warn!("Job {}: poll {} unreachable, retrying: {}", job_id, attempt, e);
                continue;
            }
            Err(e) => {
                warn!("Job {}: poll {} rejected, retrying: {}", job_id, attempt, e);
                continue;
            }
        };

        let (outcome, snapshot) = {
            let mut store = store.lock().await;
            let outcome = store.apply_poll_result(generation, &status);
            (outcome, store.snapshot())
        };

        match outcome {
            PollOutcome::Stale => {
                debug!("Job {}: run {} superseded, stopping poll", job_id, generation);
                return;
            }
            PollOutcome::Progress => {
                debug!(
                    "Job {}: {}% {}",
                    job_id, snapshot.progress, snapshot.current_stage
                );
                observer.on_progress(&snapshot);
            }
            PollOutcome::Completed { num_pages } => {
                observer.on_progress(&snapshot);
                info!("Job {} completed: {} pages after {} polls", job_id, num_pages, attempt);
                observer.on_completed(&job_id, num_pages);
                return;
            }
            PollOutcome::Failed { message } => {
                observer.on_progress(&snapshot);
                warn!("Job {} failed: {}", job_id, message);
                observer.on_failed(&job_id, &message);
                return;
            }
        }
    }
}

/// Checks applied before any bytes are sent: `.pdf` name, non-empty, within
/// `limit`, and (when the content is at hand) a `%PDF` header.
pub fn check_upload(
    filename: &str,
    size: u64,
    content: Option<&[u8]>,
    limit: u64,
) -> Result<(), UploadRejection> {
    if !filename.to_ascii_lowercase().ends_with(".pdf") {
        return Err(UploadRejection::NotAPdf {
            filename: filename.to_string(),
        });
    }
    if size == 0 {
        return Err(UploadRejection::Empty {
            filename: filename.to_string(),
        });
    }
    if size > limit {
        return Err(UploadRejection::TooLarge {
            filename: filename.to_string(),
            size,
            limit,
        });
    }
    if let Some(content) = content {
        if !content.starts_with(b"%PDF") {
            return Err(UploadRejection::NotAPdf {
                filename: filename.to_string(),
            });
        }
    }
    Ok(())
}

fn map_read_error(path: &Path, e: std::io::Error) -> ClientError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => ClientError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ClientError::FileNotFound {
            path: path.to_path_buf(),
        },
    }
}
