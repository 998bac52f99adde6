//! Observer trait for job lifecycle events.
//!
//! Inject an [`Arc<dyn JobObserver>`] via
//! [`crate::controller::JobController::with_observer`] to receive events as the
//! controller uploads, starts and polls a job. The CLI uses this to drive its
//! progress bar; a GUI would repaint from the same calls.
//!
//! # Example
//!
//! ```rust
//! use handwriting_client::{JobObserver, JobSnapshot};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PollCounter {
//!     polls: AtomicUsize,
//! }
//!
//! impl JobObserver for PollCounter {
//!     fn on_progress(&self, snapshot: &JobSnapshot) {
//!         self.polls.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{:>3}%  {}", snapshot.progress, snapshot.current_stage);
//!     }
//! }
//!
//! let observer: Arc<dyn JobObserver> = Arc::new(PollCounter { polls: AtomicUsize::new(0) });
//! ```

use crate::store::JobSnapshot;
use std::sync::Arc;

/// Called by the controller at each lifecycle transition.
///
/// Calls come from whichever task performed the transition (the caller's task
/// for upload/start, the poll task for progress), so implementations must be
/// `Send + Sync`. Every method has a no-op default.
pub trait JobObserver: Send + Sync {
    /// A file was refused before upload. The notice is transient.
    fn on_notice(&self, message: &str) {
        let _ = message;
    }

    /// Upload request is about to be sent.
    fn on_upload_start(&self, filename: &str, size: u64) {
        let _ = (filename, size);
    }

    /// Backend accepted the file.
    ///
    /// # Arguments
    /// * `job_id`: identifier assigned by the backend
    /// * `pages`: page count of the source PDF (0 if the backend could not tell)
    fn on_upload_complete(&self, job_id: &str, pages: u32) {
        let _ = (job_id, pages);
    }

    fn on_upload_error(&self, error: &str) {
        let _ = error;
    }

    /// `start_processing` was acknowledged; polling begins.
    fn on_processing_start(&self, job_id: &str) {
        let _ = job_id;
    }

    /// A status response was applied. Fires for every poll, including the
    /// terminal one, after the store has been updated.
    fn on_progress(&self, snapshot: &JobSnapshot) {
        let _ = snapshot;
    }

    fn on_completed(&self, job_id: &str, num_pages: u32) {
        let _ = (job_id, num_pages);
    }

    /// Start failure or backend-reported job failure.
    fn on_failed(&self, job_id: &str, error: &str) {
        let _ = (job_id, error);
    }
}

/// The default when no observer is configured.
pub struct NoopObserver;

impl JobObserver for NoopObserver {}

/// Convenience alias for the type the controller stores.
pub type SharedObserver = Arc<dyn JobObserver>;
