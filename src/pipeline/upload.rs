//! Sequential batch upload with a gallery refresh after every accepted file.
//!
//! Files go out one request at a time, in the order given. As soon as the
//! server accepts a file the listing is re-fetched, so images appear one by
//! one while the rest of the batch is still in flight. A failed file is
//! recorded and the batch moves on; only an unexpected failure (a crashed
//! encode task) stops the remaining files.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::preprocess::{DownsamplePreprocessor, ImagePreprocessor};
use super::search::SearchController;
use crate::backend::GalleryBackend;
use crate::config::MAX_UPLOAD_BYTES;
use crate::error::GalleryError;
use crate::events::{EventSink, GalleryEvent, UploadProgress};
use crate::models::{SourceFile, TransmitUnit, UploadErrorDescriptor, UploadResponse};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Result of one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOutcome {
    /// Files the server stored.
    pub accepted: usize,
    /// Image files in the batch after filtering.
    pub total: usize,
    /// Per-file failures, in batch order.
    pub errors: Vec<UploadErrorDescriptor>,
    /// The batch stopped early on an unexpected failure.
    pub aborted: bool,
}

impl UploadOutcome {
    pub fn failed(&self) -> usize {
        self.total - self.accepted
    }

    pub fn is_complete(&self) -> bool {
        !self.aborted && self.accepted == self.total
    }
}

pub struct UploadOrchestrator<B: GalleryBackend, P: ImagePreprocessor = DownsamplePreprocessor> {
    backend: Arc<B>,
    preprocessor: Arc<P>,
    search: Arc<SearchController<B>>,
    events: EventSink,
    max_upload_bytes: u64,
    batch_lock: Mutex<()>,
}

impl<B, P> UploadOrchestrator<B, P>
where
    B: GalleryBackend,
    P: ImagePreprocessor + 'static,
{
    pub fn new(
        backend: Arc<B>,
        preprocessor: P,
        search: Arc<SearchController<B>>,
        events: EventSink,
    ) -> Self {
        Self {
            backend,
            preprocessor: Arc::new(preprocessor),
            search,
            events,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            batch_lock: Mutex::new(()),
        }
    }

    pub fn with_max_upload_bytes(mut self, max: u64) -> Self {
        self.max_upload_bytes = max;
        self
    }

    /// Upload every image in `files`, one at a time.
    ///
    /// Non-image entries are dropped up front; if nothing is left this
    /// returns `NoValidFiles` without touching the network. Batches started
    /// while another is running wait for it to finish.
    pub async fn upload_batch(&self, files: Vec<SourceFile>) -> Result<UploadOutcome, GalleryError> {
        let _batch = self.batch_lock.lock().await;

        let picked = files.len();
        let images: Vec<SourceFile> = files
            .into_iter()
            .filter(|f| {
                let keep = f.is_image();
                if !keep {
                    debug!(file = %f.name, media_type = %f.media_type, "Skipping non-image file");
                } else if !f.has_allowed_extension() {
                    warn!(file = %f.name, "Extension not on the server allow-list; it may be rejected");
                }
                keep
            })
            .collect();

        if images.is_empty() {
            warn!(picked, "No image files in selection");
            let err = GalleryError::NoValidFiles;
            self.events.error(err.to_string());
            return Err(err);
        }

        let mut outcome = UploadOutcome {
            total: images.len(),
            ..UploadOutcome::default()
        };
        info!(total = outcome.total, skipped = picked - outcome.total, "Starting upload batch");

        let mut abort_reason = None;
        for (i, file) in images.into_iter().enumerate() {
            self.events.emit(GalleryEvent::UploadProgress(UploadProgress::new(
                i,
                outcome.total,
                &file.name,
            )));
            let name = file.name.clone();

            match self.upload_one(file).await {
                Ok(response) if response.accepted() > 0 => {
                    outcome.accepted += 1;
                    outcome.errors.extend(response.errors);
                    info!(file = %name, accepted = outcome.accepted, "Upload accepted");
                    // A failed refresh has already notified; keep going.
                    self.search.refresh().await;
                }
                Ok(response) => {
                    warn!(file = %name, "Upload not accepted");
                    if response.errors.is_empty() {
                        outcome
                            .errors
                            .push(UploadErrorDescriptor::new(&name, "Not accepted by server"));
                    } else {
                        outcome.errors.extend(response.errors);
                    }
                }
                Err(GalleryError::Unexpected(reason)) => {
                    error!(file = %name, reason = %reason, "Upload batch aborted");
                    outcome
                        .errors
                        .push(UploadErrorDescriptor::new(&name, reason.clone()));
                    outcome.aborted = true;
                    abort_reason = Some(reason);
                    break;
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "Upload failed");
                    outcome
                        .errors
                        .push(UploadErrorDescriptor::new(&name, e.to_string()));
                }
            }
        }

        self.report(&outcome, abort_reason.as_deref());
        Ok(outcome)
    }

    async fn upload_one(&self, file: SourceFile) -> Result<UploadResponse, GalleryError> {
        let unit = self.prepare(file).await?;
        if unit.size() > self.max_upload_bytes {
            return Err(GalleryError::FileTooLarge {
                size_mb: unit.size() as f64 / BYTES_PER_MB,
                max_mb: self.max_upload_bytes / (1024 * 1024),
            });
        }
        Ok(self.backend.upload(unit).await?)
    }

    /// Decoding and re-encoding is CPU-bound; keep it off the async workers.
    async fn prepare(&self, file: SourceFile) -> Result<TransmitUnit, GalleryError> {
        let preprocessor = Arc::clone(&self.preprocessor);
        tokio::task::spawn_blocking(move || preprocessor.prepare(file)).await?
    }

    fn report(&self, outcome: &UploadOutcome, abort_reason: Option<&str>) {
        if outcome.accepted > 0 {
            let noun = if outcome.accepted == 1 { "image" } else { "images" };
            self.events
                .success(format!("Successfully uploaded {} {noun}", outcome.accepted));
        }

        if let Some(reason) = abort_reason {
            self.events.error(format!("Upload failed: {reason}"));
        } else if outcome.failed() > 0 {
            let err = GalleryError::PartialBatchFailure {
                failed: outcome.failed(),
                total: outcome.total,
            };
            self.events.error(err.to_string());
        }

        info!(
            accepted = outcome.accepted,
            failed = outcome.failed(),
            aborted = outcome.aborted,
            "Upload batch finished"
        );
    }
}
