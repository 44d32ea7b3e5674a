use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::GalleryBackend;
use crate::error::BackendError;
use crate::models::{
    GalleryImage, OcrStatus, TransmitUnit, UploadErrorDescriptor, UploadResponse, UploadedImage,
};

/// One request as seen by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Upload(String),
    List,
    Search(String),
    Delete(String),
    Clear,
}

#[derive(Default)]
struct MockState {
    images: Vec<GalleryImage>,
    search_results: HashMap<String, Vec<GalleryImage>>,
    search_delays: HashMap<String, Duration>,
    failing_uploads: Vec<String>,
    rejected_uploads: HashMap<String, String>,
    offline: bool,
    clear_succeeds: bool,
    next_id: u32,
    calls: Vec<BackendCall>,
}

/// In-memory gallery server for tests and offline hosts.
///
/// Accepted uploads are appended to the listing, so refreshes observe them.
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                clear_succeeds: true,
                ..MockState::default()
            }),
        }
    }

    pub fn with_images(self, images: Vec<GalleryImage>) -> Self {
        self.with_state(|s| s.images = images)
    }

    /// Ranked results returned for exactly this query string.
    pub fn with_search_results(self, query: &str, results: Vec<GalleryImage>) -> Self {
        self.with_state(|s| {
            s.search_results.insert(query.to_string(), results);
        })
    }

    /// Hold the response for this query for `delay`.
    pub fn with_search_delay(self, query: &str, delay: Duration) -> Self {
        self.with_state(|s| {
            s.search_delays.insert(query.to_string(), delay);
        })
    }

    /// Uploads of this file name fail with HTTP 500.
    pub fn failing_upload(self, file_name: &str) -> Self {
        self.with_state(|s| s.failing_uploads.push(file_name.to_string()))
    }

    /// Uploads of this file name succeed at HTTP level but are rejected per-file.
    pub fn rejecting_upload(self, file_name: &str, reason: &str) -> Self {
        self.with_state(|s| {
            s.rejected_uploads
                .insert(file_name.to_string(), reason.to_string());
        })
    }

    /// `POST /api/clear` answers `{success: false}`.
    pub fn refusing_clear(self) -> Self {
        self.with_state(|s| s.clear_succeeds = false)
    }

    /// While offline every call fails with a connection error.
    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.offline = offline;
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.state
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    pub fn stored_images(&self) -> Vec<GalleryImage> {
        self.state
            .lock()
            .map(|s| s.images.clone())
            .unwrap_or_default()
    }

    fn with_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
        self
    }

    /// Record the call and run `f` against the state, or fail if offline.
    fn record<T>(
        &self,
        call: BackendCall,
        f: impl FnOnce(&mut MockState) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BackendError::Http("mock state poisoned".into()))?;
        state.calls.push(call);
        if state.offline {
            return Err(BackendError::Connection("mock://offline".into()));
        }
        f(&mut state)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl GalleryBackend for MockBackend {
    async fn upload(&self, unit: TransmitUnit) -> Result<UploadResponse, BackendError> {
        let name = unit.file_name.clone();
        self.record(BackendCall::Upload(name.clone()), |state| {
            if state.failing_uploads.contains(&name) {
                return Err(BackendError::Status {
                    status: 500,
                    body: format!("mock failure for {name}"),
                });
            }
            if let Some(reason) = state.rejected_uploads.get(&name) {
                return Ok(UploadResponse {
                    uploaded: vec![],
                    errors: vec![UploadErrorDescriptor::new(&name, reason.clone())],
                    total_images: Some(state.images.len() as u64),
                });
            }

            state.next_id += 1;
            let id = format!("img-{}", state.next_id);
            state.images.push(GalleryImage {
                id: id.clone(),
                filename: format!("{id}.jpg"),
                original_filename: name.clone(),
                keywords: vec![],
                ocr_keywords: None,
                image_type: None,
                colors: vec![],
                ocr_status: Some(OcrStatus::Pending),
                relevance: None,
                uploaded_at: None,
            });
            Ok(UploadResponse {
                uploaded: vec![UploadedImage::Record {
                    id,
                    filename: None,
                    original_filename: Some(name.clone()),
                }],
                errors: vec![],
                total_images: Some(state.images.len() as u64),
            })
        })
    }

    async fn list_images(&self) -> Result<Vec<GalleryImage>, BackendError> {
        self.record(BackendCall::List, |state| Ok(state.images.clone()))
    }

    async fn search(&self, query: &str) -> Result<Vec<GalleryImage>, BackendError> {
        let delay = self
            .state
            .lock()
            .ok()
            .and_then(|s| s.search_delays.get(query).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.record(BackendCall::Search(query.to_string()), |state| {
            Ok(state.search_results.get(query).cloned().unwrap_or_default())
        })
    }

    async fn delete_image(&self, id: &str) -> Result<(), BackendError> {
        self.record(BackendCall::Delete(id.to_string()), |state| {
            let before = state.images.len();
            state.images.retain(|img| img.id != id);
            if state.images.len() == before {
                return Err(BackendError::Status {
                    status: 404,
                    body: "Image not found".into(),
                });
            }
            Ok(())
        })
    }

    async fn clear_all(&self) -> Result<bool, BackendError> {
        self.record(BackendCall::Clear, |state| {
            if state.clear_succeeds {
                state.images.clear();
            }
            Ok(state.clear_succeeds)
        })
    }
}
