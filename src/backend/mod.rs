//! The gallery server contract.
//!
//! `GalleryBackend` is the only seam between orchestration and the network:
//! `HttpBackend` speaks the real HTTP API, `MockBackend` is a scriptable
//! stand-in that records every call in order.

pub mod http;
pub mod mock;

use std::future::Future;

pub use http::HttpBackend;
pub use mock::{BackendCall, MockBackend};

use crate::error::BackendError;
use crate::models::{GalleryImage, TransmitUnit, UploadResponse};

pub trait GalleryBackend: Send + Sync {
    /// `POST /api/upload` with a single file in the `files` field.
    fn upload(
        &self,
        unit: TransmitUnit,
    ) -> impl Future<Output = Result<UploadResponse, BackendError>> + Send;

    /// `GET /api/images`: every stored image, unranked.
    fn list_images(&self) -> impl Future<Output = Result<Vec<GalleryImage>, BackendError>> + Send;

    /// `GET /api/search?q=...`: ranked matches, best first.
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<GalleryImage>, BackendError>> + Send;

    /// `DELETE /api/images/{id}`.
    fn delete_image(&self, id: &str) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// `POST /api/clear`. Returns the server's `success` flag.
    fn clear_all(&self) -> impl Future<Output = Result<bool, BackendError>> + Send;
}
