//! Error taxonomy for the gallery client.
//!
//! `BackendError` describes what went wrong on the wire. `GalleryError` is
//! what orchestration boundaries report: every variant ends up as a
//! user-visible notification, none of them is fatal.

use thiserror::Error;

/// Failure talking to the gallery server.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Cannot connect to gallery server at {0}")]
    Connection(String),

    #[error("Gallery server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response from gallery server: {0}")]
    ResponseParsing(String),

    #[error("HTTP client error: {0}")]
    Http(String),
}

impl BackendError {
    /// Build from a `reqwest` error, distinguishing connect failures and timeouts.
    pub fn from_reqwest(err: reqwest::Error, base_url: &str) -> Self {
        if err.is_connect() {
            Self::Connection(base_url.to_string())
        } else if err.is_timeout() {
            Self::Http("Request timed out".into())
        } else if err.is_decode() {
            Self::ResponseParsing(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum GalleryError {
    /// Nothing in the selection is an image.
    #[error("No valid image files selected")]
    NoValidFiles,

    #[error("Image encoding failed: {0}")]
    Encoding(String),

    #[error("Transport error: {0}")]
    Transport(#[from] BackendError),

    #[error("{failed} of {total} files failed to upload")]
    PartialBatchFailure { failed: usize, total: usize },

    #[error("File too large: {size_mb:.1}MB exceeds {max_mb}MB limit")]
    FileTooLarge { size_mb: f64, max_mb: u64 },

    #[error("Could not read file: {0}")]
    FileRead(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl From<image::ImageError> for GalleryError {
    fn from(err: image::ImageError) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<tokio::task::JoinError> for GalleryError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Unexpected(err.to_string())
    }
}
