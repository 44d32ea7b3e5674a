use std::fmt;

use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Body of `POST /api/upload`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub uploaded: Vec<UploadedImage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<UploadErrorDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_images: Option<u64>,
}

impl UploadResponse {
    pub fn accepted(&self) -> usize {
        self.uploaded.len()
    }
}

/// One accepted upload: either a bare id or the stored record summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadedImage {
    Id(String),
    Record {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        original_filename: Option<String>,
    },
}

impl UploadedImage {
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Record { id, .. } => id,
        }
    }
}

/// Why one file was not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawUploadError")]
pub struct UploadErrorDescriptor {
    pub filename: String,
    pub error: String,
}

impl UploadErrorDescriptor {
    pub fn new(filename: &str, error: impl Into<String>) -> Self {
        Self {
            filename: filename.to_string(),
            error: error.into(),
        }
    }
}

impl fmt::Display for UploadErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filename.is_empty() {
            f.write_str(&self.error)
        } else {
            write!(f, "{}: {}", self.filename, self.error)
        }
    }
}

/// Servers report errors either as `{filename, error}` objects or plain strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawUploadError {
    Message(String),
    Detailed {
        #[serde(default, deserialize_with = "null_as_default")]
        filename: String,
        #[serde(default, alias = "message", deserialize_with = "null_as_default")]
        error: String,
    },
}

impl From<RawUploadError> for UploadErrorDescriptor {
    fn from(raw: RawUploadError) -> Self {
        match raw {
            RawUploadError::Message(error) => Self {
                filename: String::new(),
                error,
            },
            RawUploadError::Detailed { filename, error } => Self { filename, error },
        }
    }
}
