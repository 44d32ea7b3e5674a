use serde::{Deserialize, Serialize};

use super::null_as_default;

/// Server-reported progress of text extraction for one image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OcrStatus {
    None,
    Pending,
    Running,
    Done,
    Skipped,
    Failed,
}

impl OcrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Text extraction has not finished yet.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }
}

impl From<String> for OcrStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "done" => Self::Done,
            "skipped" => Self::Skipped,
            "failed" => Self::Failed,
            "none" | "" => Self::None,
            other => {
                tracing::debug!(status = other, "Unknown OCR status, treating as none");
                Self::None
            }
        }
    }
}

impl From<OcrStatus> for String {
    fn from(value: OcrStatus) -> Self {
        value.as_str().to_string()
    }
}

/// One stored image and the metadata the server derived for it.
///
/// Snapshots are never patched locally: a fresh fetch replaces them wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub id: String,
    pub filename: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub original_filename: String,
    /// Visual keywords from the recognition pass.
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
    /// Keywords derived from extracted text; only present once OCR finished.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
    /// Dominant colour labels, most dominant first.
    #[serde(default, deserialize_with = "null_as_default")]
    pub colors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_status: Option<OcrStatus>,
    /// Backend rank; only meaningful for query-scoped results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
}

impl GalleryImage {
    /// Visual keywords followed by OCR keywords, first occurrence wins
    /// (case-insensitive).
    pub fn effective_keywords(&self) -> Vec<&str> {
        let ocr = self.ocr_keywords.as_deref().unwrap_or_default();
        let mut seen: Vec<String> = Vec::with_capacity(self.keywords.len() + ocr.len());
        let mut merged = Vec::with_capacity(self.keywords.len() + ocr.len());

        for keyword in self.keywords.iter().chain(ocr.iter()) {
            let trimmed = keyword.trim();
            if trimmed.is_empty() {
                continue;
            }
            let folded = trimmed.to_lowercase();
            if seen.contains(&folded) {
                continue;
            }
            seen.push(folded);
            merged.push(trimmed);
        }
        merged
    }

    /// True while the server is still reading text from this image.
    pub fn is_processing(&self) -> bool {
        self.ocr_status.is_some_and(|s| s.is_in_progress())
    }

    /// Name to show for this image: the uploader's filename, or the stored one.
    pub fn display_name(&self) -> &str {
        if self.original_filename.trim().is_empty() {
            &self.filename
        } else {
            &self.original_filename
        }
    }
}

#[cfg(test)]
pub(crate) fn sample_image(id: &str) -> GalleryImage {
    GalleryImage {
        id: id.to_string(),
        filename: format!("{id}.jpg"),
        original_filename: format!("photo_{id}.jpg"),
        keywords: vec!["receipt".into(), "paper".into(), "text".into()],
        ocr_keywords: None,
        image_type: Some("document".into()),
        colors: vec!["white".into(), "gray".into(), "black".into()],
        ocr_status: Some(OcrStatus::Done),
        relevance: None,
        uploaded_at: None,
    }
}
