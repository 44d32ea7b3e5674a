use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde::Deserialize;

use super::GalleryBackend;
use crate::config::ClientConfig;
use crate::error::{BackendError, GalleryError};
use crate::models::{GalleryImage, TransmitUnit, UploadResponse};

/// Multipart field the server reads uploads from.
const UPLOAD_FIELD: &str = "files";

/// HTTP client for the gallery server.
pub struct HttpBackend {
    base_url: Url,
    client: reqwest::Client,
}

/// Response body from `GET /api/images`
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    images: Vec<GalleryImage>,
}

/// Response body from `GET /api/search`
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<GalleryImage>,
}

/// Response body from `POST /api/clear`
#[derive(Debug, Deserialize)]
struct ClearResponse {
    #[serde(default)]
    success: bool,
}

/// Error body the server sends with non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self, GalleryError> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GalleryError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: config.server_url.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.base_url
            .join(path)
            .map_err(|e| BackendError::Http(format!("Invalid endpoint {path}: {e}")))
    }

    fn transport_error(&self, err: reqwest::Error) -> BackendError {
        BackendError::from_reqwest(err, self.base_url.as_str())
    }

    /// Pass success responses through; turn anything else into `BackendError::Status`.
    async fn check_status(&self, response: Response) -> Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&raw)
            .map(|b| b.error)
            .unwrap_or(raw);
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let response = self.check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::ResponseParsing(e.to_string()))
    }
}

impl GalleryBackend for HttpBackend {
    async fn upload(&self, unit: TransmitUnit) -> Result<UploadResponse, BackendError> {
        let url = self.endpoint("api/upload")?;
        let part = Part::bytes(unit.bytes)
            .file_name(unit.file_name)
            .mime_str(&unit.media_type)
            .map_err(|e| BackendError::Http(format!("Invalid media type: {e}")))?;
        let form = Form::new().part(UPLOAD_FIELD, part);

        self.fetch_json(self.client.post(url).multipart(form)).await
    }

    async fn list_images(&self) -> Result<Vec<GalleryImage>, BackendError> {
        let url = self.endpoint("api/images")?;
        let parsed: ListResponse = self.fetch_json(self.client.get(url)).await?;
        Ok(parsed.images)
    }

    async fn search(&self, query: &str) -> Result<Vec<GalleryImage>, BackendError> {
        let url = self.endpoint("api/search")?;
        let parsed: SearchResponse = self
            .fetch_json(self.client.get(url).query(&[("q", query)]))
            .await?;
        Ok(parsed.results)
    }

    async fn delete_image(&self, id: &str) -> Result<(), BackendError> {
        let mut url = self.endpoint("api/images/")?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Http("Server URL cannot take a path".into()))?
            .pop_if_empty()
            .push(id);

        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.check_status(response).await?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<bool, BackendError> {
        let url = self.endpoint("api/clear")?;
        let parsed: ClearResponse = self.fetch_json(self.client.post(url)).await?;
        Ok(parsed.success)
    }
}
