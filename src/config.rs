use std::time::Duration;

use reqwest::Url;

use crate::error::GalleryError;
use crate::pipeline::preprocess::PreprocessConfig;

/// Application-level constants
pub const APP_NAME: &str = "Picseek";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Gallery server the client talks to when nothing else is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Env var overriding the gallery server base URL.
pub const SERVER_URL_ENV: &str = "PICSEEK_SERVER_URL";

/// Env var setting a whole-request timeout in seconds (unset = transport default).
pub const TIMEOUT_ENV: &str = "PICSEEK_TIMEOUT_SECS";

/// Files below this size are transmitted untouched.
pub const PASSTHROUGH_BELOW_BYTES: u64 = 500 * 1024;

/// Longest edge, in pixels, of any re-encoded image.
pub const MAX_DIMENSION: u32 = 2048;

/// JPEG quality on the encoder's 1-100 scale (0.92 on a 0-1 scale).
/// Lower settings smear small print, and the server OCRs every upload.
pub const JPEG_QUALITY: u8 = 92;

/// Ranked search results kept for display.
pub const MAX_RANKED_RESULTS: usize = 10;

/// The server refuses request bodies above this size.
pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// File extensions the gallery server accepts.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "picseek=info,picseek_lib=info,warn"
}

/// Runtime configuration for a gallery client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the gallery server (API and `/uploads/` live under it).
    pub server_url: Url,
    /// Whole-request timeout. `None` keeps the transport default.
    pub request_timeout: Option<Duration>,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    pub preprocess: PreprocessConfig,
}

impl ClientConfig {
    /// Build a config for the given server URL with default tuning.
    pub fn new(server_url: &str) -> Result<Self, GalleryError> {
        Ok(Self {
            server_url: parse_server_url(server_url)?,
            request_timeout: None,
            connect_timeout: Duration::from_secs(10),
            preprocess: PreprocessConfig::default(),
        })
    }

    /// Read `PICSEEK_SERVER_URL` and `PICSEEK_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Result<Self, GalleryError> {
        let url = std::env::var(SERVER_URL_ENV).unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        let mut config = Self::new(&url)?;

        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.request_timeout = Some(Duration::from_secs(secs)),
                _ => tracing::warn!(value = %raw, "Ignoring invalid {TIMEOUT_ENV}"),
            }
        }

        Ok(config)
    }
}

/// Parse a server base URL, forcing a trailing slash so relative joins
/// (`api/images`, `uploads/x.jpg`) land under it rather than replacing
/// its last path segment.
pub fn parse_server_url(raw: &str) -> Result<Url, GalleryError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|e| GalleryError::Config(format!("Invalid server URL '{trimmed}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(GalleryError::Config(format!(
            "Unsupported server URL scheme '{other}'"
        ))),
    }
}
