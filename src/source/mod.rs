//! Source image acquisition
//!
//! Fetches the bytes to be re-hosted. [`SourceFetcher`] is used both for
//! direct fetches from the uploading context and by the relay worker.

use bytes::Bytes;
use std::collections::BTreeMap;
use thiserror::Error;

pub mod headers;

pub use headers::{default_source_headers, merge_headers};

/// Request headers sent to the source host
pub type SourceHeaders = BTreeMap<String, String>;

/// Content type assumed when the source does not declare one
pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

/// Source fetch errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Source returned HTTP {status}")]
    Status { status: u16 },

    #[error("Source fetch failed: {0}")]
    Network(String),

    #[error("Invalid source request header: {0}")]
    InvalidHeader(String),

    #[error("Invalid source URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// HTTP status, when the source answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

/// Fetched image bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePayload {
    pub bytes: Bytes,
    pub content_type: String,
}

impl SourcePayload {
    /// Build a payload, normalizing the declared content type
    pub fn new(bytes: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: normalize_content_type(content_type),
        }
    }
}

/// Lower-cased media type without parameters, defaulting to JPEG
pub fn normalize_content_type(content_type: Option<&str>) -> String {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// Plain HTTP fetcher for source images
#[derive(Clone)]
pub struct SourceFetcher {
    http_client: reqwest::Client,
}

impl SourceFetcher {
    pub fn new() -> Result<Self, FetchError> {
        // Cookies are never sent to source hosts.
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// GET the source URL; any non-2xx status is an error
    #[tracing::instrument(name = "source.fetch", skip(self, headers), fields(http.status_code = tracing::field::Empty), err)]
    pub async fn fetch(&self, url: &str, headers: &SourceHeaders) -> Result<SourcePayload, FetchError> {
        let mut request = self.http_client.get(url);
        for (name, value) in headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|_| FetchError::InvalidHeader(name.to_string()))?;
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        tracing::debug!(
            bytes = bytes.len(),
            content_type = ?content_type,
            "Source fetched"
        );

        Ok(SourcePayload::new(bytes, content_type.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_content_type() {
        assert_eq!(normalize_content_type(Some("image/PNG")), "image/png");
        assert_eq!(
            normalize_content_type(Some("image/webp; charset=binary")),
            "image/webp"
        );
        assert_eq!(normalize_content_type(Some("")), "image/jpeg");
        assert_eq!(normalize_content_type(None), "image/jpeg");
    }

    #[test]
    fn test_fetch_error_status() {
        assert_eq!(FetchError::Status { status: 404 }.status(), Some(404));
        assert_eq!(FetchError::Network("reset".into()).status(), None);
    }

    #[tokio::test]
    async fn test_unreachable_source_is_network_error() {
        let fetcher = SourceFetcher::new().unwrap();
        // Port 9 (discard) on loopback is not expected to accept HTTP.
        let result = fetcher
            .fetch("http://127.0.0.1:9/a.png", &SourceHeaders::new())
            .await;
        assert!(matches!(result, Err(FetchError::Network(_))));
    }
}
