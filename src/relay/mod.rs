//! Cross-context fetch relay
//!
//! Some image hosts reject fetches made from the uploading context. Those
//! fetches are handed to a privileged context over a message channel; the
//! round-trip is bounded by a timeout, after which exactly one direct fetch
//! is attempted from the calling context.
//!
//! ```text
//! FetchRelay::fetch
//!   ├── RelayTransport::send({action: "fetchImage", url, headers})
//!   │     └── raced against timeout_ms
//!   └── on relay error or timeout: SourceFetcher::fetch (once)
//! ```
//!
//! The relay is never retried and never polled.

use crate::metrics;
use crate::source::{FetchError, SourceFetcher, SourceHeaders, SourcePayload};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod worker;

pub use worker::{RelayHandle, RelayWorker};

/// Relay round-trip failures; recovered locally by the direct fallback
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("Relay did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Relay fetch failed: {0}")]
    Failed(String),

    #[error("Relay channel closed")]
    Disconnected,
}

impl RelayError {
    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            RelayError::Timeout(_) => "timeout",
            RelayError::Failed(_) => "error",
            RelayError::Disconnected => "disconnected",
        }
    }
}

/// Message sent to the privileged context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum RelayRequest {
    #[serde(rename = "fetchImage")]
    FetchImage {
        url: String,
        #[serde(default)]
        headers: SourceHeaders,
    },
}

/// Reply from the privileged context
///
/// On the wire `blob` is base64 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "blob")]
    pub blob: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResponse {
    pub fn success(payload: SourcePayload) -> Self {
        Self {
            success: true,
            blob: Some(payload.bytes),
            content_type: Some(payload.content_type),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            blob: None,
            content_type: None,
            error: Some(error.into()),
        }
    }

    /// Unwrap a successful reply into a payload
    pub fn into_payload(self) -> Result<SourcePayload, RelayError> {
        match (self.success, self.blob) {
            (true, Some(blob)) => Ok(SourcePayload::new(blob, self.content_type.as_deref())),
            (true, None) => Err(RelayError::Failed("relay returned no data".into())),
            (false, _) => Err(RelayError::Failed(
                self.error.unwrap_or_else(|| "unknown relay error".into()),
            )),
        }
    }
}

mod blob {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(blob: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
        match blob {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Bytes>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|text| {
                STANDARD
                    .decode(text)
                    .map(Bytes::from)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

/// Channel to a privileged fetch context
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Deliver one request and wait for its reply
    async fn send(&self, request: RelayRequest) -> Result<RelayResponse, RelayError>;
}

/// Relay-first fetcher with a single direct fallback
pub struct FetchRelay {
    transport: Arc<dyn RelayTransport>,
    direct: SourceFetcher,
    timeout: Duration,
}

impl FetchRelay {
    pub fn new(transport: Arc<dyn RelayTransport>, direct: SourceFetcher, timeout: Duration) -> Self {
        Self {
            transport,
            direct,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch through the relay, falling back once to a direct fetch
    #[tracing::instrument(
        name = "relay.fetch",
        skip(self, headers),
        fields(
            relay.timeout_ms = self.timeout.as_millis() as u64,
            relay.outcome = tracing::field::Empty
        ),
        err
    )]
    pub async fn fetch(&self, url: &str, headers: &SourceHeaders) -> Result<SourcePayload, FetchError> {
        let request = RelayRequest::FetchImage {
            url: url.to_string(),
            headers: headers.clone(),
        };

        let relayed = match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => response.into_payload(),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RelayError::Timeout(self.timeout)),
        };

        let span = tracing::Span::current();
        match relayed {
            Ok(payload) => {
                span.record("relay.outcome", "relayed");
                metrics::record_source_fetch("relay", true);
                Ok(payload)
            }
            Err(e) => {
                span.record("relay.outcome", "fallback");
                metrics::record_relay_fallback(e.reason());
                tracing::warn!(error = %e, "Relay fetch failed, falling back to direct fetch");

                let result = self.direct.fetch(url, headers).await;
                metrics::record_source_fetch("direct_fallback", result.is_ok());
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let mut headers = SourceHeaders::new();
        headers.insert("Referer".into(), "https://www.example.com/".into());
        let request = RelayRequest::FetchImage {
            url: "https://img.example.com/a.png".into(),
            headers,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "action": "fetchImage",
                "url": "https://img.example.com/a.png",
                "headers": {"Referer": "https://www.example.com/"}
            })
        );
    }

    #[test]
    fn test_success_response_wire_format() {
        let response = RelayResponse::success(SourcePayload::new(
            Bytes::from_static(b"\x89PNG"),
            Some("image/png"),
        ));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "blob": "iVBORw==", "contentType": "image/png"})
        );

        let parsed: RelayResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_failure_response_parses() {
        let parsed: RelayResponse =
            serde_json::from_str(r#"{"success": false, "error": "HTTP error! Status: 403"}"#).unwrap();
        assert_eq!(
            parsed.into_payload(),
            Err(RelayError::Failed("HTTP error! Status: 403".into()))
        );
    }

    #[test]
    fn test_success_without_content_type_defaults_to_jpeg() {
        let parsed: RelayResponse = serde_json::from_str(r#"{"success": true, "blob": "AAE="}"#).unwrap();
        let payload = parsed.into_payload().unwrap();
        assert_eq!(payload.bytes, Bytes::from_static(&[0, 1]));
        assert_eq!(payload.content_type, "image/jpeg");
    }

    #[test]
    fn test_success_without_blob_is_error() {
        let response = RelayResponse {
            success: true,
            blob: None,
            content_type: None,
            error: None,
        };
        assert!(matches!(response.into_payload(), Err(RelayError::Failed(_))));
    }

    #[test]
    fn test_error_reasons() {
        assert_eq!(RelayError::Timeout(Duration::from_millis(1)).reason(), "timeout");
        assert_eq!(RelayError::Failed("x".into()).reason(), "error");
        assert_eq!(RelayError::Disconnected.reason(), "disconnected");
    }
}
