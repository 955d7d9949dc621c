//! S3 Client module
//!
//! Issues SigV4-signed path-style PUT requests against an S3-compatible
//! endpoint (Cloudflare R2 by default). Signing and sending are separate
//! steps so callers can observe each stage.
//!
//! # Wire format
//!
//! ```text
//! PUT https://{account_id}.{storage_host}/{bucket}/{key}
//! content-type: ...
//! host: {account_id}.{storage_host}
//! x-amz-content-sha256: <hex sha256 of body>
//! x-amz-date: YYYYMMDDTHHMMSSZ
//! authorization: AWS4-HMAC-SHA256 Credential=..., SignedHeaders=..., Signature=...
//! ```
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | PutObject | `s3.put_object` | url, method, bytes, etag, status_code |

use crate::config::StorageConfig;
use crate::sigv4::{self, CanonicalRequest, RequestSigner, SigningContext, SigningError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod credentials;

pub use credentials::{Credentials, CredentialsError};

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3ClientError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Storage returned HTTP {status}: {body}")]
    ResponseError { status: u16, body: String },

    #[error("Signing error: {0}")]
    SigningError(#[from] SigningError),
}

/// S3 Client
pub struct S3Client {
    config: StorageConfig,
    http_client: reqwest::Client,
}

impl S3Client {
    /// Create a new S3 client
    pub fn new(config: StorageConfig) -> Result<Self, S3ClientError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| S3ClientError::ConfigError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    pub fn service(&self) -> &str {
        &self.config.service
    }

    /// Endpoint URL for an account, without trailing slash
    pub fn endpoint(&self, credentials: &Credentials) -> String {
        match &self.config.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!(
                "https://{}.{}",
                credentials.account_id, self.config.storage_host
            ),
        }
    }

    /// `Host` header value derived from the endpoint (default ports omitted)
    pub fn host(&self, credentials: &Credentials) -> Result<String, S3ClientError> {
        let endpoint = self.endpoint(credentials);
        let url = reqwest::Url::parse(&endpoint)
            .map_err(|e| S3ClientError::ConfigError(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        if url.path() != "/" || url.query().is_some() {
            return Err(S3ClientError::ConfigError(format!(
                "endpoint '{}' must not contain a path or query",
                endpoint
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| S3ClientError::ConfigError(format!("endpoint '{}' has no host", endpoint)))?;

        Ok(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    /// Path-style URL of an object when no public base URL is configured
    pub fn object_url(&self, credentials: &Credentials, key: &str) -> String {
        format!(
            "{}{}",
            self.endpoint(credentials),
            sigv4::canonical_uri(&credentials.bucket_name, key)
        )
    }

    /// Sign a PutObject request
    ///
    /// `at` is the signing instant; `x-amz-date` and the credential scope
    /// are both rendered from it. The returned header list is exactly the
    /// signed set followed by `authorization`.
    pub fn sign_put_object(
        &self,
        credentials: &Credentials,
        key: &str,
        content_type: &str,
        payload_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<SignedPutObject, S3ClientError> {
        let context = SigningContext::new(at, &self.config.region, &self.config.service);
        let host = self.host(credentials)?;

        let request = CanonicalRequest::build(
            "PUT",
            &credentials.bucket_name,
            key,
            [
                ("content-type", content_type),
                ("host", host.as_str()),
                ("x-amz-content-sha256", payload_hash),
                ("x-amz-date", context.timestamp()),
            ],
            payload_hash,
        );

        let authorization = RequestSigner::new(&credentials.access_key_id, &credentials.secret_key)
            .sign(&context, &request)?;

        tracing::debug!(
            access_key_id = %credentials.access_key_id,
            credential_scope = %context.credential_scope(),
            signed_headers = %authorization.signed_headers(),
            "Signed PutObject request"
        );

        let mut headers: Vec<(String, String)> = request
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        headers.push(("authorization".to_string(), authorization.to_string()));

        Ok(SignedPutObject {
            url: format!("{}{}", self.endpoint(credentials), request.canonical_uri()),
            headers,
        })
    }

    /// Send a signed PutObject request with its body
    #[tracing::instrument(
        name = "s3.put_object",
        skip(self, request, body),
        fields(
            s3.url = %request.url,
            http.method = "PUT",
            upload.bytes = body.len(),
            s3.etag = tracing::field::Empty,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn send_put_object(
        &self,
        request: SignedPutObject,
        body: Bytes,
    ) -> Result<S3PutObjectResponse, S3ClientError> {
        let mut builder = self.http_client.put(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| S3ClientError::RequestError(e.to_string()))?;

        let status = response.status();
        let span = tracing::Span::current();
        span.record("http.status_code", status.as_u16());

        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to read storage error body");
                format!("<unreadable response body: {}>", e)
            });
            return Err(S3ClientError::ResponseError {
                status: status.as_u16(),
                body,
            });
        }

        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        if let Some(etag) = &etag {
            span.record("s3.etag", etag.as_str());
        }

        tracing::info!(
            etag = ?etag,
            status = status.as_u16(),
            "PutObject completed"
        );

        Ok(S3PutObjectResponse {
            status: status.as_u16(),
            etag,
        })
    }
}

/// A signed PutObject request awaiting its body
#[derive(Clone)]
pub struct SignedPutObject {
    pub url: String,
    /// Signed headers in canonical order, then `authorization`
    pub headers: Vec<(String, String)>,
}

impl SignedPutObject {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for SignedPutObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("SignedPutObject")
            .field("url", &self.url)
            .field("headers", &names)
            .finish()
    }
}

/// S3 PutObject response
#[derive(Debug, Clone)]
pub struct S3PutObjectResponse {
    pub status: u16,
    pub etag: Option<String>,
}
