//! Upload module
//!
//! Re-hosts a source image in the object store and returns its public URL.
//!
//! ```text
//! Idle → Validating → FetchingSource → Hashing → Signing → Uploading → {Done | Failed}
//! ```
//!
//! No stage is re-entered. The relay→direct fallback happens inside
//! `FetchingSource`.

use crate::s3::{CredentialsError, S3ClientError};
use crate::sigv4::SigningError;
use crate::source::FetchError;
use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

pub mod batch;
pub mod client;

pub use batch::upload_all;
pub use client::UploadClient;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Upload failed: HTTP {status} - {body}")]
    Upload { status: u16, body: String },

    #[error("Storage request failed: {0}")]
    Request(String),

    #[error("Cryptographic primitive unavailable: {0}")]
    CryptoUnavailable(String),
}

/// Failure class of an [`UploadError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Fetch,
    Upload,
    CryptoUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Fetch => "fetch",
            ErrorKind::Upload => "upload",
            ErrorKind::CryptoUnavailable => "crypto_unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Config(_) => ErrorKind::Config,
            UploadError::Fetch(_) => ErrorKind::Fetch,
            UploadError::Upload { .. } | UploadError::Request(_) => ErrorKind::Upload,
            UploadError::CryptoUnavailable(_) => ErrorKind::CryptoUnavailable,
        }
    }
}

impl From<CredentialsError> for UploadError {
    fn from(err: CredentialsError) -> Self {
        match err {
            CredentialsError::MissingCredentials(fields) => UploadError::Config(format!(
                "missing required configuration: {}",
                fields.join(", ")
            )),
        }
    }
}

impl From<SigningError> for UploadError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::CryptoUnavailable(msg) => UploadError::CryptoUnavailable(msg),
        }
    }
}

impl From<S3ClientError> for UploadError {
    fn from(err: S3ClientError) -> Self {
        match err {
            S3ClientError::ConfigError(msg) => UploadError::Config(msg),
            S3ClientError::RequestError(msg) => UploadError::Request(msg),
            S3ClientError::ResponseError { status, body } => UploadError::Upload { status, body },
            S3ClientError::SigningError(e) => e.into(),
        }
    }
}

/// A successfully re-hosted object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub public_url: String,
    pub object_key: String,
    pub content_type: String,
    pub bytes: u64,
    pub etag: Option<String>,
}

/// Outcome of one upload
pub type UploadResult = Result<UploadedObject, UploadError>;

/// Upload progress; stages only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UploadStage {
    Idle,
    Validating,
    FetchingSource,
    Hashing,
    Signing,
    Uploading,
    Done,
    Failed,
}

impl UploadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStage::Idle => "idle",
            UploadStage::Validating => "validating",
            UploadStage::FetchingSource => "fetching_source",
            UploadStage::Hashing => "hashing",
            UploadStage::Signing => "signing",
            UploadStage::Uploading => "uploading",
            UploadStage::Done => "done",
            UploadStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStage::Done | UploadStage::Failed)
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of the upload instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// File extension for an image MIME type; unknown types map to `jpg`
pub fn extension_for_mime_type(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Object key `image-<epoch millis>.<ext>`
pub fn object_key(epoch_millis: i64, content_type: &str) -> String {
    format!(
        "image-{}.{}",
        epoch_millis,
        extension_for_mime_type(content_type)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key() {
        assert_eq!(object_key(1700000000000, "image/png"), "image-1700000000000.png");
        assert_eq!(object_key(1700000000000, "image/bmp"), "image-1700000000000.jpg");
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(extension_for_mime_type("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime_type("image/png"), "png");
        assert_eq!(extension_for_mime_type("image/gif"), "gif");
        assert_eq!(extension_for_mime_type("image/webp"), "webp");
        assert_eq!(extension_for_mime_type("image/svg+xml"), "jpg");
    }

    #[test]
    fn test_missing_fields_become_config_error() {
        let err: UploadError =
            CredentialsError::MissingCredentials(vec!["S3 Bucket Name", "S3 Secret Key"]).into();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(
            err.to_string(),
            "Configuration error: missing required configuration: S3 Bucket Name, S3 Secret Key"
        );
    }

    #[test]
    fn test_storage_errors_map_to_taxonomy() {
        let err: UploadError = S3ClientError::ResponseError {
            status: 403,
            body: "Forbidden".into(),
        }
        .into();
        assert!(matches!(
            err,
            UploadError::Upload { status: 403, ref body } if body == "Forbidden"
        ));

        let err: UploadError =
            S3ClientError::SigningError(SigningError::CryptoUnavailable("hmac".into())).into();
        assert_eq!(err.kind(), ErrorKind::CryptoUnavailable);

        let err: UploadError = S3ClientError::RequestError("reset".into()).into();
        assert_eq!(err.kind(), ErrorKind::Upload);
    }

    #[test]
    fn test_fetch_error_is_transparent() {
        let err: UploadError = FetchError::Status { status: 404 }.into();
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert_eq!(err.to_string(), "Source returned HTTP 404");
    }

    #[test]
    fn test_stages_are_ordered() {
        assert!(UploadStage::Idle < UploadStage::Validating);
        assert!(UploadStage::Hashing < UploadStage::Signing);
        assert!(UploadStage::Uploading < UploadStage::Done);
        assert!(UploadStage::Failed.is_terminal());
        assert!(!UploadStage::Uploading.is_terminal());
    }
}
