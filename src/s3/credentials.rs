//! Object store credentials
//!
//! A [`Credentials`] value is an immutable snapshot taken by the caller and
//! passed into every upload. Field aliases accept the camelCase names used by
//! the browser extension's settings store.
//!
//! # Example
//!
//! ```
//! use r2_uploadr::s3::Credentials;
//!
//! let creds = Credentials::new("account", "bucket", "access-key", "")
//!     .with_public_base_url("img.example.com/");
//!
//! assert_eq!(creds.missing_fields(), vec!["S3 Secret Key"]);
//! assert_eq!(creds.public_base_url().as_deref(), Some("https://img.example.com"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Credential validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("Missing credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),
}

/// Credentials and bucket coordinates for one object store
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, alias = "cloudflareAccountId")]
    pub account_id: String,

    #[serde(default, alias = "s3BucketName")]
    pub bucket_name: String,

    #[serde(default, alias = "s3AccessKeyId")]
    pub access_key_id: String,

    #[serde(default, alias = "s3SecretKey")]
    pub secret_key: String,

    /// Public host or URL that serves the bucket, e.g. `pub-xxx.r2.dev`
    #[serde(default, alias = "publicBaseUrl", alias = "r2DevUrl")]
    pub public_base_url: Option<String>,
}

impl Credentials {
    pub fn new(
        account_id: impl Into<String>,
        bucket_name: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            bucket_name: bucket_name.into(),
            access_key_id: access_key_id.into(),
            secret_key: secret_key.into(),
            public_base_url: None,
        }
    }

    pub fn with_public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = Some(url.into());
        self
    }

    /// Human-readable names of every required field that is blank
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("Cloudflare Account ID", &self.account_id),
            ("S3 Bucket Name", &self.bucket_name),
            ("S3 Access Key ID", &self.access_key_id),
            ("S3 Secret Key", &self.secret_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Check that all required fields are present
    pub fn validate(&self) -> Result<(), CredentialsError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CredentialsError::MissingCredentials(missing))
        }
    }

    /// Normalized public base URL: scheme added if absent, no trailing slash
    pub fn public_base_url(&self) -> Option<String> {
        let raw = self.public_base_url.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }

        let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("https://{}", raw)
        };
        Some(with_scheme.trim_end_matches('/').to_string())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("bucket_name", &self.bucket_name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_key", &"<redacted>")
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> Credentials {
        Credentials::new("acct", "bucket", "access", "secret")
    }

    #[test]
    fn test_complete_credentials_validate() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn test_missing_secret_key_is_named() {
        let creds = Credentials {
            secret_key: String::new(),
            ..complete()
        };

        let err = creds.validate().unwrap_err();
        assert_eq!(err, CredentialsError::MissingCredentials(vec!["S3 Secret Key"]));
        assert!(err.to_string().contains("S3 Secret Key"));
    }

    #[test]
    fn test_every_missing_field_is_listed() {
        let creds = Credentials::default();
        assert_eq!(
            creds.missing_fields(),
            vec![
                "Cloudflare Account ID",
                "S3 Bucket Name",
                "S3 Access Key ID",
                "S3 Secret Key"
            ]
        );
    }

    #[test]
    fn test_whitespace_counts_as_missing() {
        let creds = Credentials {
            bucket_name: "   ".into(),
            ..complete()
        };
        assert_eq!(creds.missing_fields(), vec!["S3 Bucket Name"]);
    }

    #[test]
    fn test_public_base_url_normalization() {
        let creds = complete().with_public_base_url("pub-123.r2.dev//");
        assert_eq!(creds.public_base_url().as_deref(), Some("https://pub-123.r2.dev"));

        let creds = complete().with_public_base_url("http://cdn.example.com/images/");
        assert_eq!(
            creds.public_base_url().as_deref(),
            Some("http://cdn.example.com/images")
        );

        let creds = complete().with_public_base_url("  ");
        assert!(creds.public_base_url().is_none());
        assert!(complete().public_base_url().is_none());
    }

    #[test]
    fn test_extension_field_names_deserialize() {
        let json = r#"{
            "cloudflareAccountId": "acct",
            "s3BucketName": "bucket",
            "s3AccessKeyId": "access",
            "s3SecretKey": "secret",
            "r2DevUrl": "pub.r2.dev"
        }"#;
        let creds: Credentials = serde_json::from_str(json).unwrap();
        assert_eq!(creds, complete().with_public_base_url("pub.r2.dev"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", complete());
        assert!(!debug.contains("\"secret\""));
        assert!(debug.contains("<redacted>"));
    }
}
