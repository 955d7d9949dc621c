//! AWS Signature Version 4 signing
//!
//! Signs path-style object PUTs for S3-compatible stores.
//!
//! - [`hash`] - SHA-256 content hashing
//! - [`key`] - the four-step HMAC signing key chain
//! - [`canonical`] - canonical request and string-to-sign assembly
//!
//! All values here are pure and call-local; nothing is cached between
//! requests.
//!
//! # Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use r2_uploadr::sigv4::{CanonicalRequest, RequestSigner, SigningContext};
//!
//! let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
//! let context = SigningContext::new(at, "auto", "s3");
//! assert_eq!(context.credential_scope(), "20250101/auto/s3/aws4_request");
//!
//! let request = CanonicalRequest::build(
//!     "PUT",
//!     "bucket",
//!     "image-1.png",
//!     [
//!         ("content-type", "image/png"),
//!         ("host", "acct.r2.cloudflarestorage.com"),
//!         ("x-amz-content-sha256", "UNSIGNED-PAYLOAD"),
//!         ("x-amz-date", context.timestamp()),
//!     ],
//!     "UNSIGNED-PAYLOAD",
//! );
//!
//! let signer = RequestSigner::new("AKIDEXAMPLE", "secret");
//! let authorization = signer.sign(&context, &request).unwrap();
//! assert_eq!(authorization.signature().len(), 64);
//! ```

use chrono::{DateTime, Utc};
use std::fmt;
use thiserror::Error;

pub mod canonical;
pub mod hash;
pub mod key;

pub use canonical::{canonical_uri, string_to_sign, CanonicalRequest, SIGNED_HEADER_NAMES};
pub use hash::{hash_bytes, hash_string, EMPTY_SHA256};
pub use key::derive_signing_key;

/// Signing algorithm identifier
pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Region used by Cloudflare R2
pub const DEFAULT_REGION: &str = "auto";

/// Service name used by S3-compatible stores
pub const DEFAULT_SERVICE: &str = "s3";

/// Signing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("Cryptographic primitive unavailable: {0}")]
    CryptoUnavailable(String),
}

/// Timestamp and credential scope for one signature
///
/// `timestamp` and `date_stamp` are always rendered from the same instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext {
    timestamp: String,
    date_stamp: String,
    region: String,
    service: String,
}

impl SigningContext {
    pub fn new(at: DateTime<Utc>, region: &str, service: &str) -> Self {
        Self {
            timestamp: at.format("%Y%m%dT%H%M%SZ").to_string(),
            date_stamp: at.format("%Y%m%d").to_string(),
            region: region.to_string(),
            service: service.to_string(),
        }
    }

    /// ISO-basic UTC timestamp, e.g. `20250101T000000Z`
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// `YYYYMMDD`
    pub fn date_stamp(&self) -> &str {
        &self.date_stamp
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// `date/region/service/aws4_request`
    pub fn credential_scope(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.date_stamp,
            self.region,
            self.service,
            key::SCOPE_TERMINATOR
        )
    }
}

/// Computes signatures for one access key pair
pub struct RequestSigner<'a> {
    access_key_id: &'a str,
    secret_key: &'a str,
}

impl<'a> RequestSigner<'a> {
    pub fn new(access_key_id: &'a str, secret_key: &'a str) -> Self {
        Self {
            access_key_id,
            secret_key,
        }
    }

    /// Sign a canonical request, returning the `Authorization` header value
    pub fn sign(
        &self,
        context: &SigningContext,
        request: &CanonicalRequest,
    ) -> Result<Authorization, SigningError> {
        let credential_scope = context.credential_scope();
        let string_to_sign = string_to_sign(context.timestamp(), &credential_scope, &request.hash());

        let signing_key = derive_signing_key(
            self.secret_key,
            context.date_stamp(),
            context.region(),
            context.service(),
        )?;
        let signature = hex::encode(key::hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        Ok(Authorization {
            credential: format!("{}/{}", self.access_key_id, credential_scope),
            signed_headers: request.signed_headers(),
            signature,
        })
    }
}

/// A computed `Authorization` header
#[derive(Clone, PartialEq, Eq)]
pub struct Authorization {
    credential: String,
    signed_headers: String,
    signature: String,
}

impl Authorization {
    /// 64 lower-case hex characters
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn signed_headers(&self) -> &str {
        &self.signed_headers
    }
}

impl fmt::Display for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Credential={}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.credential, self.signed_headers, self.signature
        )
    }
}

// Keep signatures out of debug logs.
impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorization")
            .field("credential", &self.credential)
            .field("signed_headers", &self.signed_headers)
            .finish_non_exhaustive()
    }
}
