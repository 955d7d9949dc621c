//! Canonical request and string-to-sign assembly
//!
//! Pure string assembly over already-validated inputs. The header map kept
//! inside [`CanonicalRequest`] is the single source for both the signed
//! header list and the headers written on the wire.

use super::hash::hash_string;
use super::ALGORITHM;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::BTreeMap;
use std::fmt;

/// Headers covered by the signature, already in canonical order
pub const SIGNED_HEADER_NAMES: [&str; 4] =
    ["content-type", "host", "x-amz-content-sha256", "x-amz-date"];

/// RFC 3986 unreserved characters stay literal, everything else is escaped
const URI_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Build the canonical URI `/<bucket>/<key>`, encoding each path segment
pub fn canonical_uri(bucket: &str, object_key: &str) -> String {
    let mut uri = String::with_capacity(bucket.len() + object_key.len() + 2);
    for segment in std::iter::once(bucket).chain(object_key.split('/')) {
        uri.push('/');
        uri.extend(utf8_percent_encode(segment, URI_ENCODE_SET));
    }
    uri
}

/// A SigV4 canonical request for a path-style object PUT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    method: String,
    canonical_uri: String,
    headers: BTreeMap<String, String>,
    payload_hash: String,
}

impl CanonicalRequest {
    /// Build a canonical request
    ///
    /// Header names are lower-cased and anything outside
    /// [`SIGNED_HEADER_NAMES`] is dropped. Values are trimmed.
    pub fn build<'a, I>(
        method: &str,
        bucket: &str,
        object_key: &str,
        headers: I,
        payload_hash: &str,
    ) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.trim().to_string()))
            .filter(|(name, _)| SIGNED_HEADER_NAMES.contains(&name.as_str()))
            .collect();

        Self {
            method: method.to_string(),
            canonical_uri: canonical_uri(bucket, object_key),
            headers,
            payload_hash: payload_hash.to_string(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn canonical_uri(&self) -> &str {
        &self.canonical_uri
    }

    /// Always empty: object PUTs carry no query parameters
    pub fn canonical_query_string(&self) -> &str {
        ""
    }

    pub fn payload_hash(&self) -> &str {
        &self.payload_hash
    }

    /// Signed headers in canonical order, exactly as they must be sent
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `name:value\n` for every signed header
    pub fn canonical_headers(&self) -> String {
        let mut result = String::with_capacity(self.headers.len() * 64);
        for (name, value) in &self.headers {
            result.push_str(name);
            result.push(':');
            result.push_str(value);
            result.push('\n');
        }
        result
    }

    /// Semicolon-joined header names in the same order as `canonical_headers`
    pub fn signed_headers(&self) -> String {
        self.headers
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Hex SHA-256 of the canonical request string
    pub fn hash(&self) -> String {
        hash_string(&self.to_string())
    }
}

impl fmt::Display for CanonicalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{}\n{}\n{}\n{}\n{}",
            self.method,
            self.canonical_uri,
            self.canonical_query_string(),
            self.canonical_headers(),
            self.signed_headers(),
            self.payload_hash
        )
    }
}

/// Assemble the SigV4 string to sign
pub fn string_to_sign(timestamp: &str, credential_scope: &str, canonical_request_hash: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM, timestamp, credential_scope, canonical_request_hash
    )
}
