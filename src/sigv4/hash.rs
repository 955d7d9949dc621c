//! SHA-256 content hashing
//!
//! Produces the lower-case hex digests used for `x-amz-content-sha256` and
//! for hashing the canonical request.

use sha2::{Digest, Sha256};

/// SHA-256 of an empty payload
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Hash raw bytes, returning 64 lower-case hex characters
pub fn hash_bytes(buffer: &[u8]) -> String {
    hex::encode(Sha256::digest(buffer))
}

/// Hash the UTF-8 encoding of a string
pub fn hash_string(s: &str) -> String {
    hash_bytes(s.as_bytes())
}
