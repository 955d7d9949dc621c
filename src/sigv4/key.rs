//! SigV4 signing key derivation
//!
//! The signing key narrows the secret to one day, region and service:
//!
//! ```text
//! kDate    = HMAC("AWS4" + secret, dateStamp)
//! kRegion  = HMAC(kDate, region)
//! kService = HMAC(kRegion, service)
//! kSigning = HMAC(kService, "aws4_request")
//! ```
//!
//! Every step keys the next HMAC with the previous step's raw 32 bytes.

use super::SigningError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Terminator of the credential scope and last derivation step
pub const SCOPE_TERMINATOR: &str = "aws4_request";

/// Derive the signing key for a secret/date/region/service quadruple
pub fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<[u8; 32], SigningError> {
    let k_secret = format!("AWS4{}", secret_key);
    let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, SCOPE_TERMINATOR.as_bytes())
}

/// HMAC-SHA256 returning the raw digest
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> Result<[u8; 32], SigningError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SigningError::CryptoUnavailable(format!("HMAC-SHA256 key setup: {}", e)))?;
    mac.update(msg);
    let mut output = [0u8; 32];
    output.copy_from_slice(&mac.finalize().into_bytes());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Published example from the AWS "derive a signing key" documentation.
    const DOC_SECRET: &str = "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY";

    #[test]
    fn test_derive_signing_key_matches_aws_vector() {
        let key = derive_signing_key(DOC_SECRET, "20120215", "us-east-1", "iam").unwrap();
        assert_eq!(
            hex::encode(key),
            "f4780e2d9f65fa895f9c67b32ce1baf0b0d8a43505a000a1a9e090d414db404d"
        );
    }

    #[test]
    fn test_intermediate_keys_use_raw_bytes() {
        let k_date = hmac_sha256(format!("AWS4{}", DOC_SECRET).as_bytes(), b"20120215").unwrap();
        assert_eq!(
            hex::encode(k_date),
            "969fbb94feb542b71ede6f87fe4d5fa29c789342b0f407474670f0c2489e0a0d"
        );

        let k_region = hmac_sha256(&k_date, b"us-east-1").unwrap();
        assert_eq!(
            hex::encode(k_region),
            "69daa0209cd9c5ff5c8ced464a696fd4252e981430b10e3d3fd8e2f197d7a70c"
        );

        let k_service = hmac_sha256(&k_region, b"iam").unwrap();
        assert_eq!(
            hex::encode(k_service),
            "f72cfd46f26bc4643f06a11eabb6c0ba18780c19a8da0c31ace671265e3c87fa"
        );

        // Keying with the hex text instead of the raw bytes must not match.
        let wrong = hmac_sha256(hex::encode(k_service).as_bytes(), b"aws4_request").unwrap();
        let right = derive_signing_key(DOC_SECRET, "20120215", "us-east-1", "iam").unwrap();
        assert_ne!(wrong, right);
    }

    #[test]
    fn test_different_dates_yield_different_keys() {
        let a = derive_signing_key("secret", "20260101", "auto", "s3").unwrap();
        let b = derive_signing_key("secret", "20260102", "auto", "s3").unwrap();
        assert_ne!(a, b);
    }
}
