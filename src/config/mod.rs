//! Configuration module for r2-uploadr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and validation.
//!
//! Credential fields are deliberately not validated here: a missing field is
//! reported by each upload call, listing every blank field by name.

use crate::s3::Credentials;
use crate::sigv4::{DEFAULT_REGION, DEFAULT_SERVICE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in a string.
///
/// Supports two syntaxes:
/// - `${VAR_NAME}` - Simple expansion, keeps placeholder if var not found
/// - `${VAR_NAME:-default}` - Expansion with default value
///
/// Variable names must start with a letter or underscore and contain only
/// uppercase letters, digits, and underscores.
pub(crate) fn expand_env_vars(s: &str) -> String {
    // Literal pattern; compilation cannot fail.
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)(?::-([^}]*))?\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };
    let mut last_match = 0;
    let mut result = String::with_capacity(s.len());

    for cap in re.captures_iter(s) {
        let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        result.push_str(&s[last_match..full_match.start()]);

        let value = match std::env::var(var_name.as_str()) {
            Ok(val) => val,
            Err(_) => match cap.get(2) {
                Some(default) => default.as_str().to_string(),
                None => full_match.as_str().to_string(),
            },
        };
        result.push_str(&value);

        last_match = full_match.end();
    }

    result.push_str(&s[last_match..]);
    result
}

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Requests are signed over `/{bucket}/{key}`, so the endpoint must be a bare origin
fn validate_endpoint_root(endpoint: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(endpoint).map_err(|e| {
        ConfigError::ValidationError(format!("Invalid storage endpoint '{}': {}", endpoint, e))
    })?;

    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::ValidationError(format!(
            "Invalid storage endpoint '{}': must not contain a path, query or fragment",
            endpoint
        )));
    }

    Ok(())
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Validate everything except credentials
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.region.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.region cannot be empty".into(),
            ));
        }

        if self.storage.service.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.service cannot be empty".into(),
            ));
        }

        match &self.storage.endpoint {
            Some(endpoint) => {
                if !is_valid_http_url(endpoint) {
                    return Err(ConfigError::ValidationError(format!(
                        "Invalid storage endpoint '{}': must start with http:// or https://",
                        endpoint
                    )));
                }
                validate_endpoint_root(endpoint)?;
            }
            None => {
                if self.storage.storage_host.trim().is_empty() {
                    return Err(ConfigError::ValidationError(
                        "storage.storage_host cannot be empty when no endpoint is set".into(),
                    ));
                }
            }
        }

        if self.relay.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "relay.timeout_ms must be greater than 0".into(),
            ));
        }

        if self.relay.queue_depth == 0 {
            return Err(ConfigError::ValidationError(
                "relay.queue_depth must be greater than 0".into(),
            ));
        }

        if self.upload.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "upload.concurrency must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

/// Object store endpoint configuration
///
/// Region and service default to the values Cloudflare R2 expects. Other
/// S3-compatible vendors may need different values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Endpoint is `https://{account_id}.{storage_host}` unless overridden
    #[serde(default = "default_storage_host")]
    pub storage_host: String,
    /// Full endpoint override, e.g. `http://127.0.0.1:9000`
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_service")]
    pub service: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_host: default_storage_host(),
            endpoint: None,
            region: default_region(),
            service: default_service(),
        }
    }
}

fn default_storage_host() -> String {
    "r2.cloudflarestorage.com".to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

/// Fetch relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_enabled")]
    pub enabled: bool,
    /// Relay round-trip budget before falling back to a direct fetch
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
    /// Source hosts (and their subdomains) that reject direct fetches
    #[serde(default = "default_relay_hosts")]
    pub hosts: Vec<String>,
    /// Pending relay requests before senders wait
    #[serde(default = "default_relay_queue_depth")]
    pub queue_depth: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: default_relay_enabled(),
            timeout_ms: default_relay_timeout_ms(),
            hosts: default_relay_hosts(),
            queue_depth: default_relay_queue_depth(),
        }
    }
}

fn default_relay_enabled() -> bool {
    true
}

fn default_relay_timeout_ms() -> u64 {
    5000
}

fn default_relay_hosts() -> Vec<String> {
    vec!["xiaohongshu.com".to_string()]
}

fn default_relay_queue_depth() -> usize {
    32
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Uploads in flight for a batch
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Fail before any network work when no public base URL is configured
    #[serde(default)]
    pub require_public_base_url: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            require_public_base_url: false,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.storage_host, "r2.cloudflarestorage.com");
        assert_eq!(config.storage.region, "auto");
        assert_eq!(config.storage.service, "s3");
        assert!(config.relay.enabled);
        assert_eq!(config.relay.timeout_ms, 5000);
        assert_eq!(config.relay.hosts, vec!["xiaohongshu.com"]);
        assert_eq!(config.upload.concurrency, 4);
        assert!(!config.upload.require_public_base_url);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let mut config = Config::default();
        config.relay.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_endpoint() {
        let mut config = Config::default();
        config.storage.endpoint = Some("ftp://example.com".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_endpoint_with_path() {
        let mut config = Config::default();
        config.storage.endpoint = Some("http://localhost:9000/prefix".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(ref msg)) if msg.contains("path")
        ));

        config.storage.endpoint = Some("http://localhost:9000?x=1".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_accepts_bare_endpoint() {
        let mut config = Config::default();
        config.storage.endpoint = Some("http://localhost:9000".into());
        assert!(config.validate().is_ok());

        config.storage.endpoint = Some("http://localhost:9000/".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_region() {
        let mut config = Config::default();
        config.storage.region = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_credentials_are_not_a_load_error() {
        let config: Config = serde_yaml::from_str("credentials:\n  account_id: acct\n").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.credentials.missing_fields().len(), 3);
    }

    #[test]
    fn test_expand_env_vars_default() {
        let expanded = expand_env_vars("bucket: ${R2_UPLOADR_UNSET_VAR:-images}");
        assert_eq!(expanded, "bucket: images");
    }

    #[test]
    fn test_expand_env_vars_keeps_unknown_placeholder() {
        let expanded = expand_env_vars("key: ${R2_UPLOADR_UNSET_VAR}");
        assert_eq!(expanded, "key: ${R2_UPLOADR_UNSET_VAR}");
    }
}
