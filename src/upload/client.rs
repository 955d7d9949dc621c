//! Upload client
//!
//! Orchestrates one upload: validate credentials, acquire the source bytes
//! (through the relay for hosts that reject direct fetches), derive the
//! object key, hash, sign, PUT, and build the public URL.
//!
//! # Example
//!
//! ```no_run
//! use r2_uploadr::config::Config;
//! use r2_uploadr::upload::UploadClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load("config.yaml")?;
//! let client = UploadClient::new(&config)?;
//!
//! let uploaded = client
//!     .upload("https://example.com/photo.png", &config.credentials, None)
//!     .await?;
//! println!("{}", uploaded.public_url);
//! # Ok(())
//! # }
//! ```

use super::{object_key, Clock, SystemClock, UploadError, UploadResult, UploadStage, UploadedObject};
use crate::config::Config;
use crate::metrics;
use crate::relay::{FetchRelay, RelayTransport, RelayWorker};
use crate::s3::{Credentials, S3Client};
use crate::sigv4;
use crate::source::{
    default_source_headers, merge_headers, FetchError, SourceFetcher, SourceHeaders, SourcePayload,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Re-hosts source images in the object store
pub struct UploadClient {
    storage: S3Client,
    direct: SourceFetcher,
    relay: Option<FetchRelay>,
    relay_hosts: Vec<String>,
    require_public_base_url: bool,
    clock: Arc<dyn Clock>,
}

impl UploadClient {
    /// Build a client from configuration
    ///
    /// When the relay is enabled this spawns the relay worker, so it must be
    /// called from within a Tokio runtime; outside one it returns
    /// [`UploadError::Config`].
    pub fn new(config: &Config) -> Result<Self, UploadError> {
        let storage = S3Client::new(config.storage.clone())?;
        let direct = SourceFetcher::new()?;

        let relay = if config.relay.enabled {
            let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
                UploadError::Config(format!("relay worker needs a Tokio runtime: {}", e))
            })?;
            // The privileged context gets its own client.
            let handle =
                RelayWorker::spawn(&runtime, SourceFetcher::new()?, config.relay.queue_depth);
            Some(FetchRelay::new(
                Arc::new(handle),
                direct.clone(),
                Duration::from_millis(config.relay.timeout_ms),
            ))
        } else {
            None
        };

        Ok(Self {
            storage,
            direct,
            relay,
            relay_hosts: config.relay.hosts.clone(),
            require_public_base_url: config.upload.require_public_base_url,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the relay transport
    pub fn with_relay_transport(mut self, transport: Arc<dyn RelayTransport>, timeout: Duration) -> Self {
        self.relay = Some(FetchRelay::new(transport, self.direct.clone(), timeout));
        self
    }

    /// Replace the clock used for object keys and signing
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Configured relay host the URL belongs to, if any
    pub fn relay_host_for(&self, source_url: &str) -> Option<&str> {
        let url = reqwest::Url::parse(source_url).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();
        self.relay_hosts
            .iter()
            .map(String::as_str)
            .find(|relay_host| {
                let relay_host = relay_host.to_ascii_lowercase();
                host == relay_host || host.ends_with(&format!(".{}", relay_host))
            })
    }

    /// Upload one source image and return its public URL
    #[tracing::instrument(
        name = "upload.image",
        skip(self, credentials, source_headers),
        fields(
            s3.bucket = %credentials.bucket_name,
            s3.key = tracing::field::Empty,
            upload.bytes = tracing::field::Empty,
            upload.stage = tracing::field::Empty
        )
    )]
    pub async fn upload(
        &self,
        source_url: &str,
        credentials: &Credentials,
        source_headers: Option<&SourceHeaders>,
    ) -> UploadResult {
        let start_time = Instant::now();
        let mut stage = UploadStage::Idle;

        let result = self
            .run(&mut stage, source_url, credentials, source_headers)
            .await;

        let duration = start_time.elapsed();
        metrics::record_upload_duration(&credentials.bucket_name, duration.as_secs_f64());

        match &result {
            Ok(uploaded) => {
                advance(&mut stage, UploadStage::Done);
                metrics::record_upload_success(&credentials.bucket_name, uploaded.bytes);
                tracing::info!(
                    public_url = %uploaded.public_url,
                    bytes = uploaded.bytes,
                    duration_ms = duration.as_millis(),
                    "Upload completed"
                );
            }
            Err(e) => {
                let failed_at = stage;
                advance(&mut stage, UploadStage::Failed);
                metrics::record_upload_failure(&credentials.bucket_name);
                metrics::record_error(e.kind().as_str());
                tracing::error!(
                    error = %e,
                    kind = %e.kind(),
                    stage = %failed_at,
                    duration_ms = duration.as_millis(),
                    "Upload failed"
                );
            }
        }

        result
    }

    async fn run(
        &self,
        stage: &mut UploadStage,
        source_url: &str,
        credentials: &Credentials,
        source_headers: Option<&SourceHeaders>,
    ) -> UploadResult {
        advance(stage, UploadStage::Validating);
        credentials.validate()?;
        let public_base_url = credentials.public_base_url();
        if public_base_url.is_none() && self.require_public_base_url {
            return Err(UploadError::Config("missing public base URL".into()));
        }

        advance(stage, UploadStage::FetchingSource);
        let payload = self.fetch_source(source_url, source_headers).await?;

        let now = self.clock.now();
        let key = object_key(now.timestamp_millis(), &payload.content_type);
        let span = tracing::Span::current();
        span.record("s3.key", key.as_str());
        span.record("upload.bytes", payload.bytes.len());

        advance(stage, UploadStage::Hashing);
        let payload_hash = sigv4::hash_bytes(&payload.bytes);

        advance(stage, UploadStage::Signing);
        let signed = self.storage.sign_put_object(
            credentials,
            &key,
            &payload.content_type,
            &payload_hash,
            now,
        )?;

        advance(stage, UploadStage::Uploading);
        let bytes = payload.bytes.len() as u64;
        let response = self.storage.send_put_object(signed, payload.bytes).await?;

        let public_url = match public_base_url {
            Some(base) => format!("{}/{}", base, key),
            None => self.storage.object_url(credentials, &key),
        };

        Ok(UploadedObject {
            public_url,
            object_key: key,
            content_type: payload.content_type,
            bytes,
            etag: response.etag,
        })
    }

    async fn fetch_source(
        &self,
        source_url: &str,
        source_headers: Option<&SourceHeaders>,
    ) -> Result<SourcePayload, FetchError> {
        reqwest::Url::parse(source_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", source_url, e)))?;

        let relay_host = self.relay_host_for(source_url);
        let headers = merge_headers(default_source_headers(source_url, relay_host), source_headers);

        match (&self.relay, relay_host) {
            (Some(relay), Some(host)) => {
                tracing::debug!(relay_host = %host, "Fetching source through relay");
                relay.fetch(source_url, &headers).await
            }
            _ => {
                let result = self.direct.fetch(source_url, &headers).await;
                metrics::record_source_fetch("direct", result.is_ok());
                result
            }
        }
    }
}

fn advance(stage: &mut UploadStage, next: UploadStage) {
    debug_assert!(next > *stage, "upload stage moved from {} to {}", stage, next);
    tracing::Span::current().record("upload.stage", next.as_str());
    tracing::debug!(from = %stage, to = %next, "Upload stage");
    *stage = next;
}
