//! r2-uploadr Library
//!
//! Re-hosts images scraped from web pages in an S3-compatible object store
//! (Cloudflare R2 by default) and returns durable public URLs.
//!
//! # Features
//!
//! - **SigV4 Signing**: PUT requests signed with AWS Signature Version 4
//! - **Fetch Relay**: hosts that reject direct fetches go through a
//!   privileged fetch context, bounded by a timeout with one direct fallback
//! - **Typed Failures**: configuration, fetch and upload errors are distinct
//! - **Batch Uploads**: independent uploads with bounded concurrency
//!
//! # Example
//!
//! ```no_run
//! use r2_uploadr::{config::Config, upload::UploadClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let client = UploadClient::new(&config)?;
//!     let uploaded = client
//!         .upload("https://example.com/a.png", &config.credentials, None)
//!         .await?;
//!     println!("{}", uploaded.public_url);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod logging;
pub mod metrics;
pub mod relay;
pub mod s3;
pub mod sigv4;
pub mod source;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use s3::Credentials;
pub use upload::{UploadClient, UploadError, UploadResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
