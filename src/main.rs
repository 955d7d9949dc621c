//! r2-uploadr - re-host images in an S3-compatible object store
//!
//! Uploads each source URL and prints one line per URL, in input order.

use anyhow::{bail, Context};
use clap::Parser;
use r2_uploadr::config::Config;
use r2_uploadr::logging::init_logging;
use r2_uploadr::source::SourceHeaders;
use r2_uploadr::upload::{upload_all, UploadClient};
use std::path::PathBuf;
use tracing::info;

/// r2-uploadr - SigV4-signed image re-hosting
#[derive(Parser, Debug)]
#[command(name = "r2-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics after the batch
    #[arg(long)]
    metrics: bool,

    /// Extra source request header, "Name: value" (repeatable)
    #[arg(short = 'H', long = "header", value_name = "HEADER")]
    headers: Vec<String>,

    /// Source image URLs
    #[arg(required = true)]
    sources: Vec<String>,
}

fn parse_headers(raw: &[String]) -> anyhow::Result<SourceHeaders> {
    let mut headers = SourceHeaders::new();
    for header in raw {
        let Some((name, value)) = header.split_once(':') else {
            bail!("invalid header '{}': expected \"Name: value\"", header);
        };
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }
    Ok(headers)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("failed to load configuration from {:?}", args.config))?;
    if args.json_logs {
        config.logging.json = true;
    }

    init_logging(&config.logging, args.log_level.as_deref())?;
    info!("Starting r2-uploadr v{}", r2_uploadr::VERSION);
    info!("Loaded configuration from {:?}", args.config);

    let headers = parse_headers(&args.headers)?;
    let headers = (!headers.is_empty()).then_some(headers);

    let client = UploadClient::new(&config)?;
    let credentials = config.credentials.clone();
    let results = upload_all(
        &client,
        &args.sources,
        &credentials,
        headers.as_ref(),
        config.upload.concurrency,
    )
    .await;

    let mut failures = 0usize;
    for (source, result) in &results {
        match result {
            Ok(uploaded) => println!("{} -> {}", source, uploaded.public_url),
            Err(e) => {
                failures += 1;
                println!("{} !! {}: {}", source, e.kind(), e);
            }
        }
    }

    if args.metrics {
        print!("{}", r2_uploadr::metrics::gather_text());
    }

    if failures > 0 {
        bail!("{} of {} uploads failed", failures, results.len());
    }
    Ok(())
}
