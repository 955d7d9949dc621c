//! Batch uploads
//!
//! Runs independent uploads with bounded concurrency. Results come back in
//! input order, each paired with its source URL; a failed upload never
//! cancels its siblings.

use super::{UploadClient, UploadResult};
use crate::s3::Credentials;
use crate::source::SourceHeaders;
use futures::stream::{self, StreamExt};

/// Upload every source URL, returning `(source_url, result)` in input order
pub async fn upload_all<S>(
    client: &UploadClient,
    source_urls: &[S],
    credentials: &Credentials,
    source_headers: Option<&SourceHeaders>,
    concurrency: usize,
) -> Vec<(String, UploadResult)>
where
    S: AsRef<str>,
{
    tracing::info!(
        count = source_urls.len(),
        concurrency = concurrency,
        "Starting batch upload"
    );

    stream::iter(source_urls.iter().map(|url| url.as_ref()))
        .map(|url| async move {
            let result = client.upload(url, credentials, source_headers).await;
            (url.to_string(), result)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
