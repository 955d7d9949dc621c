//! In-process privileged fetch worker
//!
//! The worker owns its own HTTP client and answers [`RelayRequest`]s
//! received over an mpsc channel, one reply per request over a oneshot.
//! Each request is served on its own task so a slow source never blocks
//! the queue.

use super::{RelayError, RelayRequest, RelayResponse, RelayTransport};
use crate::source::SourceFetcher;
use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

type Envelope = (RelayRequest, oneshot::Sender<RelayResponse>);

/// Spawns the privileged relay context
pub struct RelayWorker;

impl RelayWorker {
    /// Start the worker on `runtime`
    ///
    /// The worker stops once every [`RelayHandle`] clone is dropped.
    pub fn spawn(runtime: &Handle, fetcher: SourceFetcher, queue_depth: usize) -> RelayHandle {
        let (sender, mut receiver) = mpsc::channel::<Envelope>(queue_depth.max(1));

        runtime.spawn(async move {
            while let Some((request, reply)) = receiver.recv().await {
                let fetcher = fetcher.clone();
                tokio::spawn(async move {
                    let response = handle_request(&fetcher, request).await;
                    // The caller may have timed out already.
                    let _ = reply.send(response);
                });
            }
            tracing::debug!("Relay worker stopped");
        });

        RelayHandle { sender }
    }
}

async fn handle_request(fetcher: &SourceFetcher, request: RelayRequest) -> RelayResponse {
    match request {
        RelayRequest::FetchImage { url, headers } => {
            if url.trim().is_empty() {
                tracing::error!("Relay request without image url");
                return RelayResponse::failure("missing image url");
            }

            match fetcher.fetch(&url, &headers).await {
                Ok(payload) => {
                    tracing::debug!(
                        url = %url,
                        content_type = %payload.content_type,
                        bytes = payload.bytes.len(),
                        "Relay fetched image"
                    );
                    RelayResponse::success(payload)
                }
                Err(e) => RelayResponse::failure(e.to_string()),
            }
        }
    }
}

/// Sending side of the relay channel
#[derive(Clone)]
pub struct RelayHandle {
    sender: mpsc::Sender<Envelope>,
}

#[async_trait]
impl RelayTransport for RelayHandle {
    async fn send(&self, request: RelayRequest) -> Result<RelayResponse, RelayError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send((request, reply))
            .await
            .map_err(|_| RelayError::Disconnected)?;
        response.await.map_err(|_| RelayError::Disconnected)
    }
}
