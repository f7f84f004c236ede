//! Resolves blob handles to readable byte streams and relays them outward.
//!
//! Bytes move through fixed-size stream chunks; the whole payload is never
//! materialized. No retries happen here: a mid-stream failure aborts the
//! transfer, and the boundary layer decides what to do about output the
//! consumer already received.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::bridge::RemoteBridge;
use crate::error::{BridgeError, DownloadError};
use crate::transport::{MessageContent, RemoteRequest, RemoteResponse};
use crate::types::{BlobHandle, ByteStream};

/// Streams remote blobs to a caller-supplied sink
pub struct DownloadPipe {
    bridge: Arc<RemoteBridge>,
}

impl DownloadPipe {
    /// Create a pipe over a shared bridge
    pub fn new(bridge: Arc<RemoteBridge>) -> Self {
        Self { bridge }
    }

    /// Resolve a handle to a readable byte stream.
    ///
    /// Fails with [`DownloadError::NotFound`] when the handle does not
    /// reference a document, and [`DownloadError::Incomplete`] when the
    /// backend has not finished staging the bytes on its side.
    pub async fn open(&self, handle: &BlobHandle) -> Result<ByteStream, DownloadError> {
        debug!(%handle, "resolving handle for download");

        let response = self
            .bridge
            .call(
                RemoteRequest::LookupMessage {
                    handle: handle.clone(),
                },
                self.bridge.timeouts().lookup,
            )
            .await
            .map_err(DownloadError::transport)?;

        let content = match response {
            RemoteResponse::Message { content } => content,
            other => {
                return Err(unexpected_response("message lookup", other));
            }
        };

        let content_id = match content {
            MessageContent::Document { content_id, .. } => content_id,
            MessageContent::Other { kind } => {
                debug!(%handle, kind, "handle does not reference a document");
                return Err(DownloadError::NotFound);
            }
        };

        let response = self
            .bridge
            .call(
                RemoteRequest::FetchContent { content_id },
                self.bridge.timeouts().fetch,
            )
            .await
            .map_err(DownloadError::transport)?;

        let (completed, location) = match response {
            RemoteResponse::Staged {
                completed,
                location,
            } => (completed, location),
            other => return Err(unexpected_response("content fetch", other)),
        };

        if !completed {
            return Err(DownloadError::Incomplete);
        }

        info!(%handle, %content_id, "staged content ready for streaming");
        self.bridge
            .transport()
            .open_staged(&location)
            .map_err(|fault| DownloadError::transport(BridgeError::remote(fault.to_string())))
    }

    /// Relay a byte stream into a sink chunk by chunk.
    ///
    /// Returns the number of bytes relayed. The source is released on
    /// every exit path, including a consumer-side failure mid-stream.
    pub async fn copy<W>(mut source: ByteStream, sink: &mut W) -> Result<u64, DownloadError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut relayed: u64 = 0;
        while let Some(chunk) = source.next().await {
            let chunk = chunk.map_err(DownloadError::stream_failed)?;
            sink.write_all(&chunk)
                .await
                .map_err(DownloadError::stream_failed)?;
            relayed += chunk.len() as u64;
        }
        sink.flush().await.map_err(DownloadError::stream_failed)?;
        debug!(relayed, "stream relay completed");
        Ok(relayed)
    }
}

fn unexpected_response(operation: &str, response: RemoteResponse) -> DownloadError {
    DownloadError::transport(BridgeError::remote(format!(
        "unexpected response to {operation}: {response:?}"
    )))
}
