//! Drives uploads through the bridge.
//!
//! Large sources are partitioned into exact fixed-size parts and sent
//! strictly in part-index order, one outstanding call at a time: the
//! backend assembles parts by position and offers no reordering or
//! gap-filling. Small sources go out as one send-document call.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::bridge::RemoteBridge;
use crate::config::TransferConfig;
use crate::error::{BridgeError, UploadError};
use crate::transport::{RemoteRequest, RemoteResponse};
use crate::types::{BlobHandle, ByteStream, UploadSession, UploadStrategy};

/// Sequences chunk sends and finalization for one upload at a time
pub struct UploadCoordinator {
    bridge: Arc<RemoteBridge>,
    config: TransferConfig,
}

impl UploadCoordinator {
    /// Create a coordinator over a shared bridge
    pub fn new(bridge: Arc<RemoteBridge>, config: TransferConfig) -> Self {
        Self { bridge, config }
    }

    /// Upload a byte source and return the finalized blob handle.
    ///
    /// The source is read exactly once. Its total byte count must equal
    /// `declared_size`; any mismatch aborts with
    /// [`UploadError::SourceShort`] rather than a silently wrong blob.
    pub async fn upload(
        &self,
        source: ByteStream,
        filename: &str,
        declared_size: u64,
    ) -> Result<BlobHandle, UploadError> {
        let session = UploadSession::begin(declared_size, &self.config);
        info!(
            filename,
            declared_size,
            strategy = ?session.strategy,
            "starting upload"
        );

        match session.strategy {
            UploadStrategy::SingleShot => self.upload_single(source, filename, declared_size).await,
            UploadStrategy::Chunked => self.upload_chunked(source, filename, session).await,
        }
    }

    /// Single-shot mode: the whole payload in one send-document call
    async fn upload_single(
        &self,
        mut source: ByteStream,
        filename: &str,
        declared_size: u64,
    ) -> Result<BlobHandle, UploadError> {
        let mut payload = BytesMut::with_capacity(declared_size as usize);
        while let Some(chunk) = source.next().await {
            let chunk = chunk?;
            payload.extend_from_slice(&chunk);
            if payload.len() as u64 > declared_size {
                return Err(UploadError::source_short(declared_size, payload.len() as u64));
            }
        }
        if (payload.len() as u64) < declared_size {
            return Err(UploadError::source_short(declared_size, payload.len() as u64));
        }

        let response = self
            .bridge
            .call(
                RemoteRequest::SendDocument {
                    filename: filename.to_string(),
                    payload: payload.freeze(),
                },
                self.bridge.timeouts().document,
            )
            .await
            .map_err(UploadError::transport)?;

        let handle = expect_posted(response)?;
        info!(filename, %handle, "single-shot upload completed");
        Ok(handle)
    }

    /// Chunked mode: strict in-order part sends, then finalize
    async fn upload_chunked(
        &self,
        mut source: ByteStream,
        filename: &str,
        mut session: UploadSession,
    ) -> Result<BlobHandle, UploadError> {
        let part_size = session.part_size as usize;
        let mut buffer = BytesMut::with_capacity(part_size);
        let mut total_read: u64 = 0;

        debug!(
            transfer_id = %session.transfer_id,
            total_parts = session.total_parts,
            part_size,
            "chunked upload started"
        );

        while let Some(chunk) = source.next().await {
            let chunk = chunk?;
            total_read += chunk.len() as u64;
            if total_read > session.declared_size {
                // Checked before draining, so no part past total_parts - 1
                // is ever dispatched.
                return Err(UploadError::source_short(session.declared_size, total_read));
            }
            buffer.extend_from_slice(&chunk);

            while buffer.len() >= part_size {
                let payload = buffer.split_to(part_size).freeze();
                self.send_part(&mut session, payload).await?;
            }
        }

        if total_read < session.declared_size {
            return Err(UploadError::source_short(session.declared_size, total_read));
        }
        if !buffer.is_empty() {
            // Final part; exact byte count, shorter than part_size.
            let payload = buffer.split_to(buffer.len()).freeze();
            self.send_part(&mut session, payload).await?;
        }
        debug_assert!(session.all_parts_sent());

        let response = self
            .bridge
            .call(
                RemoteRequest::FinalizeTransfer {
                    transfer_id: session.transfer_id,
                    total_parts: session.total_parts,
                    filename: filename.to_string(),
                },
                self.bridge.timeouts().finalize,
            )
            .await
            .map_err(UploadError::transport)?;

        let handle = expect_posted(response)?;
        info!(
            filename,
            transfer_id = %session.transfer_id,
            parts = session.total_parts,
            %handle,
            "chunked upload finalized"
        );
        Ok(handle)
    }

    /// Send one part and wait for its acknowledgement before returning.
    ///
    /// A failure or timeout here aborts the whole upload; no retry and no
    /// partial finalize; already-sent parts are abandoned on the backend.
    async fn send_part(
        &self,
        session: &mut UploadSession,
        payload: Bytes,
    ) -> Result<(), UploadError> {
        let part_index = session.advance();
        self.bridge
            .call(
                RemoteRequest::SendChunk {
                    transfer_id: session.transfer_id,
                    part_index,
                    total_parts: session.total_parts,
                    payload,
                },
                self.bridge.timeouts().chunk,
            )
            .await
            .map_err(UploadError::transport)?;

        if (part_index + 1) % 10 == 0 {
            debug!(
                transfer_id = %session.transfer_id,
                "upload progress: {}/{} parts",
                part_index + 1,
                session.total_parts
            );
        }
        Ok(())
    }
}

fn expect_posted(response: RemoteResponse) -> Result<BlobHandle, UploadError> {
    match response {
        RemoteResponse::Posted { handle } => Ok(handle),
        other => Err(UploadError::transport(BridgeError::remote(format!(
            "expected a posted document, got {other:?}"
        )))),
    }
}
