//! The facade services embed: ties the bridge, coordinator, pipe, and
//! metadata collaborators into the full file-sharing flow.

use std::sync::Arc;

use chrono::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::bridge::RemoteBridge;
use crate::config::TransferConfig;
use crate::coordinator::UploadCoordinator;
use crate::download::DownloadPipe;
use crate::error::{AccessError, TransferError, TransferResult};
use crate::lifecycle::{FileRecord, FileStatus};
use crate::metadata::{AccessCodeVerifier, Clock, MetadataStore, SystemClock};
use crate::ratelimit::RateLimiter;
use crate::transport::{RemoteRequest, RemoteTransport};
use crate::types::{BlobHandle, ByteStream};

/// What the caller declares about an incoming upload
#[derive(Debug, Clone)]
pub struct StoreIntent {
    pub filename: String,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    pub client_addr: String,
    /// Plaintext access code; only its digest is stored
    pub access_code: String,
}

impl StoreIntent {
    pub fn new<S: Into<String>>(filename: S, size_bytes: u64) -> Self {
        Self {
            filename: filename.into(),
            size_bytes,
            media_type: None,
            client_addr: String::new(),
            access_code: String::new(),
        }
    }

    pub fn with_media_type<S: Into<String>>(mut self, media_type: S) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_client_addr<S: Into<String>>(mut self, client_addr: S) -> Self {
        self.client_addr = client_addr.into();
        self
    }

    pub fn with_access_code<S: Into<String>>(mut self, access_code: S) -> Self {
        self.access_code = access_code.into();
        self
    }
}

/// Issued download grant, returned after a successful authorization
#[derive(Debug, Clone)]
pub struct IssuedDownload {
    pub handle: BlobHandle,
    pub filename: String,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    pub downloads_remaining: u32,
}

/// The main transfer adapter; embed this in your service
pub struct TransferAdapter {
    bridge: Arc<RemoteBridge>,
    coordinator: UploadCoordinator,
    pipe: DownloadPipe,
    store: Arc<dyn MetadataStore>,
    codes: Arc<dyn AccessCodeVerifier>,
    clock: Arc<dyn Clock>,
    limiter: Option<RateLimiter>,
    config: TransferConfig,
}

impl TransferAdapter {
    /// Create an adapter over a transport and metadata store
    pub fn new<T, V>(
        transport: T,
        store: Arc<dyn MetadataStore>,
        codes: V,
        config: TransferConfig,
    ) -> Self
    where
        T: RemoteTransport,
        V: AccessCodeVerifier + 'static,
    {
        let bridge = Arc::new(RemoteBridge::new(transport, config.timeouts.clone()));
        Self::from_bridge(bridge, store, Arc::new(codes), Arc::new(SystemClock), config)
    }

    /// Create an adapter from parts already wired together
    pub fn from_bridge(
        bridge: Arc<RemoteBridge>,
        store: Arc<dyn MetadataStore>,
        codes: Arc<dyn AccessCodeVerifier>,
        clock: Arc<dyn Clock>,
        config: TransferConfig,
    ) -> Self {
        Self {
            coordinator: UploadCoordinator::new(Arc::clone(&bridge), config.clone()),
            pipe: DownloadPipe::new(Arc::clone(&bridge)),
            bridge,
            store,
            codes,
            clock,
            limiter: None,
            config,
        }
    }

    /// Enable per-client rate limiting
    pub fn with_rate_limiter(mut self) -> Self {
        self.limiter = Some(RateLimiter::new(
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.max_uploads_per_hour,
        ));
        self
    }

    /// The shared bridge (for maintenance tasks and health probes)
    pub fn bridge(&self) -> &Arc<RemoteBridge> {
        &self.bridge
    }

    /// Upload a source end to end: create a pending record, push the
    /// bytes, attach the handle and mark Completed (or mark Failed).
    pub async fn store(
        &self,
        intent: StoreIntent,
        source: ByteStream,
    ) -> TransferResult<FileRecord> {
        let now = self.clock.now();

        if let Some(limiter) = &self.limiter {
            if !limiter.is_allowed(&intent.client_addr).await? {
                return Err(AccessError::RateLimited {
                    client_addr: intent.client_addr.clone(),
                }
                .into());
            }
        }

        let mut record = FileRecord::pending(
            Uuid::new_v4().to_string(),
            intent.filename.clone(),
            intent.size_bytes,
            intent.media_type.clone(),
            self.codes.digest(&intent.access_code),
            intent.client_addr.clone(),
            now,
            now + Duration::days(self.config.retention_days),
        );
        record = self.store.save(record).await?;

        info!(
            session_id = record.session_id,
            filename = intent.filename,
            size_bytes = intent.size_bytes,
            "upload request accepted"
        );

        match self
            .coordinator
            .upload(source, &intent.filename, intent.size_bytes)
            .await
        {
            Ok(handle) => {
                let now = self.clock.now();
                record.complete(handle, now)?;
                let record = self.store.save(record).await?;
                if let Some(limiter) = &self.limiter {
                    limiter.record_attempt(&intent.client_addr);
                }
                info!(
                    session_id = record.session_id,
                    handle = ?record.handle,
                    "upload completed"
                );
                Ok(record)
            }
            Err(e) => {
                record.fail()?;
                self.store.save(record).await?;
                error!(filename = intent.filename, "upload failed: {e}");
                Err(e.into())
            }
        }
    }

    /// Verify an access code and issue a download grant.
    ///
    /// Counters are bumped only here, on successful issuance, never on a
    /// failed or unauthorized attempt.
    pub async fn authorize(
        &self,
        session_id: &str,
        access_code: &str,
    ) -> TransferResult<IssuedDownload> {
        let mut record = self
            .store
            .find_by_session(session_id)
            .await?
            .ok_or(AccessError::NotFound)?;

        if !self.codes.verify(access_code, &record.code_digest) {
            warn!(session_id, "invalid access code");
            return Err(AccessError::InvalidCode.into());
        }

        record.ensure_issuable(self.clock.now(), self.config.max_download_count)?;

        // Invariant upheld by the lifecycle: Completed implies a handle.
        let handle = record.handle.clone().ok_or(AccessError::NotFound)?;

        record.record_access(self.clock.now());
        let record = self.store.save(record).await?;

        info!(
            session_id,
            downloads = record.download_count,
            "download grant issued"
        );

        Ok(IssuedDownload {
            handle,
            filename: record.filename.clone(),
            size_bytes: record.size_bytes,
            media_type: record.media_type.clone(),
            downloads_remaining: self
                .config
                .max_download_count
                .saturating_sub(record.download_count),
        })
    }

    /// Open a lifecycle-checked byte stream for a previously issued handle
    pub async fn open_stream(
        &self,
        handle: &BlobHandle,
    ) -> TransferResult<(FileRecord, ByteStream)> {
        let record = self
            .store
            .find_by_handle(handle)
            .await?
            .ok_or(AccessError::NotFound)?;

        if record.status != FileStatus::Completed {
            warn!(%handle, status = ?record.status, "stream refused: upload not completed");
            return Err(AccessError::NotCompleted {
                status: record.status,
            }
            .into());
        }
        if record.is_expired(self.clock.now()) {
            warn!(%handle, "stream refused: file expired");
            return Err(AccessError::Expired {
                expired_at: record.expires_at,
            }
            .into());
        }

        let stream = self.pipe.open(handle).await?;
        Ok((record, stream))
    }

    /// Best-effort deletion: remove the remote document if it still has a
    /// handle, then mark the record Deleted. A remote delete failure is
    /// reported but leaves the record for a later cleanup pass.
    pub async fn delete(&self, session_id: &str) -> TransferResult<FileRecord> {
        let mut record = self
            .store
            .find_by_session(session_id)
            .await?
            .ok_or(AccessError::NotFound)?;

        if let Some(handle) = record.handle.clone() {
            let result = self
                .bridge
                .call(
                    RemoteRequest::DeleteMessage { handle },
                    self.config.timeouts.delete,
                )
                .await;
            if let Err(e) = result {
                warn!(session_id, "remote delete failed, record kept: {e}");
                return Ok(record);
            }
        }

        record.delete()?;
        let record = self.store.save(record).await?;
        info!(session_id, "file deleted");
        Ok(record)
    }
}
