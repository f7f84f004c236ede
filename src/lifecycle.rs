//! File record lifecycle.
//!
//! A record moves `Pending -> {Completed, Failed}`,
//! `Completed -> {Expired, Deleted}`, `Expired -> Deleted`; nothing leaves
//! `Deleted`. Transitions are guarded here so no caller can skip a state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AccessError, LifecycleError};
use crate::types::BlobHandle;

/// Status of a file record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    /// Upload started, no blob handle yet
    Pending,
    /// Upload finalized with a durably attached handle
    Completed,
    /// Upload aborted; terminal for the upload path
    Failed,
    /// Past expiration, awaiting cleanup
    Expired,
    /// Remote content removed; terminal
    Deleted,
}

impl FileStatus {
    /// Whether the machine permits moving to `next`
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        use FileStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Failed) | (Completed, Expired)
                | (Completed, Deleted) | (Expired, Deleted)
        )
    }

    /// Whether the record can never change state again
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Failed | FileStatus::Deleted)
    }
}

/// Bookkeeping for one upload.
///
/// Owned by the metadata store; the core mutates only status, the blob
/// handle, and the access counters, through the guarded methods below.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub session_id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub media_type: Option<String>,
    /// Digest of the access code, produced by an external verifier
    pub code_digest: String,
    pub handle: Option<BlobHandle>,
    pub status: FileStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub last_access_at: Option<DateTime<Utc>>,
    pub download_count: u32,
    pub client_addr: String,
}

impl FileRecord {
    /// Create a pending record at upload start
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        session_id: String,
        filename: String,
        size_bytes: u64,
        media_type: Option<String>,
        code_digest: String,
        client_addr: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            filename,
            size_bytes,
            media_type,
            code_digest,
            handle: None,
            status: FileStatus::Pending,
            created_at,
            completed_at: None,
            expires_at,
            last_access_at: None,
            download_count: 0,
            client_addr,
        }
    }

    fn transition(&mut self, to: FileStatus) -> Result<(), LifecycleError> {
        if !self.status.can_transition_to(to) {
            return Err(LifecycleError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Attach the finalized handle and mark the upload completed.
    ///
    /// A record only reaches Completed with a handle attached.
    pub fn complete(
        &mut self,
        handle: BlobHandle,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.transition(FileStatus::Completed)?;
        self.handle = Some(handle);
        self.completed_at = Some(now);
        Ok(())
    }

    /// Mark the upload failed. A failed record never regains a handle.
    pub fn fail(&mut self) -> Result<(), LifecycleError> {
        self.transition(FileStatus::Failed)?;
        self.handle = None;
        Ok(())
    }

    /// Mark a completed record as past expiration
    pub fn expire(&mut self) -> Result<(), LifecycleError> {
        self.transition(FileStatus::Expired)
    }

    /// Mark the record deleted and drop its blob reference
    pub fn delete(&mut self) -> Result<(), LifecycleError> {
        self.transition(FileStatus::Deleted)?;
        self.handle = None;
        Ok(())
    }

    /// Whether the expiration time has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Check the issuance invariants: downloads and URL issuance are valid
    /// only from Completed, before expiration, under the download cap.
    pub fn ensure_issuable(&self, now: DateTime<Utc>, max_downloads: u32) -> Result<(), AccessError> {
        if self.status != FileStatus::Completed {
            return Err(AccessError::NotCompleted {
                status: self.status,
            });
        }
        if self.is_expired(now) {
            return Err(AccessError::Expired {
                expired_at: self.expires_at,
            });
        }
        if self.download_count >= max_downloads {
            return Err(AccessError::DownloadLimit {
                limit: max_downloads,
            });
        }
        Ok(())
    }

    /// Bump the access counters. Called only after a successful issuance,
    /// never on failed or unauthorized attempts.
    pub fn record_access(&mut self, now: DateTime<Utc>) {
        self.download_count += 1;
        self.last_access_at = Some(now);
    }
}
