//! Collaborator seams: metadata store, access-code verifier, clock.
//!
//! The relational store, its query surface, and the code-hashing scheme
//! are external collaborators; this module specifies their interfaces and
//! ships in-memory implementations for tests and demos.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::MetadataError;
use crate::lifecycle::{FileRecord, FileStatus};
use crate::types::BlobHandle;

/// Metadata store collaborator interface
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert or update a record, keyed by session id
    async fn save(&self, record: FileRecord) -> Result<FileRecord, MetadataError>;

    /// Find a record by its session id
    async fn find_by_session(&self, session_id: &str)
        -> Result<Option<FileRecord>, MetadataError>;

    /// Find a record by its blob handle
    async fn find_by_handle(
        &self,
        handle: &BlobHandle,
    ) -> Result<Option<FileRecord>, MetadataError>;

    /// Count records created by a client address since a point in time
    async fn count_recent_by_client(
        &self,
        client_addr: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, MetadataError>;

    /// Records past their expiration that are not yet Deleted
    async fn expired_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, MetadataError>;

    /// Remove Deleted and Failed rows whose expiration passed before the
    /// cutoff. Returns the number purged.
    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, MetadataError>;
}

/// Hashes and verifies access codes. The production implementation is an
/// external concern (the original system uses BCrypt).
pub trait AccessCodeVerifier: Send + Sync {
    /// Digest a plaintext code for storage
    fn digest(&self, code: &str) -> String;

    /// Verify a plaintext code against a stored digest
    fn verify(&self, code: &str, digest: &str) -> bool;
}

/// Identity verifier for tests and demos only, no hashing at all
#[derive(Debug, Clone, Default)]
pub struct PlainCodeVerifier;

impl AccessCodeVerifier for PlainCodeVerifier {
    fn digest(&self, code: &str) -> String {
        code.to_string()
    }

    fn verify(&self, code: &str, digest: &str) -> bool {
        code == digest
    }
}

/// Clock source collaborator
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed, manually advanced clock for tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: RwLock<Option<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(Some(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = Some(now);
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.write();
        let current = guard.unwrap_or_else(Utc::now);
        *guard = Some(current + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().unwrap_or_else(Utc::now)
    }
}

/// In-memory metadata store for tests and demos
#[derive(Default)]
pub struct MemoryMetadataStore {
    records: Arc<RwLock<HashMap<String, FileRecord>>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Count records currently in the given status
    pub fn count_by_status(&self, status: FileStatus) -> usize {
        self.records
            .read()
            .values()
            .filter(|r| r.status == status)
            .count()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn save(&self, record: FileRecord) -> Result<FileRecord, MetadataError> {
        self.records
            .write()
            .insert(record.session_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<FileRecord>, MetadataError> {
        Ok(self.records.read().get(session_id).cloned())
    }

    async fn find_by_handle(
        &self,
        handle: &BlobHandle,
    ) -> Result<Option<FileRecord>, MetadataError> {
        Ok(self
            .records
            .read()
            .values()
            .find(|r| r.handle.as_ref() == Some(handle))
            .cloned())
    }

    async fn count_recent_by_client(
        &self,
        client_addr: &str,
        since: DateTime<Utc>,
    ) -> Result<u64, MetadataError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.client_addr == client_addr && r.created_at >= since)
            .count() as u64)
    }

    async fn expired_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<FileRecord>, MetadataError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.expires_at < cutoff && r.status != FileStatus::Deleted)
            .cloned()
            .collect())
    }

    async fn purge_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, MetadataError> {
        let mut records = self.records.write();
        let before = records.len();
        records.retain(|_, r| {
            !(matches!(r.status, FileStatus::Deleted | FileStatus::Failed)
                && r.expires_at < cutoff)
        });
        Ok((before - records.len()) as u64)
    }
}
