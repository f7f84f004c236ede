use std::pin::Pin;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use bytes::Bytes;
use futures_core::Stream;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::config::TransferConfig;

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Opaque reference to a finalized remote document.
///
/// Assigned by the backend once a document is finalized; the sole durable
/// reference to remotely stored content. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobHandle(pub String);

impl BlobHandle {
    /// Create from an existing backend identifier
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

static NEXT_TRANSFER_ID: Lazy<AtomicI64> =
    Lazy::new(|| AtomicI64::new(chrono::Utc::now().timestamp_millis()));

/// Process-unique identifier correlating all chunk calls of one upload.
///
/// Seeded from wall-clock millis and advanced monotonically, so ids never
/// collide across concurrent uploads within the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(pub i64);

impl TransferId {
    /// Allocate the next transfer id
    pub fn allocate() -> Self {
        Self(NEXT_TRANSFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the inner value
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TransferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend-side identifier of the raw content inside a document message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub i64);

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque per-request identifier used by the bridge correlation table.
///
/// Tokens are minted from a monotonic counter and never reused, so a late
/// response can never leak into an unrelated later call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallToken(pub u64);

impl CallToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for CallToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mints call tokens for one bridge instance
#[derive(Debug, Default)]
pub(crate) struct TokenMint(AtomicU64);

impl TokenMint {
    pub(crate) fn next(&self) -> CallToken {
        CallToken(self.0.fetch_add(1, Ordering::Relaxed))
    }
}

/// Backend-side location of staged (locally fetched) content
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StagedLocation(pub String);

impl StagedLocation {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StagedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an upload is delivered to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    /// One send-document call carrying the whole payload
    SingleShot,
    /// Ordered fixed-size chunk calls followed by a finalize
    Chunked,
}

impl UploadStrategy {
    /// Pick the strategy for a declared size against the configured threshold
    pub fn select(declared_size: u64, threshold: u64) -> Self {
        if declared_size > threshold {
            Self::Chunked
        } else {
            Self::SingleShot
        }
    }
}

/// Number of fixed-size parts needed to cover `size` bytes
pub fn total_parts(size: u64, part_size: u64) -> u32 {
    debug_assert!(part_size > 0);
    ((size + part_size - 1) / part_size) as u32
}

/// Bounded-lifetime state of one in-flight upload.
///
/// Created at upload start, discarded at completion or failure; never
/// shared across uploads.
#[derive(Debug)]
pub struct UploadSession {
    pub transfer_id: TransferId,
    pub declared_size: u64,
    pub strategy: UploadStrategy,
    pub part_size: u64,
    pub total_parts: u32,
    next_part: u32,
}

impl UploadSession {
    /// Begin a session for a declared size under the given config
    pub fn begin(declared_size: u64, config: &TransferConfig) -> Self {
        let strategy = UploadStrategy::select(declared_size, config.chunk_threshold_bytes);
        Self {
            transfer_id: TransferId::allocate(),
            declared_size,
            strategy,
            part_size: config.part_size_bytes,
            total_parts: total_parts(declared_size, config.part_size_bytes),
            next_part: 0,
        }
    }

    /// Sequence number for the next chunk to send
    pub fn next_part(&self) -> u32 {
        self.next_part
    }

    /// Claim the next chunk sequence number
    pub fn advance(&mut self) -> u32 {
        let part = self.next_part;
        self.next_part += 1;
        part
    }

    /// Whether every part has been dispatched
    pub fn all_parts_sent(&self) -> bool {
        self.next_part >= self.total_parts
    }
}
