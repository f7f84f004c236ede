//! # courier-blob: streaming file delivery over callback-driven backends
//!
//! `courier-blob` turns an opaque, callback-driven remote blob backend into
//! a bounded, synchronous-feeling storage layer: every remote operation is
//! one bridged call with an explicit timeout, large uploads become ordered
//! fixed-size chunks the backend assembles by position, and downloads are
//! relayed outward without ever materializing the whole file in memory.
//!
//! ## Key Features
//!
//! - **Bounded calls**: a correlation table plus per-operation timeouts
//!   gives every remote request exactly one resolution (response, error,
//!   or timeout), with late callbacks discarded silently
//! - **Ordered chunked uploads**: strict in-order, one-outstanding-chunk
//!   sequencing with exact part sizes and immediate abort on failure
//! - **Zero-buffer downloads**: staged content streams through fixed-size
//!   chunks to any `AsyncWrite` sink
//! - **Lifecycle bookkeeping**: a guarded `Pending -> Completed/Failed ->
//!   Expired -> Deleted` state machine, plus periodic cleanup and
//!   per-client rate limiting at the edges
//! - **Backend agnostic**: the transport is a trait; an in-memory backend
//!   with fault and latency injection ships for tests and demos
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use courier_blob::prelude::*;
//! use courier_blob::{MemoryMetadataStore, MemoryTransport, PlainCodeVerifier, StoreIntent};
//!
//! # #[tokio::main(flavor = "multi_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryMetadataStore::new());
//! let adapter = TransferAdapter::new(
//!     MemoryTransport::new(),
//!     store,
//!     PlainCodeVerifier,
//!     TransferConfig::default(),
//! );
//!
//! // Upload: pending record -> chunk/document sends -> completed record
//! let data = bytes::Bytes::from_static(b"hello, courier");
//! let source: ByteStream = Box::pin(futures_util::stream::once(async move { Ok(data) }));
//! let intent = StoreIntent::new("hello.txt", 14)
//!     .with_media_type("text/plain")
//!     .with_client_addr("203.0.113.7")
//!     .with_access_code("123456");
//! let record = adapter.store(intent, source).await?;
//!
//! // Authorize and stream back
//! let grant = adapter.authorize(&record.session_id, "123456").await?;
//! let (_record, stream) = adapter.open_stream(&grant.handle).await?;
//! let mut sink = Vec::new();
//! DownloadPipe::copy(stream, &mut sink).await?;
//! assert_eq!(sink, b"hello, courier");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │   Your Service    │  ← business logic only
//! ├───────────────────┤
//! │  TransferAdapter  │  ← lifecycle + access policy
//! ├─────────┬─────────┤
//! │ Upload  │Download │  ← ordered chunks / zero-buffer relay
//! │ Coord.  │  Pipe   │
//! ├─────────┴─────────┤
//! │   RemoteBridge    │  ← correlation table + timeouts
//! ├───────────────────┤
//! │  RemoteTransport  │  ← callback-driven backend
//! └───────────────────┘
//! ```
//!
//! The bridge's correlation table is the only state shared across
//! concurrent calls; separate uploads and downloads proceed fully in
//! parallel with each other.

pub mod adapter;
mod bridge;
mod config;
mod coordinator;
mod download;
mod error;
mod lifecycle;
mod maintenance;
mod metadata;
mod ratelimit;
pub mod transport;
mod types;

// Re-export main types for clean API
pub use adapter::{IssuedDownload, StoreIntent, TransferAdapter};
pub use bridge::RemoteBridge;
pub use config::{CallTimeouts, TransferConfig};
pub use coordinator::UploadCoordinator;
pub use download::DownloadPipe;
pub use error::{
    AccessError, BridgeError, DownloadError, LifecycleError, MetadataError, TransferError,
    TransferResult, UploadError,
};
pub use lifecycle::{FileRecord, FileStatus};
pub use maintenance::{CleanupSweeper, SweepReport};
pub use metadata::{
    AccessCodeVerifier, Clock, ManualClock, MemoryMetadataStore, MetadataStore, PlainCodeVerifier,
    SystemClock,
};
pub use ratelimit::RateLimiter;
pub use transport::memory::MemoryTransport;
pub use transport::{
    MessageContent, RemoteFault, RemoteOutcome, RemoteRequest, RemoteResponse, RemoteTransport,
    TransportCallback,
};
pub use types::{
    total_parts, BlobHandle, ByteStream, CallToken, ContentId, StagedLocation, TransferId,
    UploadSession, UploadStrategy,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobHandle, BridgeError, ByteStream, DownloadError, DownloadPipe, FileRecord, FileStatus,
        RemoteBridge, RemoteTransport, TransferAdapter, TransferConfig, TransferResult,
        UploadCoordinator, UploadError,
    };
}
