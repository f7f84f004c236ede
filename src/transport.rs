//! Boundary to the opaque remote backend.
//!
//! The backend accepts a request object and asynchronously invokes the
//! supplied callback with a success or error payload, with no latency
//! bound. Responses are decoded into [`RemoteResponse`] at this boundary,
//! so nothing past the bridge ever inspects a raw dynamic object.

use bytes::Bytes;
use thiserror::Error;

use crate::types::{BlobHandle, ByteStream, CallToken, ContentId, StagedLocation, TransferId};

pub mod memory;

/// A request dispatched to the remote backend
#[derive(Debug, Clone)]
pub enum RemoteRequest {
    /// One fixed-size part of a chunked upload. The backend assembles
    /// parts by position into the buffer keyed by `transfer_id`.
    SendChunk {
        transfer_id: TransferId,
        part_index: u32,
        total_parts: u32,
        payload: Bytes,
    },

    /// Single-shot upload of a whole document
    SendDocument { filename: String, payload: Bytes },

    /// Seal a chunked assembly buffer into a finalized document
    FinalizeTransfer {
        transfer_id: TransferId,
        total_parts: u32,
        filename: String,
    },

    /// Resolve a blob handle to its message content
    LookupMessage { handle: BlobHandle },

    /// Ask the backend to stage content for local reading
    FetchContent { content_id: ContentId },

    /// Remove a finalized document
    DeleteMessage { handle: BlobHandle },

    /// Probe backend auth readiness
    ProbeAuth,
}

impl RemoteRequest {
    /// Short operation name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SendChunk { .. } => "send_chunk",
            Self::SendDocument { .. } => "send_document",
            Self::FinalizeTransfer { .. } => "finalize_transfer",
            Self::LookupMessage { .. } => "lookup_message",
            Self::FetchContent { .. } => "fetch_content",
            Self::DeleteMessage { .. } => "delete_message",
            Self::ProbeAuth => "probe_auth",
        }
    }
}

/// A successful response payload from the backend
#[derive(Debug, Clone)]
pub enum RemoteResponse {
    /// Plain acknowledgement (chunk sends, deletes)
    Ack,

    /// A document was finalized under the given handle
    Posted { handle: BlobHandle },

    /// Result of a message lookup
    Message { content: MessageContent },

    /// Result of a fetch request. `completed` confirms the backend has
    /// finished staging the bytes on its side; byte delivery happens
    /// separately through [`RemoteTransport::open_staged`].
    Staged {
        completed: bool,
        location: StagedLocation,
    },

    /// Auth probe result
    AuthState { ready: bool },
}

/// What a looked-up message contains
#[derive(Debug, Clone)]
pub enum MessageContent {
    /// A downloadable document
    Document {
        content_id: ContentId,
        filename: Option<String>,
        size_bytes: u64,
    },

    /// Anything else (text, media types this system never posts)
    Other { kind: String },
}

/// Error payload reported by the backend for one request
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct RemoteFault {
    pub code: Option<i32>,
    pub message: String,
}

impl RemoteFault {
    /// Create a fault with a message only
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Create a fault with a backend error code
    pub fn with_code<S: Into<String>>(code: i32, message: S) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }
}

/// Outcome delivered to a dispatch callback
pub type RemoteOutcome = Result<RemoteResponse, RemoteFault>;

/// Completion callback handed to the transport with each request
pub type TransportCallback = Box<dyn FnOnce(RemoteOutcome) + Send + 'static>;

/// The callback-driven remote transport.
///
/// `dispatch` must not block; the callback may fire from any thread, at any
/// later time, or never (the bridge's timeout reclaims abandoned calls).
/// The connection is assumed safe for concurrent dispatch by its own
/// contract; the bridge adds only correlation bookkeeping on top.
pub trait RemoteTransport: Send + Sync + 'static {
    /// Dispatch a request. `token` identifies the call for logging and
    /// tracing; correlation itself is carried by the callback.
    fn dispatch(&self, token: CallToken, request: RemoteRequest, on_complete: TransportCallback);

    /// Open a readable byte source positioned at a staged location
    fn open_staged(&self, location: &StagedLocation) -> Result<ByteStream, RemoteFault>;
}
