use std::time::Duration;
use thiserror::Error;

use crate::lifecycle::FileStatus;

/// Errors from a single bridged remote call
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("remote call timed out after {elapsed:?}")]
    Timeout { elapsed: Duration },

    #[error("remote backend error: {message}")]
    Remote { message: String },
}

impl BridgeError {
    /// Create a timeout error
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Create a remote backend error
    pub fn remote<S: Into<String>>(message: S) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }

    /// Whether this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors that abort an upload
#[derive(Error, Debug)]
pub enum UploadError {
    /// A bridge call for a chunk, document, or finalize failed or timed out.
    /// The bridge error is carried unmodified as the cause.
    #[error("transport failure during upload")]
    Transport {
        #[source]
        source: BridgeError,
    },

    /// The byte source yielded a different number of bytes than declared.
    /// Short sources are never silently truncated into a success.
    #[error("source size mismatch: read {actual} bytes but {declared} were declared")]
    SourceShort { declared: u64, actual: u64 },

    /// The caller-supplied byte source failed mid-read
    #[error("source read error")]
    Source {
        #[from]
        source: std::io::Error,
    },
}

impl UploadError {
    /// Wrap a bridge error as the cause of an upload failure
    pub fn transport(source: BridgeError) -> Self {
        Self::Transport { source }
    }

    /// Create a size mismatch error
    pub fn source_short(declared: u64, actual: u64) -> Self {
        Self::SourceShort { declared, actual }
    }
}

/// Errors that abort a download
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The handle does not reference a document
    #[error("handle does not reference a downloadable document")]
    NotFound,

    /// The backend has not finished staging the content
    #[error("backend reported the staged content as incomplete")]
    Incomplete,

    /// I/O failure while relaying bytes to the consumer. Partial output
    /// already sent is not recoverable.
    #[error("stream relay failed")]
    StreamFailed {
        #[source]
        source: std::io::Error,
    },

    /// A lookup or fetch bridge call failed or timed out. The bridge error
    /// is carried unmodified as the cause.
    #[error("transport failure during download")]
    Transport {
        #[source]
        source: BridgeError,
    },
}

impl DownloadError {
    /// Wrap a bridge error as the cause of a download failure
    pub fn transport(source: BridgeError) -> Self {
        Self::Transport { source }
    }

    /// Wrap an I/O error from the relay path
    pub fn stream_failed(source: std::io::Error) -> Self {
        Self::StreamFailed { source }
    }
}

/// Access-control failures when issuing a download
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("file not found")]
    NotFound,

    #[error("invalid access code")]
    InvalidCode,

    #[error("file expired at {expired_at}")]
    Expired { expired_at: chrono::DateTime<chrono::Utc> },

    #[error("file upload not completed (status: {status:?})")]
    NotCompleted { status: FileStatus },

    #[error("download limit reached ({limit}/{limit})")]
    DownloadLimit { limit: u32 },

    #[error("upload limit exceeded for client {client_addr}")]
    RateLimited { client_addr: String },
}

/// Invalid file status transition
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid status transition: {from:?} -> {to:?}")]
pub struct LifecycleError {
    pub from: FileStatus,
    pub to: FileStatus,
}

/// Errors from the metadata store collaborator
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("record not found: {session_id}")]
    RecordNotFound { session_id: String },

    #[error("metadata backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl MetadataError {
    /// Create a record-not-found error
    pub fn record_not_found<S: Into<String>>(session_id: S) -> Self {
        Self::RecordNotFound {
            session_id: session_id.into(),
        }
    }

    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }
}

/// Composite error surfaced by the [`TransferAdapter`](crate::TransferAdapter)
#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Result type for adapter-level operations
pub type TransferResult<T> = Result<T, TransferError>;
