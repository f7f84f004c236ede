//! In-process transport backend.
//!
//! Implements the full remote contract in memory: positional chunk
//! assembly, finalized documents, staged reads, and an asynchronously
//! fired callback per dispatch. Used by the conformance tests and as a
//! reference for what the backend contract requires, including fault and
//! latency injection.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use rand::Rng;

use crate::transport::{
    MessageContent, RemoteFault, RemoteOutcome, RemoteRequest, RemoteResponse, RemoteTransport,
    TransportCallback,
};
use crate::types::{BlobHandle, ByteStream, CallToken, ContentId, StagedLocation};

const STAGED_READ_CHUNK: usize = 64 * 1024;

/// What a stored message contains
#[derive(Debug, Clone)]
enum StoredMessage {
    Document {
        content_id: i64,
        filename: Option<String>,
        payload: Bytes,
    },
    Other {
        kind: String,
    },
}

#[derive(Default)]
struct State {
    assemblies: Mutex<HashMap<i64, BTreeMap<u32, Bytes>>>,
    messages: Mutex<HashMap<String, StoredMessage>>,
    handles_by_content: Mutex<HashMap<i64, String>>,
    staged: Mutex<HashMap<String, Bytes>>,
    dispatch_log: Mutex<Vec<RemoteRequest>>,
    next_message_id: AtomicI64,
    next_content_id: AtomicI64,
    auth_ready: AtomicBool,
    incomplete_content: Mutex<HashSet<i64>>,
    fail_chunks: Mutex<HashSet<u32>>,
    stall_chunks: Mutex<HashSet<u32>>,
}

/// In-memory remote backend with fault and latency injection
pub struct MemoryTransport {
    state: Arc<State>,
    base_latency: Duration,
    jitter: Duration,
}

impl MemoryTransport {
    /// Create a backend that answers without artificial delay
    pub fn new() -> Self {
        let state = State {
            next_message_id: AtomicI64::new(1000),
            next_content_id: AtomicI64::new(1),
            auth_ready: AtomicBool::new(true),
            ..Default::default()
        };
        Self {
            state: Arc::new(state),
            base_latency: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Add artificial latency to every callback, with uniform jitter
    pub fn with_latency(mut self, base: Duration, jitter: Duration) -> Self {
        self.base_latency = base;
        self.jitter = jitter;
        self
    }

    /// Every dispatched request, in dispatch order
    pub fn dispatch_log(&self) -> Vec<RemoteRequest> {
        self.state.dispatch_log.lock().clone()
    }

    /// Number of dispatched requests of one kind
    pub fn count_of(&self, kind: &str) -> usize {
        self.state
            .dispatch_log
            .lock()
            .iter()
            .filter(|r| r.kind() == kind)
            .count()
    }

    /// Part indexes of all dispatched chunk sends, in dispatch order
    pub fn chunk_indexes(&self) -> Vec<u32> {
        self.state
            .dispatch_log
            .lock()
            .iter()
            .filter_map(|r| match r {
                RemoteRequest::SendChunk { part_index, .. } => Some(*part_index),
                _ => None,
            })
            .collect()
    }

    /// Seed a finalized document directly
    pub fn post_document(&self, filename: &str, payload: Bytes) -> BlobHandle {
        self.state.store_document(Some(filename.to_string()), payload)
    }

    /// Seed a non-document message (lookups must not treat it as downloadable)
    pub fn post_text(&self, kind: &str) -> BlobHandle {
        let handle = self.state.allocate_handle();
        self.state.messages.lock().insert(
            handle.clone(),
            StoredMessage::Other {
                kind: kind.to_string(),
            },
        );
        BlobHandle::from_string(handle)
    }

    /// Stored payload for a handle, if it is a document
    pub fn document_payload(&self, handle: &BlobHandle) -> Option<Bytes> {
        match self.state.messages.lock().get(handle.as_str()) {
            Some(StoredMessage::Document { payload, .. }) => Some(payload.clone()),
            _ => None,
        }
    }

    /// Stored filename for a handle, if it is a document
    pub fn document_filename(&self, handle: &BlobHandle) -> Option<String> {
        match self.state.messages.lock().get(handle.as_str()) {
            Some(StoredMessage::Document { filename, .. }) => filename.clone(),
            _ => None,
        }
    }

    /// Whether a message still exists under the handle
    pub fn contains(&self, handle: &BlobHandle) -> bool {
        self.state.messages.lock().contains_key(handle.as_str())
    }

    /// Flip the auth probe answer
    pub fn set_auth_ready(&self, ready: bool) {
        self.state.auth_ready.store(ready, Ordering::SeqCst);
    }

    /// Answer the given chunk index with a fault
    pub fn fail_chunk(&self, part_index: u32) {
        self.state.fail_chunks.lock().insert(part_index);
    }

    /// Never answer the given chunk index (callers observe a timeout)
    pub fn stall_chunk(&self, part_index: u32) {
        self.state.stall_chunks.lock().insert(part_index);
    }

    /// Report fetches of this document as not yet completed
    pub fn set_incomplete(&self, handle: &BlobHandle) {
        if let Some(StoredMessage::Document { content_id, .. }) =
            self.state.messages.lock().get(handle.as_str())
        {
            self.state.incomplete_content.lock().insert(*content_id);
        }
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn allocate_handle(&self) -> String {
        format!("msg-{}", self.next_message_id.fetch_add(1, Ordering::Relaxed))
    }

    fn store_document(&self, filename: Option<String>, payload: Bytes) -> BlobHandle {
        let handle = self.allocate_handle();
        let content_id = self.next_content_id.fetch_add(1, Ordering::Relaxed);
        self.messages.lock().insert(
            handle.clone(),
            StoredMessage::Document {
                content_id,
                filename,
                payload,
            },
        );
        self.handles_by_content
            .lock()
            .insert(content_id, handle.clone());
        BlobHandle::from_string(handle)
    }

    fn handle_request(&self, request: RemoteRequest) -> RemoteOutcome {
        match request {
            RemoteRequest::SendChunk {
                transfer_id,
                part_index,
                payload,
                ..
            } => {
                if self.fail_chunks.lock().contains(&part_index) {
                    return Err(RemoteFault::new(format!(
                        "chunk {part_index} rejected by backend"
                    )));
                }
                self.assemblies
                    .lock()
                    .entry(transfer_id.value())
                    .or_default()
                    .insert(part_index, payload);
                Ok(RemoteResponse::Ack)
            }

            RemoteRequest::SendDocument { filename, payload } => {
                let handle = self.store_document(Some(filename), payload);
                Ok(RemoteResponse::Posted { handle })
            }

            RemoteRequest::FinalizeTransfer {
                transfer_id,
                total_parts,
                filename,
            } => {
                let parts = self
                    .assemblies
                    .lock()
                    .remove(&transfer_id.value())
                    .ok_or_else(|| {
                        RemoteFault::new(format!("unknown transfer {transfer_id}"))
                    })?;
                let mut assembled = BytesMut::new();
                for index in 0..total_parts {
                    let part = parts.get(&index).ok_or_else(|| {
                        RemoteFault::new(format!(
                            "transfer {transfer_id} is missing part {index}"
                        ))
                    })?;
                    assembled.extend_from_slice(part);
                }
                let handle = self.store_document(Some(filename), assembled.freeze());
                Ok(RemoteResponse::Posted { handle })
            }

            RemoteRequest::LookupMessage { handle } => {
                let messages = self.messages.lock();
                let message = messages
                    .get(handle.as_str())
                    .ok_or_else(|| RemoteFault::new(format!("message {handle} not found")))?;
                let content = match message {
                    StoredMessage::Document {
                        content_id,
                        filename,
                        payload,
                    } => MessageContent::Document {
                        content_id: ContentId(*content_id),
                        filename: filename.clone(),
                        size_bytes: payload.len() as u64,
                    },
                    StoredMessage::Other { kind } => MessageContent::Other { kind: kind.clone() },
                };
                Ok(RemoteResponse::Message { content })
            }

            RemoteRequest::FetchContent { content_id } => {
                let location = StagedLocation(format!("staged/{content_id}"));
                if self.incomplete_content.lock().contains(&content_id.0) {
                    return Ok(RemoteResponse::Staged {
                        completed: false,
                        location,
                    });
                }
                let handle = self
                    .handles_by_content
                    .lock()
                    .get(&content_id.0)
                    .cloned()
                    .ok_or_else(|| RemoteFault::new(format!("content {content_id} not found")))?;
                let payload = match self.messages.lock().get(&handle) {
                    Some(StoredMessage::Document { payload, .. }) => payload.clone(),
                    _ => return Err(RemoteFault::new(format!("content {content_id} not found"))),
                };
                self.staged.lock().insert(location.0.clone(), payload);
                Ok(RemoteResponse::Staged {
                    completed: true,
                    location,
                })
            }

            RemoteRequest::DeleteMessage { handle } => {
                let removed = self.messages.lock().remove(handle.as_str());
                match removed {
                    Some(StoredMessage::Document { content_id, .. }) => {
                        self.handles_by_content.lock().remove(&content_id);
                        Ok(RemoteResponse::Ack)
                    }
                    Some(StoredMessage::Other { .. }) => Ok(RemoteResponse::Ack),
                    None => Err(RemoteFault::new(format!("message {handle} not found"))),
                }
            }

            RemoteRequest::ProbeAuth => Ok(RemoteResponse::AuthState {
                ready: self.auth_ready.load(Ordering::SeqCst),
            }),
        }
    }
}

impl RemoteTransport for MemoryTransport {
    fn dispatch(&self, _token: CallToken, request: RemoteRequest, on_complete: TransportCallback) {
        self.state.dispatch_log.lock().push(request.clone());

        if let RemoteRequest::SendChunk { part_index, .. } = &request {
            if self.state.stall_chunks.lock().contains(part_index) {
                // Swallow the call entirely; the bridge's timeout reclaims it.
                return;
            }
        }

        let state = Arc::clone(&self.state);
        let delay = if self.jitter.is_zero() {
            self.base_latency
        } else {
            let jitter_ms = rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64);
            self.base_latency + Duration::from_millis(jitter_ms)
        };

        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            on_complete(state.handle_request(request));
        });
    }

    fn open_staged(&self, location: &StagedLocation) -> Result<ByteStream, RemoteFault> {
        let payload = self
            .state
            .staged
            .lock()
            .get(location.as_str())
            .cloned()
            .ok_or_else(|| RemoteFault::new(format!("nothing staged at {location}")))?;

        let stream = async_stream::stream! {
            let mut remaining = payload;
            while !remaining.is_empty() {
                let take = remaining.len().min(STAGED_READ_CHUNK);
                yield Ok(remaining.split_to(take));
            }
        };
        Ok(Box::pin(stream))
    }
}
