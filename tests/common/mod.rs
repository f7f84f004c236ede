//! Shared fixtures for the conformance suites.
#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use courier_blob::{
    ByteStream, CallToken, RemoteFault, RemoteOutcome, RemoteRequest, RemoteResponse,
    RemoteTransport, StagedLocation, TransportCallback,
};

/// Transport that holds every callback until the test fires it manually,
/// so arrival order and lateness are fully scripted.
#[derive(Default)]
pub struct HeldTransport {
    held: Mutex<Vec<(CallToken, RemoteRequest, TransportCallback)>>,
}

impl HeldTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of calls currently held
    pub fn held_calls(&self) -> usize {
        self.held.lock().len()
    }

    /// Request of the held call at `index`
    pub fn request_at(&self, index: usize) -> RemoteRequest {
        self.held.lock()[index].1.clone()
    }

    /// Fire the callback of the oldest held call with the given outcome
    pub fn fire_oldest(&self, outcome: RemoteOutcome) {
        let (_token, _request, callback) = self.held.lock().remove(0);
        callback(outcome);
    }

    /// Drop the oldest held call without ever firing its callback
    pub fn abandon_oldest(&self) {
        let _ = self.held.lock().remove(0);
    }
}

impl RemoteTransport for HeldTransport {
    fn dispatch(&self, token: CallToken, request: RemoteRequest, on_complete: TransportCallback) {
        self.held.lock().push((token, request, on_complete));
    }

    fn open_staged(&self, location: &StagedLocation) -> Result<ByteStream, RemoteFault> {
        Err(RemoteFault::new(format!("nothing staged at {location}")))
    }
}

/// Transport whose callback fires synchronously inside `dispatch`, before
/// the caller ever starts waiting.
pub struct InlineTransport;

impl RemoteTransport for InlineTransport {
    fn dispatch(&self, _token: CallToken, request: RemoteRequest, on_complete: TransportCallback) {
        let outcome = match request {
            RemoteRequest::ProbeAuth => Ok(RemoteResponse::AuthState { ready: true }),
            _ => Ok(RemoteResponse::Ack),
        };
        on_complete(outcome);
    }

    fn open_staged(&self, location: &StagedLocation) -> Result<ByteStream, RemoteFault> {
        Err(RemoteFault::new(format!("nothing staged at {location}")))
    }
}

/// Byte source yielding `data` split into `chunk_size`-byte stream items
pub fn chunked_source(data: Bytes, chunk_size: usize) -> ByteStream {
    let chunks: Vec<Result<Bytes, std::io::Error>> = data
        .chunks(chunk_size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    Box::pin(futures_util::stream::iter(chunks))
}

/// Byte source that yields `good` and then fails with an I/O error
pub fn failing_source(good: Bytes) -> ByteStream {
    let items: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(good),
        Err(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "source reset",
        )),
    ];
    Box::pin(futures_util::stream::iter(items))
}

/// Deterministic pseudo-random payload of `len` bytes
pub fn patterned_payload(len: usize) -> Bytes {
    let mut data = Vec::with_capacity(len);
    let mut state: u32 = 0x9e37_79b9;
    for _ in 0..len {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        data.push((state >> 24) as u8);
    }
    Bytes::from(data)
}

/// Wait until `condition` holds or a short deadline passes
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

/// Convenience alias used by the suites
pub fn arc<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
